//! Contract and function surfaces: keys, registration entries, invoke
//! traits.

pub mod loader;
pub mod manager;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::canonical::{canonical_json, CanonicalWriter};
use crate::ledger::{FunctionDatabase, LedgerView, Representation};

/// Composite contract identifier: `entity_id/key_version/id`.
///
/// Binds a write to the exact registered contract and the exact identity
/// version that registered it. Stored verbatim on every asset version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKey {
    pub entity_id: String,
    pub key_version: u32,
    pub id: String,
}

impl ContractKey {
    pub fn new(entity_id: impl Into<String>, key_version: u32, id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            key_version,
            id: id.into(),
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.entity_id, self.key_version, self.id)
    }
}

impl FromStr for ContractKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let entity_id = parts.next().filter(|p| !p.is_empty());
        let key_version = parts.next().and_then(|p| p.parse::<u32>().ok());
        let id = parts.next().filter(|p| !p.is_empty());
        match (entity_id, key_version, id) {
            (Some(e), Some(v), Some(i)) => Ok(Self::new(e, v, i)),
            _ => Err(format!("malformed contract key: {s}")),
        }
    }
}

/// A registered contract or function: persisted once at registration,
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    /// Contract id chosen by the registering entity (unique per identity).
    pub id: String,

    /// Name the loader resolves to executable code.
    pub binary_name: String,

    /// Registered bytecode, verified/loaded by the active loader strategy.
    pub byte_code: Vec<u8>,

    /// Owning identity.
    pub entity_id: String,
    pub key_version: u32,

    /// Free-form properties handed to every invocation.
    pub properties: Option<Value>,

    /// Registration signature by the owning identity over
    /// [`ContractEntry::canonical_bytes`].
    pub signature: Vec<u8>,

    /// Unix seconds at registration.
    pub registered_at: u64,
}

impl ContractEntry {
    pub fn key(&self) -> ContractKey {
        ContractKey::new(&self.entity_id, self.key_version, &self.id)
    }

    /// Canonical signing bytes:
    /// `(id, binary_name, byte_code, properties, entity_id, key_version)`.
    /// Absent properties encode as an empty field.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.field(self.id.as_bytes());
        w.field(self.binary_name.as_bytes());
        w.field(&self.byte_code);
        match &self.properties {
            Some(p) => w.field(canonical_json(p).as_bytes()),
            None => w.field(&[]),
        };
        w.field(self.entity_id.as_bytes());
        w.u32_raw(self.key_version);
        w.finish()
    }
}

/// Failure raised by contract or function code.
#[derive(Error, Debug)]
pub enum ContractError {
    /// Business-rule rejection. Propagated verbatim to the caller; the
    /// enclosing transaction is aborted and never retried by the engine.
    #[error("{0}")]
    Business(String),

    /// Anything the contract did not anticipate.
    #[error("{0}")]
    Unexpected(String),
}

/// An executable contract: the only thing allowed to mutate assets.
///
/// Implementations must be deterministic and side-effect-free outside the
/// ledger view they are given; validation replays them against recorded
/// history and compares outputs bit-for-bit.
pub trait Contract: Send + Sync {
    /// The value representation this contract expects its ledger view in.
    fn representation(&self) -> Representation {
        Representation::Tree
    }

    /// Execute against the given ledger view.
    fn invoke(
        &self,
        ledger: &mut dyn LedgerView,
        argument: &Value,
        properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError>;
}

/// A chained, secondary executable invoked after the contract, with access
/// to the auxiliary database instead of the asset ledger.
pub trait Function: Send + Sync {
    fn invoke(
        &self,
        database: &mut dyn FunctionDatabase,
        contract_argument: &Value,
        function_argument: Option<&Value>,
        properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError>;
}
