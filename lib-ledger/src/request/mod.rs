//! Signed request envelopes.
//!
//! Every mutating or validating request enters as an envelope carrying the
//! actor identity, the request fields, and a signature over the envelope's
//! canonical bytes. The canonical byte layouts here are protocol: the
//! execution envelope's layout is exactly the tuple the audit-path contract
//! validator re-verifies years later.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{canonical_json, CanonicalWriter};
use crate::contract::ContractKey;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::RequestAuthenticator;

/// Common behavior of all signed envelopes.
pub trait SignedRequest {
    /// Canonical bytes the signature covers.
    fn canonical_bytes(&self) -> Vec<u8>;

    fn signature(&self) -> &[u8];

    fn entity_id(&self) -> &str;

    fn key_version(&self) -> u32;

    /// Fails with a signature error unless `authenticator` verifies this
    /// envelope's signature over its canonical bytes.
    fn validate_with(&self, authenticator: &dyn RequestAuthenticator) -> LedgerResult<()> {
        if authenticator.validate(&self.canonical_bytes(), self.signature())? {
            Ok(())
        } else {
            Err(LedgerError::SignatureInvalid {
                entity_id: self.entity_id().to_string(),
                key_version: self.key_version(),
            })
        }
    }
}

/// Request to execute a registered contract (write path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Contract id as registered by the signing entity.
    pub contract_id: String,

    /// Invocation argument; must be a JSON object carrying a `"nonce"`
    /// string member.
    pub contract_argument: Value,

    /// Chained functions to run after the contract, in declared order.
    pub function_ids: Vec<String>,

    /// Shared argument handed to every chained function.
    pub function_argument: Option<Value>,

    pub entity_id: String,
    pub key_version: u32,

    /// Client signature over [`SignedRequest::canonical_bytes`].
    pub signature: Vec<u8>,

    /// Independent auditor signature over the same bytes (dual-control
    /// mode).
    pub auditor_signature: Option<Vec<u8>>,
}

impl ExecutionRequest {
    /// The composite key binding this request to the registered contract.
    pub fn contract_key(&self) -> ContractKey {
        ContractKey::new(&self.entity_id, self.key_version, &self.contract_id)
    }

    /// The client nonce embedded in the argument.
    pub fn nonce(&self) -> LedgerResult<String> {
        self.contract_argument
            .get("nonce")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                LedgerError::MalformedArgument(
                    "contract argument must carry a string \"nonce\" member".to_string(),
                )
            })
    }
}

impl SignedRequest for ExecutionRequest {
    /// `(contract_id, argument, entity_id, key_version)` — the exact tuple
    /// the contract validator re-verifies during audits.
    fn canonical_bytes(&self) -> Vec<u8> {
        execution_signing_bytes(
            &self.contract_key(),
            &canonical_json(&self.contract_argument),
            &self.entity_id,
            self.key_version,
        )
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn key_version(&self) -> u32 {
        self.key_version
    }
}

/// Canonical signing bytes for an execution, shared between the write path
/// and the audit-path contract validator.
pub fn execution_signing_bytes(
    contract_id: &ContractKey,
    argument: &str,
    entity_id: &str,
    key_version: u32,
) -> Vec<u8> {
    let mut w = CanonicalWriter::new();
    w.field(contract_id.to_string().as_bytes());
    w.field(argument.as_bytes());
    w.field(entity_id.as_bytes());
    w.u32_raw(key_version);
    w.finish()
}

/// Request to register a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRegistrationRequest {
    pub id: String,
    pub binary_name: String,
    pub byte_code: Vec<u8>,
    pub properties: Option<Value>,
    pub entity_id: String,
    pub key_version: u32,
    pub signature: Vec<u8>,
}

impl SignedRequest for ContractRegistrationRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        registration_signing_bytes(
            &self.id,
            &self.binary_name,
            &self.byte_code,
            self.properties.as_ref(),
            &self.entity_id,
            self.key_version,
        )
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn key_version(&self) -> u32 {
        self.key_version
    }
}

/// Request to register a chained function. Same shape as a contract
/// registration; functions live in their own namespace.
pub type FunctionRegistrationRequest = ContractRegistrationRequest;

/// Canonical signing bytes for a registration; identical to
/// [`crate::contract::ContractEntry::canonical_bytes`] so the stored entry
/// re-verifies against the original request signature.
pub fn registration_signing_bytes(
    id: &str,
    binary_name: &str,
    byte_code: &[u8],
    properties: Option<&Value>,
    entity_id: &str,
    key_version: u32,
) -> Vec<u8> {
    let mut w = CanonicalWriter::new();
    w.field(id.as_bytes());
    w.field(binary_name.as_bytes());
    w.field(byte_code);
    match properties {
        Some(p) => w.field(canonical_json(p).as_bytes()),
        None => w.field(&[]),
    };
    w.field(entity_id.as_bytes());
    w.u32_raw(key_version);
    w.finish()
}

/// Request to validate an asset's history (audit path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerValidationRequest {
    pub asset_id: String,
    /// Inclusive; `None` means 0.
    pub start_age: Option<u64>,
    /// Inclusive; `None` means unbounded.
    pub end_age: Option<u64>,
    pub entity_id: String,
    pub key_version: u32,
    pub signature: Vec<u8>,
}

impl SignedRequest for LedgerValidationRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.field(self.asset_id.as_bytes());
        w.u64_raw(self.start_age.unwrap_or(0));
        w.u64_raw(self.end_age.unwrap_or(u64::MAX));
        w.field(self.entity_id.as_bytes());
        w.u32_raw(self.key_version);
        w.finish()
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn key_version(&self) -> u32 {
        self.key_version
    }
}

/// Request to retrieve a proof for one asset version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetProofRetrievalRequest {
    pub asset_id: String,
    /// Exact age, or `None`/`u64::MAX` for the latest version.
    pub age: Option<u64>,
    pub entity_id: String,
    pub key_version: u32,
    pub signature: Vec<u8>,
}

impl AssetProofRetrievalRequest {
    /// True when the request selects the latest version.
    pub fn wants_latest(&self) -> bool {
        matches!(self.age, None | Some(u64::MAX))
    }
}

impl SignedRequest for AssetProofRetrievalRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.field(self.asset_id.as_bytes());
        w.u64_raw(self.age.unwrap_or(u64::MAX));
        w.field(self.entity_id.as_bytes());
        w.u32_raw(self.key_version);
        w.finish()
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn key_version(&self) -> u32 {
        self.key_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            contract_id: "c1".into(),
            contract_argument: json!({"nonce": "n-1", "state": 1}),
            function_ids: vec![],
            function_argument: None,
            entity_id: "e".into(),
            key_version: 1,
            signature: vec![],
            auditor_signature: None,
        }
    }

    #[test]
    fn nonce_extraction() {
        assert_eq!(request().nonce().unwrap(), "n-1");
        let mut bad = request();
        bad.contract_argument = json!({"state": 1});
        assert!(bad.nonce().is_err());
    }

    #[test]
    fn signing_bytes_cover_the_argument() {
        let a = request();
        let mut b = request();
        b.contract_argument = json!({"nonce": "n-1", "state": 2});
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn signing_bytes_ignore_chained_functions() {
        // The audit-path validator re-verifies (contract_id, argument,
        // entity, key_version) only; function ids ride outside the
        // signature exactly as they ride outside the stored version.
        let a = request();
        let mut b = request();
        b.function_ids = vec!["f1".into()];
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn retrieval_latest_sentinels() {
        let mut r = AssetProofRetrievalRequest {
            asset_id: "a".into(),
            age: None,
            entity_id: "e".into(),
            key_version: 1,
            signature: vec![],
        };
        assert!(r.wants_latest());
        r.age = Some(u64::MAX);
        assert!(r.wants_latest());
        r.age = Some(3);
        assert!(!r.wants_latest());
    }
}
