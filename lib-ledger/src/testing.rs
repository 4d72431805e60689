//! Deterministic contracts, functions and signed-request builders for the
//! test suites.
//!
//! Everything here is ordinary client-side material: the sample contracts
//! are honest [`Contract`] implementations and the builders produce real
//! signed envelopes. Production code never depends on this module.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::contract::loader::NativeLoader;
use crate::contract::{Contract, ContractError, Function};
use crate::identity::{IdentityKey, IdentityKeyEntry, IdentityRegistry};
use crate::ledger::{FunctionDatabase, LedgerView, Representation};
use crate::request::{
    execution_signing_bytes, registration_signing_bytes, AssetProofRetrievalRequest,
    ContractRegistrationRequest, ExecutionRequest, LedgerValidationRequest, SignedRequest,
};
use crate::canonical::canonical_json;
use crate::contract::ContractKey;
use lib_crypto::KeyPair;

// =========================================================================
// Binary names resolvable through `test_loader`
// =========================================================================

/// Writes `{"state": argument.state}` to `argument.asset_id`.
pub const STATE_UPDATER: &str = "state-updater";
/// Returns the current `{age, data}` of `argument.asset_id` without writing.
pub const STATE_READER: &str = "state-reader";
/// Writes `{"state": argument.state}` to every id in `argument.asset_ids`.
pub const MULTI_UPDATER: &str = "multi-updater";
/// KeyValue-representation contract merging `argument.fields` into
/// `argument.asset_id`.
pub const FIELD_UPDATER: &str = "field-updater";
/// Always fails with a business error carrying `argument.reason`.
pub const FAILER: &str = "failer";
/// Function recording its argument under `function_argument.key`.
pub const RECORDER: &str = "recorder";

fn required_str<'a>(argument: &'a Value, member: &str) -> Result<&'a str, ContractError> {
    argument
        .get(member)
        .and_then(Value::as_str)
        .ok_or_else(|| ContractError::Business(format!("missing string member: {member}")))
}

struct StateUpdater;

impl Contract for StateUpdater {
    fn invoke(
        &self,
        ledger: &mut dyn LedgerView,
        argument: &Value,
        _properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        let id = required_str(argument, "asset_id")?;
        let state = argument
            .get("state")
            .cloned()
            .ok_or_else(|| ContractError::Business("missing member: state".to_string()))?;
        // Read before write so the committed predecessor lands in the
        // replay seed.
        ledger
            .get(id)
            .map_err(|e| ContractError::Unexpected(e.to_string()))?;
        ledger
            .put(id, json!({ "state": state }))
            .map_err(|e| ContractError::Unexpected(e.to_string()))?;
        Ok(None)
    }
}

struct StateReader;

impl Contract for StateReader {
    fn invoke(
        &self,
        ledger: &mut dyn LedgerView,
        argument: &Value,
        _properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        let id = required_str(argument, "asset_id")?;
        let asset = ledger
            .get(id)
            .map_err(|e| ContractError::Unexpected(e.to_string()))?;
        Ok(asset.map(|a| json!({ "age": a.age, "data": a.data })))
    }
}

struct MultiUpdater;

impl Contract for MultiUpdater {
    fn invoke(
        &self,
        ledger: &mut dyn LedgerView,
        argument: &Value,
        _properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        let ids = argument
            .get("asset_ids")
            .and_then(Value::as_array)
            .ok_or_else(|| ContractError::Business("missing member: asset_ids".to_string()))?;
        let state = argument.get("state").cloned().unwrap_or(Value::Null);
        for id in ids {
            let id = id
                .as_str()
                .ok_or_else(|| ContractError::Business("asset_ids must be strings".to_string()))?;
            ledger
                .get(id)
                .map_err(|e| ContractError::Unexpected(e.to_string()))?;
            ledger
                .put(id, json!({ "state": state.clone() }))
                .map_err(|e| ContractError::Unexpected(e.to_string()))?;
        }
        Ok(None)
    }
}

/// Exercises the flat-map representation: sees and writes dotted-path
/// fields rather than nested objects.
struct FieldUpdater;

impl Contract for FieldUpdater {
    fn representation(&self) -> Representation {
        Representation::KeyValue
    }

    fn invoke(
        &self,
        ledger: &mut dyn LedgerView,
        argument: &Value,
        _properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        let id = required_str(argument, "asset_id")?;
        let fields = argument
            .get("fields")
            .and_then(Value::as_object)
            .ok_or_else(|| ContractError::Business("missing object member: fields".to_string()))?;
        let mut merged = match ledger
            .get(id)
            .map_err(|e| ContractError::Unexpected(e.to_string()))?
        {
            Some(asset) => asset.data.as_object().cloned().unwrap_or_default(),
            None => Map::new(),
        };
        for (path, value) in fields {
            merged.insert(path.clone(), value.clone());
        }
        ledger
            .put(id, Value::Object(merged))
            .map_err(|e| ContractError::Unexpected(e.to_string()))?;
        Ok(None)
    }
}

struct Failer;

impl Contract for Failer {
    fn invoke(
        &self,
        _ledger: &mut dyn LedgerView,
        argument: &Value,
        _properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        let reason = argument
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("rejected");
        Err(ContractError::Business(reason.to_string()))
    }
}

struct Recorder;

impl Function for Recorder {
    fn invoke(
        &self,
        database: &mut dyn FunctionDatabase,
        contract_argument: &Value,
        function_argument: Option<&Value>,
        _properties: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        let function_argument = function_argument
            .ok_or_else(|| ContractError::Business("recorder needs an argument".to_string()))?;
        let key = required_str(function_argument, "key")?;
        let record = json!({
            "contract_argument": contract_argument,
            "note": function_argument.get("note").cloned().unwrap_or(Value::Null),
        });
        database
            .put(key, record.clone())
            .map_err(|e| ContractError::Unexpected(e.to_string()))?;
        Ok(Some(record))
    }
}

/// Loader with every sample binary bound.
pub fn test_loader() -> NativeLoader {
    NativeLoader::new()
        .bind_contract(STATE_UPDATER, |_| Ok(Box::new(StateUpdater)))
        .bind_contract(STATE_READER, |_| Ok(Box::new(StateReader)))
        .bind_contract(MULTI_UPDATER, |_| Ok(Box::new(MultiUpdater)))
        .bind_contract(FIELD_UPDATER, |_| Ok(Box::new(FieldUpdater)))
        .bind_contract(FAILER, |_| Ok(Box::new(Failer)))
        .bind_function(RECORDER, |_| Ok(Box::new(Recorder)))
}

// =========================================================================
// Signed-request builders
// =========================================================================

/// One registered test identity holding its own signing key.
pub struct TestActor {
    pub entity_id: String,
    pub key_version: u32,
    key: KeyPair,
}

impl TestActor {
    /// Generate a keypair and register it under
    /// `(entity_id, key_version)` in certificate mode.
    pub fn register(entity_id: &str, key_version: u32, identities: &Arc<IdentityRegistry>) -> Self {
        let key = KeyPair::generate();
        identities
            .register(IdentityKeyEntry {
                entity_id: entity_id.to_string(),
                key_version,
                key: IdentityKey::Certificate(key.public_key()),
            })
            .unwrap();
        Self {
            entity_id: entity_id.to_string(),
            key_version,
            key,
        }
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.key.public_key()
    }

    /// Signed registration envelope for a contract (or function; same
    /// shape).
    pub fn contract_registration(
        &self,
        id: &str,
        binary_name: &str,
        properties: Option<Value>,
    ) -> ContractRegistrationRequest {
        let byte_code = binary_name.as_bytes().to_vec();
        let bytes = registration_signing_bytes(
            id,
            binary_name,
            &byte_code,
            properties.as_ref(),
            &self.entity_id,
            self.key_version,
        );
        ContractRegistrationRequest {
            id: id.to_string(),
            binary_name: binary_name.to_string(),
            byte_code,
            properties,
            entity_id: self.entity_id.clone(),
            key_version: self.key_version,
            signature: self.key.sign(&bytes),
        }
    }

    /// Signed execution envelope with no chained functions.
    pub fn execution(&self, contract_id: &str, argument: Value) -> ExecutionRequest {
        self.execution_with_functions(contract_id, argument, Vec::new(), None)
    }

    /// Signed execution envelope with chained functions.
    pub fn execution_with_functions(
        &self,
        contract_id: &str,
        argument: Value,
        function_ids: Vec<String>,
        function_argument: Option<Value>,
    ) -> ExecutionRequest {
        let key = ContractKey::new(&self.entity_id, self.key_version, contract_id);
        let bytes = execution_signing_bytes(
            &key,
            &canonical_json(&argument),
            &self.entity_id,
            self.key_version,
        );
        ExecutionRequest {
            contract_id: contract_id.to_string(),
            contract_argument: argument,
            function_ids,
            function_argument,
            entity_id: self.entity_id.clone(),
            key_version: self.key_version,
            signature: self.key.sign(&bytes),
            auditor_signature: None,
        }
    }

    /// Signed validation envelope over `[start_age, end_age]` (full
    /// history when both are `None`).
    pub fn validation(
        &self,
        asset_id: &str,
        start_age: Option<u64>,
        end_age: Option<u64>,
    ) -> LedgerValidationRequest {
        let mut request = LedgerValidationRequest {
            asset_id: asset_id.to_string(),
            start_age,
            end_age,
            entity_id: self.entity_id.clone(),
            key_version: self.key_version,
            signature: vec![],
        };
        request.signature = self.key.sign(&request.canonical_bytes());
        request
    }

    /// Signed proof-retrieval envelope; `None` selects the latest version.
    pub fn retrieval(&self, asset_id: &str, age: Option<u64>) -> AssetProofRetrievalRequest {
        let mut request = AssetProofRetrievalRequest {
            asset_id: asset_id.to_string(),
            age,
            entity_id: self.entity_id.clone(),
            key_version: self.key_version,
            signature: vec![],
        };
        request.signature = self.key.sign(&request.canonical_bytes());
        request
    }
}

impl std::fmt::Debug for TestActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestActor")
            .field("entity_id", &self.entity_id)
            .field("key_version", &self.key_version)
            .finish_non_exhaustive()
    }
}

/// Countersign an execution envelope with the auditor key (dual-control
/// mode).
pub fn countersign(request: &mut ExecutionRequest, auditor: &KeyPair) {
    request.auditor_signature = Some(auditor.sign(&request.canonical_bytes()));
}

/// Standard argument shape for [`STATE_UPDATER`].
pub fn state_argument(nonce: &str, asset_id: &str, state: u64) -> Value {
    json!({ "nonce": nonce, "asset_id": asset_id, "state": state })
}
