//! Engine error taxonomy.
//!
//! These are semantic failures, distinct from [`StorageError`]. The mapping
//! callers rely on: [`LedgerError::Conflict`] means "retry is sensible",
//! registration/signature variants mean "the request is wrong", and a
//! non-OK [`crate::ValidationStatus`] means "the data is corrupt".

use std::collections::HashMap;

use thiserror::Error;

use crate::contract::ContractKey;
use crate::storage::StorageError;
use lib_crypto::CryptoError;

/// Error raised by the contract-execution and validation engine.
#[derive(Error, Debug)]
pub enum LedgerError {
    // =========================================================================
    // Signature / identity errors
    // =========================================================================
    #[error("Signature validation failed for entity {entity_id}/{key_version}")]
    SignatureInvalid { entity_id: String, key_version: u32 },

    #[error("Identity not found: {entity_id}/{key_version}")]
    IdentityNotFound { entity_id: String, key_version: u32 },

    #[error("Identity already registered: {entity_id}/{key_version}")]
    IdentityAlreadyRegistered { entity_id: String, key_version: u32 },

    // =========================================================================
    // Registration errors
    // =========================================================================
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractKey),

    #[error("Contract already registered: {0}")]
    ContractAlreadyRegistered(ContractKey),

    #[error("Function not found: {0}")]
    FunctionNotFound(ContractKey),

    #[error("Function already registered: {0}")]
    FunctionAlreadyRegistered(ContractKey),

    #[error("Contract could not be loaded: {binary_name}: {reason}")]
    UnloadableContract { binary_name: String, reason: String },

    /// Registration-signature re-validation failed when instantiating a
    /// cached-out machine. Raised strictly before the contract is invoked.
    #[error("Contract validation failed: {0}")]
    ContractValidationFailed(ContractKey),

    // =========================================================================
    // Execution errors
    // =========================================================================
    /// Optimistic-concurrency collision at commit time. `ids` maps each
    /// implicated asset id to the age this transaction lost the race for.
    #[error("Commit conflict on {ids:?}")]
    Conflict { ids: HashMap<String, u64> },

    /// Failure raised by contract or function code itself. Propagated
    /// verbatim; never retried by the engine.
    #[error("Contract failure: {0}")]
    Business(String),

    #[error("Malformed argument: {0}")]
    MalformedArgument(String),

    // =========================================================================
    // Audit-path errors
    // =========================================================================
    #[error("Asset not found: {id}")]
    AssetNotFound { id: String },

    #[error("Recovery failed for asset {id}: {reason}")]
    RecoveryFailed { id: String, reason: String },

    // =========================================================================
    // Collaborator failures
    // =========================================================================
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl LedgerError {
    /// True when retrying the whole logical operation is sensible.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
