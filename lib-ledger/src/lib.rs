//! # Veriledger Engine
//!
//! A tamper-evident ledger whose every mutation is produced by an
//! identity-bound, registered contract, and whose entire write history can
//! be re-verified without trusting the underlying storage.
//!
//! # Architecture
//!
//! ```text
//! signed request
//!   └─> identity registry (signature validation)
//!        ├─> ContractExecutor (write path)
//!        │     start tx → resolve machine → invoke → commit → proofs
//!        └─> LedgerValidationService (audit path)
//!              scan history → replay per version → validator pipeline
//! ```
//!
//! # Data Model Invariants
//!
//! These invariants are NON-NEGOTIABLE. Any change violating them breaks
//! tamper evidence.
//!
//! 1. **Versions are append-only** - A committed [`asset::AssetVersion`] is
//!    never modified or deleted; the only valid asset mutation is appending
//!    the next age.
//! 2. **Ages are commit-assigned** - Per id, ages form `0, 1, 2, …` with no
//!    gaps and no repeats; assignment happens only inside a successful
//!    commit.
//! 3. **Every version is chained** - `version[n].prev_hash` equals
//!    `version[n-1].hash`, and `version[n].hash` is the canonical content
//!    hash over the version's own fields plus `prev_hash`. Breaking either
//!    equality is definitionally "tampered".
//! 4. **No mutation outside a contract** - State writes happen only through
//!    a registered, signature-verified contract invoked inside a
//!    transaction.

pub mod asset;
pub mod canonical;
pub mod config;
pub mod contract;
pub mod error;
pub mod execution;
pub mod identity;
pub mod ledger;
pub mod request;
pub mod service;
pub mod storage;
pub mod testing;
pub mod transaction;
pub mod validation;

pub use asset::{AssetFilter, AssetProof, AssetVersion, AgeOrder};
pub use config::LedgerConfig;
pub use contract::{Contract, ContractEntry, ContractError, ContractKey, Function};
pub use contract::loader::{ContractLoader, NativeLoader};
pub use contract::manager::ContractManager;
pub use error::LedgerError;
pub use execution::{ContractExecutor, ExecutionOutcome};
pub use identity::{IdentityKey, IdentityKeyEntry, IdentityRegistry};
pub use ledger::{Asset, LedgerView, Representation};
pub use request::{
    AssetProofRetrievalRequest, ContractRegistrationRequest, ExecutionRequest,
    FunctionRegistrationRequest, LedgerValidationRequest, SignedRequest,
};
pub use service::Ledger;
pub use storage::{LedgerStore, MemoryStore, SledStore, StorageError};
pub use transaction::{Transaction, TransactionManager};
pub use validation::{LedgerValidationService, ValidationReport, ValidationStatus};
