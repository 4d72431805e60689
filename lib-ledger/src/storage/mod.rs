//! Storage collaborator boundary.
//!
//! All persistence goes through the [`LedgerStore`] trait. The engine never
//! knows which backend is in use.
//!
//! # Data Model Invariants
//!
//! 1. **Asset versions are append-only** - `put_assets` only ever appends
//!    the next age of each id; committed versions are never modified or
//!    deleted.
//! 2. **Conflicts are surfaced, never resolved here** - when a concurrent
//!    writer advanced an id past the expected age, `put_assets` fails with
//!    [`StorageError::Conflict`] and persists nothing from the batch; the
//!    engine decides what happens next.
//! 3. **Registration entries are write-once** - contract, function and
//!    identity entries reject duplicate keys with
//!    [`StorageError::AlreadyExists`].
//! 4. **Key encoding is protocol** - backends must not change how ids and
//!    ages map to physical keys once data exists.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use thiserror::Error;

use crate::asset::{AssetFilter, AssetVersion};
use crate::contract::{ContractEntry, ContractKey};
use crate::identity::IdentityKeyEntry;

/// Error raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A concurrent writer already committed `age` for `id`.
    #[error("Write conflict on asset {id}: age {age} already decided")]
    Conflict { id: String, age: u64 },

    /// A write-once entry already exists under `key`.
    #[error("Entry already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The persistence contract the engine drives.
///
/// All methods take `&self`; implementations use interior mutability or the
/// backend's own synchronization, and must serialize conflicting writes
/// per key themselves.
pub trait LedgerStore: Send + Sync {
    // =========================================================================
    // Asset versions (hash-chained, append-only)
    // =========================================================================

    /// Latest committed version of `id`, if any.
    fn latest_asset(&self, id: &str) -> StorageResult<Option<AssetVersion>>;

    /// Committed versions of one id selected by `filter`, in the filter's
    /// age order.
    fn scan_assets(&self, filter: &AssetFilter) -> StorageResult<Vec<AssetVersion>>;

    /// Append a batch of versions, at most one per id, all-or-nothing.
    /// Ages and hashes are computed by the engine before the call; the
    /// backend must reject the whole batch with [`StorageError::Conflict`]
    /// (naming the offending id) unless every `version.age` is exactly the
    /// next age for its `version.id`, and must persist nothing on failure.
    fn put_assets(&self, versions: &[AssetVersion]) -> StorageResult<()>;

    /// Append one version; equivalent to a single-element batch.
    fn put_asset(&self, version: &AssetVersion) -> StorageResult<()> {
        self.put_assets(std::slice::from_ref(version))
    }

    // =========================================================================
    // Contract / function registration entries (write-once)
    // =========================================================================

    fn get_contract(&self, key: &ContractKey) -> StorageResult<Option<ContractEntry>>;

    fn put_contract(&self, entry: &ContractEntry) -> StorageResult<()>;

    fn get_function(&self, key: &ContractKey) -> StorageResult<Option<ContractEntry>>;

    fn put_function(&self, entry: &ContractEntry) -> StorageResult<()>;

    // =========================================================================
    // Identity key entries (write-once per version)
    // =========================================================================

    fn get_identity(&self, entity_id: &str, key_version: u32)
        -> StorageResult<Option<IdentityKeyEntry>>;

    fn put_identity(&self, entry: &IdentityKeyEntry) -> StorageResult<()>;

    // =========================================================================
    // Function data (auxiliary database, outside the hash chain)
    // =========================================================================

    fn get_data(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    fn put_data(&self, key: &str, value: &[u8]) -> StorageResult<()>;
}
