//! Sled-based [`LedgerStore`] backend.
//!
//! Do not rely on sled-specific features beyond basic KV + transactions.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};

use crate::asset::{AgeOrder, AssetFilter, AssetVersion};
use crate::contract::{ContractEntry, ContractKey};
use crate::identity::IdentityKeyEntry;
use crate::storage::{LedgerStore, StorageError, StorageResult};

// =============================================================================
// TREE NAMES (FIXED - DO NOT CHANGE)
// =============================================================================
// These names are protocol. Changing them breaks existing stores.
// =============================================================================

const TREE_ASSETS: &str = "assets";
const TREE_ASSET_TIPS: &str = "asset_tips";
const TREE_CONTRACTS: &str = "contracts";
const TREE_FUNCTIONS: &str = "functions";
const TREE_IDENTITIES: &str = "identities";
const TREE_FUNCTION_DATA: &str = "function_data";

/// Physical key of one asset version: `len(id) BE || id || age BE`.
///
/// The length prefix keeps id prefixes unambiguous; the big-endian age
/// keeps versions of one id byte-ordered by age.
fn asset_key(id: &str, age: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + id.len() + 8);
    key.extend_from_slice(&(id.len() as u32).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key.extend_from_slice(&age.to_be_bytes());
    key
}

fn decode_age(bytes: &[u8]) -> StorageResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Serialization("malformed age encoding".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

/// Persistent store over a sled database.
pub struct SledStore {
    _db: Db,
    assets: Tree,
    asset_tips: Tree,
    contracts: Tree,
    functions: Tree,
    identities: Tree,
    function_data: Tree,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path).map_err(backend)?;
        let assets = db.open_tree(TREE_ASSETS).map_err(backend)?;
        let asset_tips = db.open_tree(TREE_ASSET_TIPS).map_err(backend)?;
        let contracts = db.open_tree(TREE_CONTRACTS).map_err(backend)?;
        let functions = db.open_tree(TREE_FUNCTIONS).map_err(backend)?;
        let identities = db.open_tree(TREE_IDENTITIES).map_err(backend)?;
        let function_data = db.open_tree(TREE_FUNCTION_DATA).map_err(backend)?;
        Ok(Self {
            _db: db,
            assets,
            asset_tips,
            contracts,
            functions,
            identities,
            function_data,
        })
    }

    fn read_version(&self, id: &str, age: u64) -> StorageResult<Option<AssetVersion>> {
        match self.assets.get(asset_key(id, age)).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_write_once<T: serde::Serialize>(
        tree: &Tree,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = encode(value)?;
        let previous = tree
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))
            .map_err(backend)?;
        if previous.is_err() {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn get_entry(tree: &Tree, key: &str) -> StorageResult<Option<ContractEntry>> {
        match tree.get(key.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl LedgerStore for SledStore {
    fn latest_asset(&self, id: &str) -> StorageResult<Option<AssetVersion>> {
        match self.asset_tips.get(id.as_bytes()).map_err(backend)? {
            Some(age_bytes) => {
                let age = decode_age(&age_bytes)?;
                match self.read_version(id, age)? {
                    Some(version) => Ok(Some(version)),
                    None => Err(StorageError::Backend(format!(
                        "chain tip for {id} points at missing age {age}"
                    ))),
                }
            }
            None => Ok(None),
        }
    }

    fn scan_assets(&self, filter: &AssetFilter) -> StorageResult<Vec<AssetVersion>> {
        let start = filter.start_age.unwrap_or(0);
        let end = filter.end_age.unwrap_or(u64::MAX);
        if start > end {
            return Ok(Vec::new());
        }
        let range = asset_key(&filter.id, start)..=asset_key(&filter.id, end);
        let mut out = Vec::new();
        for item in self.assets.range(range) {
            let (_, bytes) = item.map_err(backend)?;
            out.push(decode::<AssetVersion>(&bytes)?);
        }
        if filter.order == AgeOrder::Descending {
            out.reverse();
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn put_assets(&self, versions: &[AssetVersion]) -> StorageResult<()> {
        let mut encoded = Vec::with_capacity(versions.len());
        for version in versions {
            encoded.push(encode(version)?);
        }
        // Every tip check and append of the batch is one atomic sled
        // transaction; a racing writer aborts the whole batch instead of
        // leaving some chains advanced and others not.
        let result = (&self.asset_tips, &self.assets).transaction(|(tips, assets)| {
            for (version, bytes) in versions.iter().zip(&encoded) {
                let expected_next = match tips.get(version.id.as_bytes())? {
                    Some(age_bytes) => {
                        decode_age(&age_bytes).map_err(ConflictableTransactionError::Abort)? + 1
                    }
                    None => 0,
                };
                if version.age != expected_next {
                    return Err(ConflictableTransactionError::Abort(StorageError::Conflict {
                        id: version.id.clone(),
                        age: version.age,
                    }));
                }
                tips.insert(version.id.as_bytes(), version.age.to_be_bytes().to_vec())?;
                assets.insert(asset_key(&version.id, version.age), bytes.clone())?;
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(backend(e)),
        }
    }

    fn get_contract(&self, key: &ContractKey) -> StorageResult<Option<ContractEntry>> {
        Self::get_entry(&self.contracts, &key.to_string())
    }

    fn put_contract(&self, entry: &ContractEntry) -> StorageResult<()> {
        Self::put_write_once(&self.contracts, &entry.key().to_string(), entry)
    }

    fn get_function(&self, key: &ContractKey) -> StorageResult<Option<ContractEntry>> {
        Self::get_entry(&self.functions, &key.to_string())
    }

    fn put_function(&self, entry: &ContractEntry) -> StorageResult<()> {
        Self::put_write_once(&self.functions, &entry.key().to_string(), entry)
    }

    fn get_identity(
        &self,
        entity_id: &str,
        key_version: u32,
    ) -> StorageResult<Option<IdentityKeyEntry>> {
        let key = format!("{entity_id}/{key_version}");
        match self.identities.get(key.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_identity(&self, entry: &IdentityKeyEntry) -> StorageResult<()> {
        let key = format!("{}/{}", entry.entity_id, entry.key_version);
        Self::put_write_once(&self.identities, &key, entry)
    }

    fn get_data(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .function_data
            .get(key.as_bytes())
            .map_err(backend)?
            .map(|ivec| ivec.to_vec()))
    }

    fn put_data(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.function_data
            .insert(key.as_bytes(), value)
            .map_err(backend)?;
        Ok(())
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish_non_exhaustive()
    }
}

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}
