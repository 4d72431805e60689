//! In-memory [`LedgerStore`] backend.
//!
//! Interior mutability behind `&self`: one mutex over the whole state,
//! which also serializes conflicting writers (the conflict check and the
//! append are a single critical section).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::asset::{AgeOrder, AssetFilter, AssetVersion};
use crate::contract::{ContractEntry, ContractKey};
use crate::identity::IdentityKeyEntry;
use crate::storage::{LedgerStore, StorageError, StorageResult};

#[derive(Debug, Default)]
struct Inner {
    /// id -> versions indexed by age (vec index == age).
    assets: HashMap<String, Vec<AssetVersion>>,
    contracts: HashMap<String, ContractEntry>,
    functions: HashMap<String, ContractEntry>,
    identities: HashMap<String, IdentityKeyEntry>,
    data: HashMap<String, Vec<u8>>,
}

/// In-memory store for tests and single-process deployments.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
    }

    fn identity_key(entity_id: &str, key_version: u32) -> String {
        format!("{entity_id}/{key_version}")
    }

    /// Overwrite a committed version in place, bypassing the append-only
    /// rule. Corruption-injection hook for audit-path tests; only compiled
    /// under `cfg(test)` or the `testing` cargo feature.
    #[cfg(any(test, feature = "testing"))]
    pub fn tamper_asset(&self, version: &AssetVersion) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let chain = inner
            .assets
            .get_mut(&version.id)
            .ok_or_else(|| StorageError::Backend(format!("no chain for {}", version.id)))?;
        let slot = chain
            .get_mut(version.age as usize)
            .ok_or_else(|| StorageError::Backend(format!("no version at age {}", version.age)))?;
        *slot = version.clone();
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn latest_asset(&self, id: &str) -> StorageResult<Option<AssetVersion>> {
        let inner = self.lock()?;
        Ok(inner.assets.get(id).and_then(|v| v.last().cloned()))
    }

    fn scan_assets(&self, filter: &AssetFilter) -> StorageResult<Vec<AssetVersion>> {
        let inner = self.lock()?;
        let mut out: Vec<AssetVersion> = inner
            .assets
            .get(&filter.id)
            .map(|versions| {
                versions
                    .iter()
                    .filter(|v| filter.matches(v.age))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if filter.order == AgeOrder::Descending {
            out.reverse();
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn put_assets(&self, versions: &[AssetVersion]) -> StorageResult<()> {
        let mut inner = self.lock()?;
        // Check every id before appending anything; a conflict anywhere in
        // the batch persists nothing.
        for version in versions {
            let expected = inner.assets.get(&version.id).map_or(0, |c| c.len() as u64);
            if version.age != expected {
                return Err(StorageError::Conflict {
                    id: version.id.clone(),
                    age: version.age,
                });
            }
        }
        for version in versions {
            inner
                .assets
                .entry(version.id.clone())
                .or_default()
                .push(version.clone());
        }
        Ok(())
    }

    fn get_contract(&self, key: &ContractKey) -> StorageResult<Option<ContractEntry>> {
        let inner = self.lock()?;
        Ok(inner.contracts.get(&key.to_string()).cloned())
    }

    fn put_contract(&self, entry: &ContractEntry) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let key = entry.key().to_string();
        if inner.contracts.contains_key(&key) {
            return Err(StorageError::AlreadyExists { key });
        }
        inner.contracts.insert(key, entry.clone());
        Ok(())
    }

    fn get_function(&self, key: &ContractKey) -> StorageResult<Option<ContractEntry>> {
        let inner = self.lock()?;
        Ok(inner.functions.get(&key.to_string()).cloned())
    }

    fn put_function(&self, entry: &ContractEntry) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let key = entry.key().to_string();
        if inner.functions.contains_key(&key) {
            return Err(StorageError::AlreadyExists { key });
        }
        inner.functions.insert(key, entry.clone());
        Ok(())
    }

    fn get_identity(
        &self,
        entity_id: &str,
        key_version: u32,
    ) -> StorageResult<Option<IdentityKeyEntry>> {
        let inner = self.lock()?;
        Ok(inner
            .identities
            .get(&Self::identity_key(entity_id, key_version))
            .cloned())
    }

    fn put_identity(&self, entry: &IdentityKeyEntry) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let key = Self::identity_key(&entry.entity_id, entry.key_version);
        if inner.identities.contains_key(&key) {
            return Err(StorageError::AlreadyExists { key });
        }
        inner.identities.insert(key, entry.clone());
        Ok(())
    }

    fn get_data(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let inner = self.lock()?;
        Ok(inner.data.get(key).cloned())
    }

    fn put_data(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
