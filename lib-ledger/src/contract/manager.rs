//! Contract registration and machine instantiation.
//!
//! The manager owns the only engine-level mutable shared structure: the
//! machine cache. Cached machines are reused without re-validation until
//! they expire; expiry forces the registration signature to be re-checked
//! against the *current* identity resolution, so a revoked or rotated
//! identity invalidates previously cached machines.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::contract::loader::ContractLoader;
use crate::contract::{Contract, ContractEntry, ContractError, ContractKey, Function};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::IdentityRegistry;
use crate::ledger::{LedgerView, Representation};
use crate::request::{ContractRegistrationRequest, SignedRequest};
use crate::storage::{LedgerStore, StorageError};

/// An instantiated, identity-validated executable contract.
pub struct ContractMachine {
    key: ContractKey,
    representation: Representation,
    properties: Option<Value>,
    contract: Box<dyn Contract>,
}

impl ContractMachine {
    pub fn key(&self) -> &ContractKey {
        &self.key
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn invoke(
        &self,
        ledger: &mut dyn LedgerView,
        argument: &Value,
    ) -> Result<Option<Value>, ContractError> {
        self.contract
            .invoke(ledger, argument, self.properties.as_ref())
    }
}

impl std::fmt::Debug for ContractMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractMachine")
            .field("key", &self.key)
            .field("representation", &self.representation)
            .finish_non_exhaustive()
    }
}

/// A loaded chained function plus its registration properties.
pub struct FunctionMachine {
    properties: Option<Value>,
    function: Box<dyn Function>,
}

impl FunctionMachine {
    pub fn invoke(
        &self,
        database: &mut dyn crate::ledger::FunctionDatabase,
        contract_argument: &Value,
        function_argument: Option<&Value>,
    ) -> Result<Option<Value>, ContractError> {
        self.function.invoke(
            database,
            contract_argument,
            function_argument,
            self.properties.as_ref(),
        )
    }
}

struct CachedMachine {
    machine: Arc<ContractMachine>,
    loaded_at: Instant,
}

/// Registers contracts/functions and hands out machines.
pub struct ContractManager {
    store: Arc<dyn LedgerStore>,
    identities: Arc<IdentityRegistry>,
    loader: Arc<dyn ContractLoader>,
    machines: Mutex<LruCache<ContractKey, CachedMachine>>,
    expiry: Duration,
}

impl ContractManager {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        identities: Arc<IdentityRegistry>,
        loader: Arc<dyn ContractLoader>,
        config: &LedgerConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.machine_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            identities,
            loader,
            machines: Mutex::new(LruCache::new(capacity)),
            expiry: Duration::from_secs(config.machine_cache_expiry_secs),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a contract: duplicate check, registration-signature
    /// verification, loader probe, persist. The probe guarantees an entry
    /// can never be registered that later fails to load.
    pub fn register_contract(&self, request: &ContractRegistrationRequest) -> LedgerResult<()> {
        let entry = self.entry_from_request(request)?;
        let key = entry.key();
        if self.store.get_contract(&key)?.is_some() {
            return Err(LedgerError::ContractAlreadyRegistered(key));
        }
        self.loader
            .load_contract(&entry.binary_name, &entry.byte_code)?;
        match self.store.put_contract(&entry) {
            Ok(()) => {
                info!(contract = %key, binary = %entry.binary_name, "registered contract");
                Ok(())
            }
            Err(StorageError::AlreadyExists { .. }) => {
                Err(LedgerError::ContractAlreadyRegistered(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register a chained function; same flow, separate namespace.
    pub fn register_function(&self, request: &ContractRegistrationRequest) -> LedgerResult<()> {
        let entry = self.entry_from_request(request)?;
        let key = entry.key();
        if self.store.get_function(&key)?.is_some() {
            return Err(LedgerError::FunctionAlreadyRegistered(key));
        }
        self.loader
            .load_function(&entry.binary_name, &entry.byte_code)?;
        match self.store.put_function(&entry) {
            Ok(()) => {
                info!(function = %key, binary = %entry.binary_name, "registered function");
                Ok(())
            }
            Err(StorageError::AlreadyExists { .. }) => {
                Err(LedgerError::FunctionAlreadyRegistered(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn entry_from_request(&self, request: &ContractRegistrationRequest) -> LedgerResult<ContractEntry> {
        let authenticator = self
            .identities
            .authenticator(&request.entity_id, request.key_version)?;
        request.validate_with(authenticator.as_ref())?;
        let registered_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(ContractEntry {
            id: request.id.clone(),
            binary_name: request.binary_name.clone(),
            byte_code: request.byte_code.clone(),
            entity_id: request.entity_id.clone(),
            key_version: request.key_version,
            properties: request.properties.clone(),
            signature: request.signature.clone(),
            registered_at,
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get_contract(&self, key: &ContractKey) -> LedgerResult<ContractEntry> {
        self.store
            .get_contract(key)?
            .ok_or_else(|| LedgerError::ContractNotFound(key.clone()))
    }

    pub fn get_function(&self, key: &ContractKey) -> LedgerResult<ContractEntry> {
        self.store
            .get_function(key)?
            .ok_or_else(|| LedgerError::FunctionNotFound(key.clone()))
    }

    // =========================================================================
    // Instantiation
    // =========================================================================

    /// Machine for a registration entry: cached if fresh, otherwise
    /// re-validated against the current identity resolution, reloaded and
    /// re-cached. Validation failure occurs strictly before any
    /// invocation.
    pub fn contract_instance(&self, entry: &ContractEntry) -> LedgerResult<Arc<ContractMachine>> {
        let key = entry.key();
        {
            let mut cache = self.lock_machines()?;
            if let Some(cached) = cache.get(&key) {
                if cached.loaded_at.elapsed() < self.expiry {
                    debug!(contract = %key, "machine cache hit");
                    return Ok(Arc::clone(&cached.machine));
                }
                debug!(contract = %key, "machine cache entry expired");
                cache.pop(&key);
            }
        }

        self.validate_entry(entry)?;
        let contract = self
            .loader
            .load_contract(&entry.binary_name, &entry.byte_code)?;
        let machine = Arc::new(ContractMachine {
            key: key.clone(),
            representation: contract.representation(),
            properties: entry.properties.clone(),
            contract,
        });
        let mut cache = self.lock_machines()?;
        cache.put(
            key,
            CachedMachine {
                machine: Arc::clone(&machine),
                loaded_at: Instant::now(),
            },
        );
        Ok(machine)
    }

    /// Functions are loaded per use; they carry no representation choice
    /// and no cache-sensitive identity binding of their own.
    pub fn function_instance(&self, entry: &ContractEntry) -> LedgerResult<FunctionMachine> {
        self.validate_entry(entry)?;
        let function = self
            .loader
            .load_function(&entry.binary_name, &entry.byte_code)?;
        Ok(FunctionMachine {
            properties: entry.properties.clone(),
            function,
        })
    }

    /// Re-verify the registration signature against the current identity
    /// resolution for the registering entity/version.
    fn validate_entry(&self, entry: &ContractEntry) -> LedgerResult<()> {
        let authenticator = self
            .identities
            .authenticator(&entry.entity_id, entry.key_version)
            .map_err(|_| LedgerError::ContractValidationFailed(entry.key()))?;
        let valid = authenticator.validate(&entry.canonical_bytes(), &entry.signature)?;
        if !valid {
            return Err(LedgerError::ContractValidationFailed(entry.key()));
        }
        Ok(())
    }

    fn lock_machines(
        &self,
    ) -> LedgerResult<std::sync::MutexGuard<'_, LruCache<ContractKey, CachedMachine>>> {
        self.machines
            .lock()
            .map_err(|e| LedgerError::Unexpected(format!("machine cache lock poisoned: {e}")))
    }
}

impl std::fmt::Debug for ContractManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractManager")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}
