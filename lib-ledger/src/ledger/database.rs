//! Auxiliary database view for chained functions.
//!
//! Functions read and write plain keyed records outside the asset ledger;
//! nothing here joins the hash chain. Writes are staged during execution
//! and flushed only after the enclosing transaction commits, so a failed
//! commit leaves no function side effects behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{LedgerError, LedgerResult};
use crate::storage::LedgerStore;

/// The surface chained functions execute against.
pub trait FunctionDatabase {
    fn get(&mut self, key: &str) -> LedgerResult<Option<Value>>;

    fn put(&mut self, key: &str, value: Value) -> LedgerResult<()>;
}

/// Write-staging database over the store's function-data namespace.
pub struct StagedFunctionDatabase {
    store: Arc<dyn LedgerStore>,
    staged: BTreeMap<String, Value>,
}

impl StagedFunctionDatabase {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    /// Persist every staged write. Called by the executor strictly after
    /// the asset commit succeeded.
    pub fn flush(&mut self) -> LedgerResult<()> {
        for (key, value) in std::mem::take(&mut self.staged) {
            let bytes = serde_json::to_vec(&value)
                .map_err(|e| LedgerError::Unexpected(format!("function data {key}: {e}")))?;
            self.store.put_data(&key, &bytes)?;
        }
        Ok(())
    }
}

impl FunctionDatabase for StagedFunctionDatabase {
    fn get(&mut self, key: &str) -> LedgerResult<Option<Value>> {
        if let Some(value) = self.staged.get(key) {
            return Ok(Some(value.clone()));
        }
        match self.store.get_data(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| LedgerError::Unexpected(format!("function data {key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &str, value: Value) -> LedgerResult<()> {
        self.staged.insert(key.to_string(), value);
        Ok(())
    }
}
