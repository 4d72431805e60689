//! Dynamic contract loading behind a substitutable interface.
//!
//! The manager only ever sees [`ContractLoader`]; isolation strategy is an
//! implementation concern. [`NativeLoader`] is the in-process class-table
//! strategy: factories are bound to binary names at process setup, and the
//! registered bytecode is handed to the factory to construct the
//! executable unit. Subprocess or WASM sandbox loaders implement the same
//! trait without touching the manager.

use std::collections::HashMap;
use std::sync::Arc;

use crate::contract::{Contract, ContractError, Function};
use crate::error::{LedgerError, LedgerResult};

/// Loads registered bytecode into executable units.
pub trait ContractLoader: Send + Sync {
    fn load_contract(&self, binary_name: &str, byte_code: &[u8]) -> LedgerResult<Box<dyn Contract>>;

    fn load_function(&self, binary_name: &str, byte_code: &[u8]) -> LedgerResult<Box<dyn Function>>;
}

type ContractFactory =
    Arc<dyn Fn(&[u8]) -> Result<Box<dyn Contract>, ContractError> + Send + Sync>;
type FunctionFactory =
    Arc<dyn Fn(&[u8]) -> Result<Box<dyn Function>, ContractError> + Send + Sync>;

/// In-process class table keyed by binary name.
#[derive(Default, Clone)]
pub struct NativeLoader {
    contracts: HashMap<String, ContractFactory>,
    functions: HashMap<String, FunctionFactory>,
}

impl NativeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a contract factory to a binary name. The factory receives the
    /// registered bytecode and may reject it.
    pub fn bind_contract<F>(mut self, binary_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Box<dyn Contract>, ContractError> + Send + Sync + 'static,
    {
        self.contracts.insert(binary_name.into(), Arc::new(factory));
        self
    }

    /// Bind a function factory to a binary name.
    pub fn bind_function<F>(mut self, binary_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Box<dyn Function>, ContractError> + Send + Sync + 'static,
    {
        self.functions.insert(binary_name.into(), Arc::new(factory));
        self
    }
}

impl ContractLoader for NativeLoader {
    fn load_contract(&self, binary_name: &str, byte_code: &[u8]) -> LedgerResult<Box<dyn Contract>> {
        let factory = self.contracts.get(binary_name).ok_or_else(|| {
            LedgerError::UnloadableContract {
                binary_name: binary_name.to_string(),
                reason: "no contract bound to this binary name".to_string(),
            }
        })?;
        factory(byte_code).map_err(|e| LedgerError::UnloadableContract {
            binary_name: binary_name.to_string(),
            reason: e.to_string(),
        })
    }

    fn load_function(&self, binary_name: &str, byte_code: &[u8]) -> LedgerResult<Box<dyn Function>> {
        let factory = self.functions.get(binary_name).ok_or_else(|| {
            LedgerError::UnloadableContract {
                binary_name: binary_name.to_string(),
                reason: "no function bound to this binary name".to_string(),
            }
        })?;
        factory(byte_code).map_err(|e| LedgerError::UnloadableContract {
            binary_name: binary_name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for NativeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLoader")
            .field("contracts", &self.contracts.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerView;
    use serde_json::Value;

    struct Noop;

    impl Contract for Noop {
        fn invoke(
            &self,
            _ledger: &mut dyn LedgerView,
            _argument: &Value,
            _properties: Option<&Value>,
        ) -> Result<Option<Value>, ContractError> {
            Ok(None)
        }
    }

    #[test]
    fn unknown_binary_name_is_unloadable() {
        let loader = NativeLoader::new();
        assert!(matches!(
            loader.load_contract("missing", &[]),
            Err(LedgerError::UnloadableContract { .. })
        ));
    }

    #[test]
    fn factory_rejection_is_unloadable() {
        let loader = NativeLoader::new().bind_contract("picky", |byte_code: &[u8]| {
            if byte_code.is_empty() {
                Err(ContractError::Unexpected("empty bytecode".to_string()))
            } else {
                Ok(Box::new(Noop) as Box<dyn Contract>)
            }
        });
        assert!(loader.load_contract("picky", &[]).is_err());
        assert!(loader.load_contract("picky", &[1]).is_ok());
    }
}
