//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the contract-execution engine.
///
/// Defaults are suitable for tests and single-node deployments; production
/// operators override via their own config loading (out of scope here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum number of instantiated contract machines kept in the cache.
    pub machine_cache_size: usize,

    /// Seconds a cached machine may be reused before the next use forces
    /// registration-signature re-validation and a reload.
    pub machine_cache_expiry_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            machine_cache_size: 128,
            machine_cache_expiry_secs: 300,
        }
    }
}
