//! Shared wiring for the integration suites.
#![allow(dead_code)]

use std::sync::Arc;

use lib_crypto::KeyPair;
use lib_ledger::storage::MemoryStore;
use lib_ledger::testing::{self, TestActor};
use lib_ledger::{Ledger, LedgerConfig};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Engine over a shared in-memory store, with one registered actor.
pub fn ledger() -> (Ledger, MemoryStore, TestActor) {
    ledger_with_auditor(None)
}

pub fn ledger_with_auditor(auditor: Option<KeyPair>) -> (Ledger, MemoryStore, TestActor) {
    init_tracing();
    let store = MemoryStore::default();
    let ledger = Ledger::new(
        Arc::new(store.clone()),
        Arc::new(testing::test_loader()),
        &LedgerConfig::default(),
        KeyPair::generate(),
        auditor,
    );
    let actor = TestActor::register("entity-a", 1, ledger.identities());
    (ledger, store, actor)
}

/// Register `contract_id` for `actor` bound to the given sample binary.
pub fn register(ledger: &Ledger, actor: &TestActor, contract_id: &str, binary: &str) {
    let request = actor.contract_registration(contract_id, binary, None);
    ledger.register_contract(&request).unwrap();
}
