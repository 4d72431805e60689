//! Audit-path integration: replay validation, tamper detection, proofs.

mod common;

use std::sync::Arc;

use lib_crypto::{Hash, KeyPair};
use lib_ledger::asset::{AssetFilter, AssetHasher, AssetVersion};
use lib_ledger::storage::{LedgerStore, MemoryStore, SledStore};
use lib_ledger::testing::{self, state_argument, TestActor};
use lib_ledger::{Ledger, LedgerConfig, LedgerError, ValidationStatus};
use serde_json::json;

fn populated(writes: u64) -> (Ledger, MemoryStore, TestActor) {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);
    for i in 0..writes {
        let request = actor.execution("c1", state_argument(&format!("n{i}"), "acct", i));
        ledger.execute(&request).unwrap();
    }
    (ledger, store, actor)
}

fn stored(store: &MemoryStore, age: u64) -> AssetVersion {
    store
        .scan_assets(&AssetFilter::exact("acct", age))
        .unwrap()
        .pop()
        .unwrap()
}

#[test]
fn intact_history_validates_ok() {
    let (ledger, _store, actor) = populated(3);
    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::Ok);
    assert_eq!(report.failed_age, None);
    let proof = report.proof.unwrap();
    assert_eq!(proof.age, 2);
    assert!(proof.verify_with(&ledger.public_key()));
}

#[test]
fn unknown_asset_is_not_found() {
    let (ledger, _store, actor) = populated(1);
    assert!(matches!(
        ledger.validate(&actor.validation("missing", None, None)),
        Err(LedgerError::AssetNotFound { .. })
    ));
}

#[test]
fn forged_validation_request_is_rejected() {
    let (ledger, _store, actor) = populated(1);
    let mut request = actor.validation("acct", None, None);
    request.signature[0] ^= 0xff;
    assert!(matches!(
        ledger.validate(&request),
        Err(LedgerError::SignatureInvalid { .. })
    ));
}

#[test]
fn tampered_data_is_an_invalid_hash() {
    let (ledger, store, actor) = populated(3);
    let mut version = stored(&store, 1);
    version.data = r#"{"state":999}"#.to_string();
    store.tamper_asset(&version).unwrap();

    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::InvalidHash);
    assert_eq!(report.failed_age, Some(1));
    assert!(report.proof.is_none());
}

#[test]
fn tampered_data_with_recomputed_hash_is_an_invalid_output() {
    // Covering the tamper with a recomputed hash defeats the hash check;
    // deterministic replay still exposes it.
    let (ledger, store, actor) = populated(3);
    let mut version = stored(&store, 2);
    version.data = r#"{"state":999}"#.to_string();
    version.hash = AssetHasher::recompute(&version);
    store.tamper_asset(&version).unwrap();

    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::InvalidOutput);
    assert_eq!(report.failed_age, Some(2));
}

#[test]
fn broken_chain_link_is_an_invalid_prev_hash() {
    let (ledger, store, actor) = populated(3);
    let mut version = stored(&store, 1);
    version.prev_hash = Hash::new([0xaa; 32]);
    version.hash = AssetHasher::recompute(&version);
    store.tamper_asset(&version).unwrap();

    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::InvalidPrevHash);
    assert_eq!(report.failed_age, Some(1));
}

#[test]
fn tampered_request_signature_is_an_invalid_contract() {
    let (ledger, store, actor) = populated(2);
    let mut version = stored(&store, 0);
    version.signature[0] ^= 0xff;
    version.hash = AssetHasher::recompute(&version);
    store.tamper_asset(&version).unwrap();

    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::InvalidContract);
    assert_eq!(report.failed_age, Some(0));
}

#[test]
fn nonce_replay_is_detected() {
    let (ledger, _store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);
    for state in [1u64, 2] {
        let request = actor.execution("c1", state_argument("reused", "acct", state));
        ledger.execute(&request).unwrap();
    }

    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::InvalidNonce);
    assert_eq!(report.failed_age, Some(1));
}

#[test]
fn partial_range_is_anchored_to_its_predecessor() {
    let (ledger, store, actor) = populated(4);
    let report = ledger
        .validate(&actor.validation("acct", Some(1), Some(2)))
        .unwrap();
    assert_eq!(report.status, ValidationStatus::Ok);
    assert_eq!(report.proof.unwrap().age, 2);

    // Corrupting the version just below the range breaks the anchor.
    let mut anchor = stored(&store, 0);
    anchor.hash = Hash::new([0xbb; 32]);
    store.tamper_asset(&anchor).unwrap();
    let report = ledger
        .validate(&actor.validation("acct", Some(1), Some(2)))
        .unwrap();
    assert_eq!(report.status, ValidationStatus::InvalidPrevHash);
    assert_eq!(report.failed_age, Some(1));
}

#[test]
fn rotated_identity_history_still_validates() {
    let (ledger, _store, actor) = populated(2);
    let rotated = TestActor::register("entity-a", 2, ledger.identities());
    common::register(&ledger, &rotated, "c1", testing::STATE_UPDATER);
    ledger
        .execute(&rotated.execution("c1", state_argument("n9", "acct", 9)))
        .unwrap();

    // Ages 0-1 verify against key version 1, age 2 against version 2.
    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::Ok);
    assert_eq!(report.proof.unwrap().age, 2);
}

#[test]
fn proof_retrieval_exact_and_latest() {
    let (ledger, _store, actor) = populated(3);

    let (exact, auditor) = ledger.retrieve_proof(&actor.retrieval("acct", Some(1))).unwrap();
    assert_eq!(exact.age, 1);
    assert!(auditor.is_none());
    assert!(exact.verify_with(&ledger.public_key()));

    let (latest, _) = ledger.retrieve_proof(&actor.retrieval("acct", None)).unwrap();
    assert_eq!(latest.age, 2);
    let (sentinel, _) = ledger
        .retrieve_proof(&actor.retrieval("acct", Some(u64::MAX)))
        .unwrap();
    assert_eq!(sentinel.age, 2);

    assert!(matches!(
        ledger.retrieve_proof(&actor.retrieval("missing", None)),
        Err(LedgerError::AssetNotFound { .. })
    ));
}

#[test]
fn dual_control_validation_carries_both_witnesses() {
    let auditor = KeyPair::generate();
    let (ledger, _store, actor) = common::ledger_with_auditor(Some(auditor.clone()));
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);
    let mut request = actor.execution("c1", state_argument("n0", "acct", 1));
    testing::countersign(&mut request, &auditor);
    ledger.execute(&request).unwrap();

    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::Ok);
    let auditor_proof = report.auditor_proof.unwrap();
    assert!(auditor_proof.verify_with(&ledger.auditor_public_key().unwrap()));
}

#[test]
fn history_survives_a_sled_reopen() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(testing::test_loader());
    let config = LedgerConfig::default();

    let actor = {
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let ledger = Ledger::new(store, loader.clone(), &config, KeyPair::generate(), None);
        let actor = TestActor::register("entity-a", 1, ledger.identities());
        common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);
        for i in 0..3u64 {
            let request = actor.execution("c1", state_argument(&format!("n{i}"), "acct", i));
            ledger.execute(&request).unwrap();
        }
        actor
    };

    // Same files, fresh process state: identities, contracts and the asset
    // chain all resolve from disk.
    let store = Arc::new(SledStore::open(dir.path()).unwrap());
    let ledger = Ledger::new(store, loader, &config, KeyPair::generate(), None);
    let report = ledger.validate(&actor.validation("acct", None, None)).unwrap();
    assert_eq!(report.status, ValidationStatus::Ok);
    assert_eq!(report.proof.unwrap().age, 2);

    let read = actor.execution(
        "c1",
        json!({"nonce": "n9", "asset_id": "acct", "state": 9}),
    );
    let outcome = ledger.execute(&read).unwrap();
    assert_eq!(outcome.ledger_proofs[0].age, 3);
}
