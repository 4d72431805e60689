//! Write-path integration: signed execution through the `Ledger` facade.

mod common;

use lib_crypto::KeyPair;
use lib_ledger::asset::AssetFilter;
use lib_ledger::storage::LedgerStore;
use lib_ledger::testing::{self, state_argument};
use lib_ledger::LedgerError;
use serde_json::json;

#[test]
fn sequential_executions_build_a_hash_chain() {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);

    for (i, nonce) in ["n0", "n1", "n2"].iter().enumerate() {
        let request = actor.execution("c1", state_argument(nonce, "acct", i as u64));
        let outcome = ledger.execute(&request).unwrap();
        assert_eq!(outcome.ledger_proofs.len(), 1);
        assert_eq!(outcome.ledger_proofs[0].age, i as u64);
        assert!(outcome.ledger_proofs[0].verify_with(&ledger.public_key()));
        assert!(outcome.auditor_proofs.is_empty());
    }

    let history = store.scan_assets(&AssetFilter::all("acct")).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[0].prev_hash.is_empty());
    for pair in history.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].hash);
    }
    assert_eq!(history[2].data, r#"{"state":2}"#);
}

#[test]
fn contract_result_is_surfaced() {
    let (ledger, _store, actor) = common::ledger();
    common::register(&ledger, &actor, "writer", testing::STATE_UPDATER);
    common::register(&ledger, &actor, "reader", testing::STATE_READER);

    let write = actor.execution("writer", state_argument("n0", "acct", 42));
    ledger.execute(&write).unwrap();

    let read = actor.execution("reader", json!({"nonce": "n1", "asset_id": "acct"}));
    let outcome = ledger.execute(&read).unwrap();
    assert_eq!(
        outcome.contract_result.unwrap(),
        json!({"age": 0, "data": {"state": 42}})
    );
    // A read-only invocation commits nothing.
    assert!(outcome.ledger_proofs.is_empty());
}

#[test]
fn business_failure_aborts_without_a_version() {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "failer", testing::FAILER);

    let request = actor.execution(
        "failer",
        json!({"nonce": "n0", "asset_id": "acct", "reason": "limit exceeded"}),
    );
    match ledger.execute(&request) {
        Err(LedgerError::Business(reason)) => assert_eq!(reason, "limit exceeded"),
        other => panic!("expected business failure, got {other:?}"),
    }
    assert!(store.latest_asset("acct").unwrap().is_none());
}

#[test]
fn forged_request_signature_is_rejected() {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);

    let mut request = actor.execution("c1", state_argument("n0", "acct", 1));
    request.signature[0] ^= 0xff;
    assert!(matches!(
        ledger.execute(&request),
        Err(LedgerError::SignatureInvalid { .. })
    ));
    assert!(store.latest_asset("acct").unwrap().is_none());
}

#[test]
fn missing_nonce_is_a_malformed_argument() {
    let (ledger, _store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);

    let request = actor.execution("c1", json!({"asset_id": "acct", "state": 1}));
    assert!(matches!(
        ledger.execute(&request),
        Err(LedgerError::MalformedArgument(_))
    ));
}

#[test]
fn unknown_contract_is_not_found() {
    let (ledger, _store, actor) = common::ledger();
    let request = actor.execution("missing", state_argument("n0", "acct", 1));
    assert!(matches!(
        ledger.execute(&request),
        Err(LedgerError::ContractNotFound(_))
    ));
}

#[test]
fn chained_function_writes_after_commit() {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);
    let function = actor.contract_registration("audit", testing::RECORDER, None);
    ledger.register_function(&function).unwrap();

    let request = actor.execution_with_functions(
        "c1",
        state_argument("n0", "acct", 7),
        vec!["audit".to_string()],
        Some(json!({"key": "audit/acct", "note": "first write"})),
    );
    let outcome = ledger.execute(&request).unwrap();
    assert_eq!(outcome.ledger_proofs.len(), 1);
    assert!(outcome.function_result.is_some());

    let recorded = store.get_data("audit/acct").unwrap().unwrap();
    let recorded: serde_json::Value = serde_json::from_slice(&recorded).unwrap();
    assert_eq!(recorded["note"], json!("first write"));
}

#[test]
fn failed_contract_leaves_no_function_side_effects() {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "failer", testing::FAILER);
    let function = actor.contract_registration("audit", testing::RECORDER, None);
    ledger.register_function(&function).unwrap();

    let request = actor.execution_with_functions(
        "failer",
        json!({"nonce": "n0", "asset_id": "acct"}),
        vec!["audit".to_string()],
        Some(json!({"key": "audit/acct"})),
    );
    assert!(ledger.execute(&request).is_err());
    assert!(store.get_data("audit/acct").unwrap().is_none());
}

#[test]
fn unknown_chained_function_fails_before_any_commit() {
    let (ledger, store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);

    let request = actor.execution_with_functions(
        "c1",
        state_argument("n0", "acct", 1),
        vec!["missing".to_string()],
        None,
    );
    assert!(matches!(
        ledger.execute(&request),
        Err(LedgerError::FunctionNotFound(_))
    ));
    assert!(store.latest_asset("acct").unwrap().is_none());
}

#[test]
fn key_value_contract_round_trips_through_canonical_form() {
    let (ledger, _store, actor) = common::ledger();
    common::register(&ledger, &actor, "fields", testing::FIELD_UPDATER);
    common::register(&ledger, &actor, "reader", testing::STATE_READER);

    let request = actor.execution(
        "fields",
        json!({
            "nonce": "n0",
            "asset_id": "acct",
            "fields": {"balance": "100", "owner.name": "\"alice\""}
        }),
    );
    ledger.execute(&request).unwrap();

    // The tree-representation reader sees the nested canonical form.
    let read = actor.execution("reader", json!({"nonce": "n1", "asset_id": "acct"}));
    let outcome = ledger.execute(&read).unwrap();
    assert_eq!(
        outcome.contract_result.unwrap()["data"],
        json!({"balance": 100, "owner": {"name": "alice"}})
    );
}

#[test]
fn dual_control_requires_an_auditor_countersignature() {
    let auditor = KeyPair::generate();
    let (ledger, _store, actor) = common::ledger_with_auditor(Some(auditor.clone()));
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);

    let mut request = actor.execution("c1", state_argument("n0", "acct", 1));
    assert!(matches!(
        ledger.execute(&request),
        Err(LedgerError::SignatureInvalid { .. })
    ));

    testing::countersign(&mut request, &auditor);
    let outcome = ledger.execute(&request).unwrap();
    assert_eq!(outcome.auditor_proofs.len(), 1);
    assert!(outcome.auditor_proofs[0].verify_with(&ledger.auditor_public_key().unwrap()));
    assert!(outcome.ledger_proofs[0].verify_with(&ledger.public_key()));
}

#[test]
fn identity_rotation_executes_under_the_new_version() {
    let (ledger, _store, actor) = common::ledger();
    common::register(&ledger, &actor, "c1", testing::STATE_UPDATER);
    ledger
        .execute(&actor.execution("c1", state_argument("n0", "acct", 1)))
        .unwrap();

    // Rotate: same entity, higher key version, its own contract
    // registration.
    let rotated = lib_ledger::testing::TestActor::register("entity-a", 2, ledger.identities());
    common::register(&ledger, &rotated, "c1", testing::STATE_UPDATER);
    let outcome = ledger
        .execute(&rotated.execution("c1", state_argument("n1", "acct", 2)))
        .unwrap();
    assert_eq!(outcome.ledger_proofs[0].age, 1);

    // The old actor's signatures still verify under its own version.
    let outcome = ledger
        .execute(&actor.execution("c1", state_argument("n2", "acct", 3)))
        .unwrap();
    assert_eq!(outcome.ledger_proofs[0].age, 2);
}
