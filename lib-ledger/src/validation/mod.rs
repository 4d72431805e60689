//! Audit path: deterministic replay and the validator pipeline.
//!
//! Validation trusts nothing but key material: every scanned version is
//! re-verified from its own recorded fields, in a fixed order,
//! short-circuiting at the first failure. The order is protocol:
//!
//! ```text
//! nonce → contract signature → content hash → chain linkage → output
//! ```
//!
//! A non-OK status means the *stored data* is wrong (tampered or corrupt),
//! never that the request was wrong; request problems surface as errors
//! before the pipeline runs.
//!
//! Audit reads run inside a demarcated read-only transaction, the same
//! unit-of-work boundary the write path uses: committed when the run
//! finishes, aborted on any storage failure mid-scan.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::asset::{AssetFilter, AssetHasher, AssetProof, AssetVersion, ProofComposer};
use crate::contract::manager::ContractManager;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::IdentityRegistry;
use crate::ledger::TracerView;
use crate::request::{
    execution_signing_bytes, AssetProofRetrievalRequest, LedgerValidationRequest, SignedRequest,
};
use crate::transaction::{Transaction, TransactionManager};
use lib_crypto::Hash;

/// Outcome of validating one asset's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Every scanned version re-verified.
    Ok,
    /// A client nonce repeats within the scanned history.
    InvalidNonce,
    /// A version's request signature does not verify against the key that
    /// was active for its recorded identity.
    InvalidContract,
    /// A version's recomputed content hash differs from the stored one.
    InvalidHash,
    /// A version's `prev_hash` does not match its predecessor's hash.
    InvalidPrevHash,
    /// Deterministic replay produced a different output than the stored
    /// `data`.
    InvalidOutput,
}

impl ValidationStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationStatus::Ok)
    }
}

/// What a validation run hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    /// Proof of the newest validated version; present only when `status`
    /// is OK.
    pub proof: Option<AssetProof>,
    /// Second witness; present only in dual-control mode.
    pub auditor_proof: Option<AssetProof>,
    /// Age of the version the pipeline rejected; `None` when OK.
    pub failed_age: Option<u64>,
}

impl ValidationReport {
    fn ok(proof: AssetProof, auditor_proof: Option<AssetProof>) -> Self {
        Self {
            status: ValidationStatus::Ok,
            proof: Some(proof),
            auditor_proof,
            failed_age: None,
        }
    }

    fn failed(status: ValidationStatus, age: u64) -> Self {
        Self {
            status,
            proof: None,
            auditor_proof: None,
            failed_age: Some(age),
        }
    }
}

/// Replays and re-verifies asset histories; serves signed proofs.
pub struct LedgerValidationService {
    identities: Arc<IdentityRegistry>,
    contracts: Arc<ContractManager>,
    transactions: Arc<TransactionManager>,
    composer: Arc<ProofComposer>,
}

impl LedgerValidationService {
    pub fn new(
        identities: Arc<IdentityRegistry>,
        contracts: Arc<ContractManager>,
        transactions: Arc<TransactionManager>,
        composer: Arc<ProofComposer>,
    ) -> Self {
        Self {
            identities,
            contracts,
            transactions,
            composer,
        }
    }

    /// Validate one asset's history within the requested age range.
    pub fn validate(&self, request: &LedgerValidationRequest) -> LedgerResult<ValidationReport> {
        self.authenticate(request)?;
        let mut tx = self.transactions.start();
        match self.validate_in(&mut tx, request) {
            Ok(report) => {
                tx.commit()?;
                Ok(report)
            }
            Err(e) => {
                tx.abort();
                Err(e)
            }
        }
    }

    fn validate_in(
        &self,
        tx: &mut Transaction,
        request: &LedgerValidationRequest,
    ) -> LedgerResult<ValidationReport> {
        let start = request.start_age.unwrap_or(0);
        let end = request.end_age.unwrap_or(u64::MAX);
        let versions = tx.scan(&AssetFilter::range(&request.asset_id, start, end))?;
        if versions.is_empty() {
            return Err(LedgerError::AssetNotFound {
                id: request.asset_id.clone(),
            });
        }

        // Chain anchor for a partial scan: ages are gap-free, so a missing
        // predecessor at start_age - 1 is itself corruption.
        let mut expected_prev = if start == 0 {
            Some(Hash::EMPTY)
        } else {
            tx.scan(&AssetFilter::exact(&request.asset_id, start - 1))?
                .pop()
                .map(|anchor| anchor.hash)
        };

        let mut seen_nonces: HashSet<String> = HashSet::new();
        for version in &versions {
            let status = self.validate_version(version, expected_prev, &mut seen_nonces)?;
            if !status.is_ok() {
                warn!(
                    id = %version.id,
                    age = version.age,
                    ?status,
                    "validation pipeline rejected a version"
                );
                return Ok(ValidationReport::failed(status, version.age));
            }
            debug!(id = %version.id, age = version.age, "version re-verified");
            expected_prev = Some(version.hash);
        }

        // Every version passed; attest the newest one.
        let newest = &versions[versions.len() - 1];
        info!(
            id = %newest.id,
            through_age = newest.age,
            "asset history validated"
        );
        let (proof, auditor) = self.composer.compose(&newest.id, newest.age, &newest.hash);
        Ok(ValidationReport::ok(proof, auditor))
    }

    /// Serve a signed proof of one version: exact age, or the latest when
    /// the request carries the latest sentinel.
    pub fn retrieve(
        &self,
        request: &AssetProofRetrievalRequest,
    ) -> LedgerResult<(AssetProof, Option<AssetProof>)> {
        self.authenticate(request)?;
        let mut tx = self.transactions.start();
        match self.retrieve_in(&mut tx, request) {
            Ok(proofs) => {
                tx.commit()?;
                Ok(proofs)
            }
            Err(e) => {
                tx.abort();
                Err(e)
            }
        }
    }

    fn retrieve_in(
        &self,
        tx: &mut Transaction,
        request: &AssetProofRetrievalRequest,
    ) -> LedgerResult<(AssetProof, Option<AssetProof>)> {
        let version = if request.wants_latest() {
            tx.latest_version(&request.asset_id)?
        } else {
            let age = request.age.unwrap_or(u64::MAX);
            tx.scan(&AssetFilter::exact(&request.asset_id, age))?.pop()
        };
        let version = version.ok_or_else(|| LedgerError::AssetNotFound {
            id: request.asset_id.clone(),
        })?;
        Ok(self
            .composer
            .compose(&version.id, version.age, &version.hash))
    }

    fn authenticate(&self, request: &impl SignedRequest) -> LedgerResult<()> {
        let authenticator = self
            .identities
            .authenticator(request.entity_id(), request.key_version())?;
        request.validate_with(authenticator.as_ref())
    }

    // =========================================================================
    // The pipeline
    // =========================================================================

    fn validate_version(
        &self,
        version: &AssetVersion,
        expected_prev: Option<Hash>,
        seen_nonces: &mut HashSet<String>,
    ) -> LedgerResult<ValidationStatus> {
        if !self.nonce_is_fresh(version, seen_nonces) {
            return Ok(ValidationStatus::InvalidNonce);
        }
        if !self.contract_signature_verifies(version)? {
            return Ok(ValidationStatus::InvalidContract);
        }
        if AssetHasher::recompute(version) != version.hash {
            return Ok(ValidationStatus::InvalidHash);
        }
        match expected_prev {
            Some(expected) if version.prev_hash == expected => {}
            _ => return Ok(ValidationStatus::InvalidPrevHash),
        }
        if !self.replay_matches(version)? {
            return Ok(ValidationStatus::InvalidOutput);
        }
        Ok(ValidationStatus::Ok)
    }

    /// A tampered or nonce-less argument and a replayed nonce are the same
    /// finding: this version cannot be tied to a unique client request.
    fn nonce_is_fresh(&self, version: &AssetVersion, seen: &mut HashSet<String>) -> bool {
        let nonce = serde_json::from_str::<Value>(&version.argument)
            .ok()
            .and_then(|a| a.get("nonce").and_then(Value::as_str).map(str::to_string));
        match nonce {
            Some(nonce) => seen.insert(nonce),
            None => false,
        }
    }

    /// Re-verify the recorded request signature against the key that was
    /// active for the recorded `entity_id/key_version` — rotation keeps
    /// old versions resolvable precisely for this check.
    fn contract_signature_verifies(&self, version: &AssetVersion) -> LedgerResult<bool> {
        let key = &version.contract_id;
        let authenticator = match self.identities.authenticator(&key.entity_id, key.key_version) {
            Ok(a) => a,
            // An unresolvable identity cannot vouch for the write.
            Err(LedgerError::IdentityNotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let bytes =
            execution_signing_bytes(key, &version.argument, &key.entity_id, key.key_version);
        authenticator.validate(&bytes, &version.signature)
    }

    /// Replay the declaring contract against the recorded input snapshot
    /// and compare its output for this id bit-for-bit with the stored
    /// `data`.
    fn replay_matches(&self, version: &AssetVersion) -> LedgerResult<bool> {
        let entry = self.contracts.get_contract(&version.contract_id)?;
        let machine = self.contracts.contract_instance(&entry)?;
        let argument: Value = match serde_json::from_str(&version.argument) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };
        let mut tracer = TracerView::from_input(&version.input, machine.representation())?;
        if machine.invoke(&mut tracer, &argument).is_err() {
            // The original execution committed; a replay that now fails
            // cannot reproduce the stored output.
            return Ok(false);
        }
        Ok(tracer.recomputed_output(&version.id).as_deref() == Some(version.data.as_str()))
    }
}

impl std::fmt::Debug for LedgerValidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerValidationService")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ok_is_ok() {
        assert!(ValidationStatus::Ok.is_ok());
        for status in [
            ValidationStatus::InvalidNonce,
            ValidationStatus::InvalidContract,
            ValidationStatus::InvalidHash,
            ValidationStatus::InvalidPrevHash,
            ValidationStatus::InvalidOutput,
        ] {
            assert!(!status.is_ok());
        }
    }
}
