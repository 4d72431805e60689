//! Units of work over the asset store.
//!
//! A [`Transaction`] buffers reads and writes for one request; commit
//! assigns ages, extends hash chains and persists the whole write set as
//! one atomic batch under optimistic concurrency control. Writers take no
//! up-front locks: commit fails (it does not block) when another writer
//! advanced any implicated id first, and a failed commit persists nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::asset::{AssetFilter, AssetHasher, AssetProof, AssetVersion};
use crate::canonical::canonical_json;
use crate::contract::ContractKey;
use crate::error::{LedgerError, LedgerResult};
use crate::request::ExecutionRequest;
use crate::storage::{LedgerStore, StorageError};
use lib_crypto::Hash;

use crate::asset::ProofComposer;

/// Actor context recovered from the signed request a transaction is bound
/// to; stamped onto every version the transaction commits.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub contract_id: ContractKey,
    pub argument: String,
    pub signature: Vec<u8>,
}

impl RequestContext {
    pub fn from_execution_request(request: &ExecutionRequest) -> Self {
        Self {
            contract_id: request.contract_key(),
            argument: canonical_json(&request.contract_argument),
            signature: request.signature.clone(),
        }
    }
}

/// The committed state of an id as first observed by this transaction.
#[derive(Debug, Clone)]
struct ReadSnapshot {
    age: u64,
    data: String,
    hash: Hash,
}

/// One unit of work over one or more asset ids.
pub struct Transaction {
    store: Arc<dyn LedgerStore>,
    composer: Arc<ProofComposer>,
    context: Option<RequestContext>,
    /// id -> committed state observed (None = id did not exist).
    reads: BTreeMap<String, Option<ReadSnapshot>>,
    /// id -> canonical JSON text of the staged next version.
    writes: BTreeMap<String, String>,
    closed: bool,
}

impl Transaction {
    pub(crate) fn new(
        store: Arc<dyn LedgerStore>,
        composer: Arc<ProofComposer>,
        context: Option<RequestContext>,
    ) -> Self {
        Self {
            store,
            composer,
            context,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            closed: false,
        }
    }

    /// Latest state of `id` visible to this transaction: the staged write
    /// if present, otherwise the committed version (recorded as part of the
    /// replay seed on first read).
    pub(crate) fn read(&mut self, id: &str) -> LedgerResult<Option<(u64, String)>> {
        if let Some(pending) = self.writes.get(id).cloned() {
            let next_age = match self.observe(id)? {
                Some(snapshot) => snapshot.age + 1,
                None => 0,
            };
            return Ok(Some((next_age, pending)));
        }
        Ok(self
            .observe(id)?
            .map(|snapshot| (snapshot.age, snapshot.data)))
    }

    /// Committed history of one id. Scans do not join the replay seed; a
    /// contract's deterministic reads go through `get`.
    pub(crate) fn scan(&mut self, filter: &AssetFilter) -> LedgerResult<Vec<AssetVersion>> {
        Ok(self.store.scan_assets(filter)?)
    }

    /// Full committed tip of one id, for audit reads. Like `scan`, does
    /// not join the replay seed.
    pub(crate) fn latest_version(&mut self, id: &str) -> LedgerResult<Option<AssetVersion>> {
        Ok(self.store.latest_asset(id)?)
    }

    /// Stage `data` as the next version of `id`.
    pub(crate) fn write(&mut self, id: &str, data: String) -> LedgerResult<()> {
        // The committed predecessor must be observed before the write so
        // commit has an expected age to race on.
        self.observe(id)?;
        self.writes.insert(id.to_string(), data);
        Ok(())
    }

    fn observe(&mut self, id: &str) -> LedgerResult<Option<ReadSnapshot>> {
        if let Some(snapshot) = self.reads.get(id) {
            return Ok(snapshot.clone());
        }
        let latest = self.store.latest_asset(id)?;
        let snapshot = latest.map(|v| ReadSnapshot {
            age: v.age,
            data: v.data,
            hash: v.hash,
        });
        self.reads.insert(id.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    /// Canonical JSON of the whole read set: the replay seed stamped onto
    /// every version this transaction commits.
    pub(crate) fn input_json(&self) -> String {
        let mut map = Map::new();
        for (id, snapshot) in &self.reads {
            if let Some(s) = snapshot {
                let data: Value = serde_json::from_str(&s.data).unwrap_or(Value::Null);
                let mut entry = Map::new();
                entry.insert("age".to_string(), Value::from(s.age));
                entry.insert("data".to_string(), data);
                map.insert(id.clone(), Value::Object(entry));
            }
        }
        canonical_json(&Value::Object(map))
    }

    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Commit every staged write: assign the next age, extend the hash
    /// chain, persist the whole write set as one atomic batch, and return
    /// one proof pair per touched id. A commit that fails persists nothing.
    ///
    /// A conflict carries the `{id -> age}` this transaction lost the race
    /// for; it is NOT retried here — the caller runs recovery and decides.
    pub fn commit(&mut self) -> LedgerResult<(Vec<AssetProof>, Vec<AssetProof>)> {
        if self.closed {
            return Err(LedgerError::Unexpected(
                "commit on a closed transaction".to_string(),
            ));
        }
        self.closed = true;
        let context = self.context.clone();
        let input = self.input_json();

        let writes = std::mem::take(&mut self.writes);
        let mut versions = Vec::with_capacity(writes.len());
        for (id, data) in writes {
            let snapshot = self.reads.get(&id).cloned().flatten();
            let (age, prev_hash) = match &snapshot {
                Some(s) => (s.age + 1, s.hash),
                None => (0, Hash::EMPTY),
            };
            let (contract_id, argument, signature) = match &context {
                Some(ctx) => (
                    ctx.contract_id.clone(),
                    ctx.argument.clone(),
                    ctx.signature.clone(),
                ),
                None => (ContractKey::new("", 0, ""), "{}".to_string(), Vec::new()),
            };
            let hash = AssetHasher::compute(
                &id, age, &input, &data, &contract_id, &argument, &signature, &prev_hash,
            );
            versions.push(AssetVersion {
                id,
                age,
                input: input.clone(),
                data,
                contract_id,
                argument,
                signature,
                prev_hash,
                hash,
            });
        }

        match self.store.put_assets(&versions) {
            Ok(()) => {
                let mut ledger_proofs = Vec::with_capacity(versions.len());
                let mut auditor_proofs = Vec::new();
                for version in &versions {
                    debug!(id = %version.id, age = version.age, "committed asset version");
                    let (proof, auditor) =
                        self.composer.compose(&version.id, version.age, &version.hash);
                    ledger_proofs.push(proof);
                    if let Some(a) = auditor {
                        auditor_proofs.push(a);
                    }
                }
                Ok((ledger_proofs, auditor_proofs))
            }
            Err(StorageError::Conflict { id, age }) => {
                warn!(id = %id, age, "commit lost an optimistic-concurrency race");
                Err(LedgerError::Conflict {
                    ids: HashMap::from([(id, age)]),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discard all pending writes. Always safe, including after a failed
    /// commit; idempotent.
    pub fn abort(&mut self) {
        self.writes.clear();
        self.closed = true;
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Demarcates units of work and owns post-conflict recovery.
pub struct TransactionManager {
    store: Arc<dyn LedgerStore>,
    composer: Arc<ProofComposer>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn LedgerStore>, composer: Arc<ProofComposer>) -> Self {
        Self { store, composer }
    }

    /// Begin a unit of work bound to a signed execution request.
    pub fn start_with(&self, request: &ExecutionRequest) -> Transaction {
        Transaction::new(
            Arc::clone(&self.store),
            Arc::clone(&self.composer),
            Some(RequestContext::from_execution_request(request)),
        )
    }

    /// Begin an unbound (audit/read) unit of work.
    pub fn start(&self) -> Transaction {
        Transaction::new(Arc::clone(&self.store), Arc::clone(&self.composer), None)
    }

    /// Post-conflict bookkeeping: re-read each implicated chain tip and
    /// verify its content hash, so the caller retries against a stable
    /// store. The conflict itself is still surfaced to the original caller.
    pub fn recover(&self, ids: &HashMap<String, u64>) -> LedgerResult<()> {
        for id in ids.keys() {
            match self.store.latest_asset(id)? {
                Some(tip) => {
                    let recomputed = AssetHasher::recompute(&tip);
                    if recomputed != tip.hash {
                        return Err(LedgerError::RecoveryFailed {
                            id: id.clone(),
                            reason: format!(
                                "chain tip hash mismatch at age {}: stored {}, recomputed {}",
                                tip.age, tip.hash, recomputed
                            ),
                        });
                    }
                    info!(id = %id, age = tip.age, "recovered conflicted asset; chain tip intact");
                }
                None => {
                    return Err(LedgerError::RecoveryFailed {
                        id: id.clone(),
                        reason: "conflicting writer left no committed version".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager").finish_non_exhaustive()
    }
}
