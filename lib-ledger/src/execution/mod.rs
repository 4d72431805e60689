//! Contract execution: the single entry point of the write path.
//!
//! # Execution Order (NON-NEGOTIABLE)
//!
//! ```text
//! validate request signature(s)
//! start transaction (bound to the request)
//! resolve contract entry (+ chained function entries)
//! instantiate machines (identity-validated)
//! invoke contract against its declared ledger view
//! invoke chained functions, in order, against the function database
//! commit
//! ```
//!
//! **Any error → abort.** Only a commit-time conflict additionally runs
//! transaction-manager recovery before propagating; a business-logic
//! failure raised by contract or function code is not a storage race and
//! never triggers recovery.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::asset::AssetProof;
use crate::contract::manager::ContractManager;
use crate::contract::{ContractError, ContractKey};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::IdentityRegistry;
use crate::ledger::{StagedFunctionDatabase, TransactionLedgerView};
use crate::request::{ExecutionRequest, SignedRequest};
use crate::storage::LedgerStore;
use crate::transaction::{Transaction, TransactionManager};

/// Everything a successful execution returns to the client.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub contract_result: Option<Value>,
    /// Result of the last chained function, if any were requested.
    pub function_result: Option<Value>,
    pub ledger_proofs: Vec<AssetProof>,
    /// Present only in dual-control mode.
    pub auditor_proofs: Vec<AssetProof>,
    /// False when the asset versions committed but the staged function
    /// data could not be persisted afterwards. The proofs above still
    /// stand; the caller decides whether to re-run the functions.
    pub function_data_flushed: bool,
}

/// Orchestrates one execution request end-to-end.
pub struct ContractExecutor {
    store: Arc<dyn LedgerStore>,
    identities: Arc<IdentityRegistry>,
    contracts: Arc<ContractManager>,
    transactions: Arc<TransactionManager>,
    /// Auditor verifying key; set in dual-control mode.
    auditor_public_key: Option<Vec<u8>>,
}

impl ContractExecutor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        identities: Arc<IdentityRegistry>,
        contracts: Arc<ContractManager>,
        transactions: Arc<TransactionManager>,
        auditor_public_key: Option<Vec<u8>>,
    ) -> Self {
        Self {
            store,
            identities,
            contracts,
            transactions,
            auditor_public_key,
        }
    }

    /// Execute one signed request. Strictly sequential, no partial
    /// commits.
    pub fn execute(&self, request: &ExecutionRequest) -> LedgerResult<ExecutionOutcome> {
        self.validate_request(request)?;
        // Nonce shape is checked up front so a malformed argument never
        // reaches contract code.
        request.nonce()?;

        let mut tx = self.transactions.start_with(request);
        match self.run(request, &mut tx) {
            Ok(outcome) => {
                info!(
                    contract = %request.contract_key(),
                    proofs = outcome.ledger_proofs.len(),
                    "execution committed"
                );
                Ok(outcome)
            }
            Err(LedgerError::Conflict { ids }) => {
                tx.abort();
                warn!(?ids, "execution conflicted; running recovery");
                self.transactions.recover(&ids)?;
                Err(LedgerError::Conflict { ids })
            }
            Err(e) => {
                tx.abort();
                Err(e)
            }
        }
    }

    fn run(
        &self,
        request: &ExecutionRequest,
        tx: &mut Transaction,
    ) -> LedgerResult<ExecutionOutcome> {
        // Resolve and instantiate everything before invoking anything:
        // an unloadable chained function must fail the request without a
        // contract side effect.
        let contract_entry = self.contracts.get_contract(&request.contract_key())?;
        let machine = self.contracts.contract_instance(&contract_entry)?;

        let mut function_machines = Vec::with_capacity(request.function_ids.len());
        for function_id in &request.function_ids {
            let key = ContractKey::new(&request.entity_id, request.key_version, function_id);
            let entry = self.contracts.get_function(&key)?;
            function_machines.push((key, self.contracts.function_instance(&entry)?));
        }

        let contract_result = {
            let mut view = TransactionLedgerView::new(tx, machine.representation());
            machine
                .invoke(&mut view, &request.contract_argument)
                .map_err(business)?
        };
        debug!(contract = %request.contract_key(), "contract invocation finished");

        // Every chained function runs fully; only the last result is
        // surfaced.
        let mut database = StagedFunctionDatabase::new(Arc::clone(&self.store));
        let mut function_result = None;
        for (key, function) in &function_machines {
            function_result = function
                .invoke(
                    &mut database,
                    &request.contract_argument,
                    request.function_argument.as_ref(),
                )
                .map_err(business)?;
            debug!(function = %key, "chained function finished");
        }

        let (ledger_proofs, auditor_proofs) = tx.commit()?;
        // The commit is the point of no return: once versions are on the
        // chain, a failure persisting auxiliary function data must not be
        // reported as a failed execution. It is surfaced on the outcome
        // instead.
        let function_data_flushed = match database.flush() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "staged function data lost after commit; versions stand");
                false
            }
        };

        Ok(ExecutionOutcome {
            contract_result,
            function_result,
            ledger_proofs,
            auditor_proofs,
            function_data_flushed,
        })
    }

    fn validate_request(&self, request: &ExecutionRequest) -> LedgerResult<()> {
        let authenticator = self
            .identities
            .authenticator(&request.entity_id, request.key_version)?;
        request.validate_with(authenticator.as_ref())?;

        if let Some(auditor_key) = &self.auditor_public_key {
            let auditor_signature = request.auditor_signature.as_deref().ok_or_else(|| {
                LedgerError::SignatureInvalid {
                    entity_id: "auditor".to_string(),
                    key_version: 0,
                }
            })?;
            let valid = lib_crypto::verify_signature(
                &request.canonical_bytes(),
                auditor_signature,
                auditor_key,
            )
            .unwrap_or(false);
            if !valid {
                return Err(LedgerError::SignatureInvalid {
                    entity_id: "auditor".to_string(),
                    key_version: 0,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ContractExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractExecutor")
            .field("dual_control", &self.auditor_public_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Contract failures propagate verbatim as business errors; anything the
/// contract did not anticipate is still the contract's failure, not the
/// engine's.
fn business(e: ContractError) -> LedgerError {
    match e {
        ContractError::Business(m) => LedgerError::Business(m),
        ContractError::Unexpected(m) => LedgerError::Business(m),
    }
}
