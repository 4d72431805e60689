//! The `Ledger` facade: one aggregate wiring every engine component behind
//! the client operations.

use std::sync::Arc;

use tracing::info;

use crate::asset::{AssetProof, ProofComposer};
use crate::config::LedgerConfig;
use crate::contract::loader::ContractLoader;
use crate::contract::manager::ContractManager;
use crate::error::LedgerResult;
use crate::execution::{ContractExecutor, ExecutionOutcome};
use crate::identity::{IdentityKeyEntry, IdentityRegistry};
use crate::request::{
    AssetProofRetrievalRequest, ContractRegistrationRequest, ExecutionRequest,
    LedgerValidationRequest,
};
use crate::storage::LedgerStore;
use crate::transaction::TransactionManager;
use crate::validation::{LedgerValidationService, ValidationReport};
use lib_crypto::KeyPair;

/// The tamper-evident ledger engine.
///
/// Owns the wiring, not the policy: every operation delegates to the
/// component that implements it. Cheap to share (`Arc` the whole thing);
/// all operations take `&self`.
pub struct Ledger {
    identities: Arc<IdentityRegistry>,
    contracts: Arc<ContractManager>,
    executor: ContractExecutor,
    validation: LedgerValidationService,
    composer: Arc<ProofComposer>,
}

impl Ledger {
    /// Assemble an engine over `store` with `loader` as the contract
    /// loading strategy. Passing an auditor keypair switches the engine
    /// into dual-control mode.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        loader: Arc<dyn ContractLoader>,
        config: &LedgerConfig,
        ledger_key: KeyPair,
        auditor_key: Option<KeyPair>,
    ) -> Self {
        let composer = Arc::new(ProofComposer::new(ledger_key, auditor_key));
        let identities = Arc::new(IdentityRegistry::new(Arc::clone(&store)));
        let contracts = Arc::new(ContractManager::new(
            Arc::clone(&store),
            Arc::clone(&identities),
            loader,
            config,
        ));
        let transactions = Arc::new(TransactionManager::new(
            Arc::clone(&store),
            Arc::clone(&composer),
        ));
        let executor = ContractExecutor::new(
            store,
            Arc::clone(&identities),
            Arc::clone(&contracts),
            Arc::clone(&transactions),
            composer.auditor_public_key(),
        );
        let validation = LedgerValidationService::new(
            Arc::clone(&identities),
            Arc::clone(&contracts),
            transactions,
            Arc::clone(&composer),
        );
        info!(dual_control = composer.dual_control(), "ledger assembled");
        Self {
            identities,
            contracts,
            executor,
            validation,
            composer,
        }
    }

    /// The identity registry, for key registration and rotation.
    pub fn identities(&self) -> &Arc<IdentityRegistry> {
        &self.identities
    }

    /// Register one identity key version (rotation is registering a higher
    /// version).
    pub fn register_identity(&self, entry: IdentityKeyEntry) -> LedgerResult<()> {
        self.identities.register(entry)
    }

    pub fn register_contract(&self, request: &ContractRegistrationRequest) -> LedgerResult<()> {
        self.contracts.register_contract(request)
    }

    pub fn register_function(&self, request: &ContractRegistrationRequest) -> LedgerResult<()> {
        self.contracts.register_function(request)
    }

    /// Execute a signed contract invocation (write path).
    pub fn execute(&self, request: &ExecutionRequest) -> LedgerResult<ExecutionOutcome> {
        self.executor.execute(request)
    }

    /// Re-verify an asset's history (audit path).
    pub fn validate(&self, request: &LedgerValidationRequest) -> LedgerResult<ValidationReport> {
        self.validation.validate(request)
    }

    /// Serve a signed proof of one asset version.
    pub fn retrieve_proof(
        &self,
        request: &AssetProofRetrievalRequest,
    ) -> LedgerResult<(AssetProof, Option<AssetProof>)> {
        self.validation.retrieve(request)
    }

    /// Verifying key for ledger-signed proofs.
    pub fn public_key(&self) -> Vec<u8> {
        self.composer.ledger_public_key()
    }

    /// Verifying key for auditor-signed proofs, in dual-control mode.
    pub fn auditor_public_key(&self) -> Option<Vec<u8>> {
        self.composer.auditor_public_key()
    }

    pub fn dual_control(&self) -> bool {
        self.composer.dual_control()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("dual_control", &self.dual_control())
            .finish_non_exhaustive()
    }
}
