//! Ledger views handed to contract and function code.
//!
//! One canonical record form, several stateless representations on top of
//! it — a translation boundary, never separate storage.

pub mod database;
pub mod representation;
pub mod tracer;
pub mod view;

pub use database::{FunctionDatabase, StagedFunctionDatabase};
pub use representation::Representation;
pub use tracer::TracerView;
pub use view::TransactionLedgerView;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::AssetFilter;
use crate::error::LedgerResult;

/// One asset version as a contract sees it, with `data` already translated
/// into the contract's declared representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub age: u64,
    pub data: Value,
}

/// The surface a contract reads and writes assets through.
///
/// `get` returns the latest state visible to the transaction (pending
/// writes included), `put` stages the next version of an id, and `scan`
/// reads one id's committed history.
pub trait LedgerView {
    fn get(&mut self, id: &str) -> LedgerResult<Option<Asset>>;

    fn put(&mut self, id: &str, data: Value) -> LedgerResult<()>;

    fn scan(&mut self, filter: &AssetFilter) -> LedgerResult<Vec<Asset>>;
}
