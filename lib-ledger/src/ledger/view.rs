//! Live ledger view over a transaction.

use serde_json::Value;

use crate::asset::AssetFilter;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Asset, LedgerView, Representation};
use crate::transaction::Transaction;

/// The view a contract executes against: reads and writes flow through the
/// enclosing [`Transaction`], translated into the contract's declared
/// representation at the boundary.
pub struct TransactionLedgerView<'a> {
    tx: &'a mut Transaction,
    representation: Representation,
}

impl<'a> TransactionLedgerView<'a> {
    pub fn new(tx: &'a mut Transaction, representation: Representation) -> Self {
        Self { tx, representation }
    }

    fn translate(&self, id: &str, age: u64, canonical_text: &str) -> LedgerResult<Asset> {
        let canonical: Value = serde_json::from_str(canonical_text)
            .map_err(|e| LedgerError::MalformedArgument(format!("stored data for {id}: {e}")))?;
        Ok(Asset {
            id: id.to_string(),
            age,
            data: self.representation.from_canonical(&canonical),
        })
    }
}

impl LedgerView for TransactionLedgerView<'_> {
    fn get(&mut self, id: &str) -> LedgerResult<Option<Asset>> {
        match self.tx.read(id)? {
            Some((age, data)) => Ok(Some(self.translate(id, age, &data)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, id: &str, data: Value) -> LedgerResult<()> {
        let canonical = self.representation.to_canonical(data)?;
        self.tx
            .write(id, crate::canonical::canonical_json(&canonical))
    }

    fn scan(&mut self, filter: &AssetFilter) -> LedgerResult<Vec<Asset>> {
        let versions = self.tx.scan(filter)?;
        versions
            .iter()
            .map(|v| self.translate(&v.id, v.age, &v.data))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ProofComposer;
    use crate::storage::MemoryStore;
    use crate::transaction::TransactionManager;
    use lib_crypto::KeyPair;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> TransactionManager {
        TransactionManager::new(
            Arc::new(MemoryStore::default()),
            Arc::new(ProofComposer::new(KeyPair::generate(), None)),
        )
    }

    #[test]
    fn put_then_get_in_key_value_representation() {
        let manager = manager();
        let mut tx = manager.start();
        let mut view = TransactionLedgerView::new(&mut tx, Representation::KeyValue);
        view.put("acct", json!({"balance": "100", "owner.name": "\"a\""}))
            .unwrap();
        let asset = view.get("acct").unwrap().unwrap();
        assert_eq!(asset.data["balance"], json!("100"));
        assert_eq!(asset.data["owner.name"], json!("\"a\""));
    }

    #[test]
    fn committed_data_is_canonical_regardless_of_representation() {
        let manager = manager();
        let mut tx = manager.start();
        {
            let mut view = TransactionLedgerView::new(&mut tx, Representation::Plain);
            view.put("a", json!(r#"{"x":1}"#)).unwrap();
        }
        tx.commit().unwrap();

        let mut tx = manager.start();
        let mut tree = TransactionLedgerView::new(&mut tx, Representation::Tree);
        let asset = tree.get("a").unwrap().unwrap();
        assert_eq!(asset.data, json!({"x": 1}));
    }
}
