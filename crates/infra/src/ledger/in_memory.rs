use std::collections::HashMap;
use std::sync::RwLock;

use stockroom_core::SkuId;
use stockroom_inventory::{InventoryTransaction, StockBalance};

use super::InventoryLedger;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<InventoryTransaction>,
    balances: HashMap<SkuId, StockBalance>,
}

/// In-memory append-only ledger with running balances.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn append_batch(&self, txns: Vec<InventoryTransaction>) -> Result<(), StoreError> {
        if txns.is_empty() {
            return Ok(());
        }
        if let Some(bad) = txns.iter().find(|t| t.qty <= 0) {
            return Err(StoreError::Corrupt(format!(
                "transaction {} has non-positive quantity",
                bad.id
            )));
        }

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned("ledger"))?;
        let mut staged: HashMap<SkuId, StockBalance> = HashMap::new();
        for txn in &txns {
            staged
                .entry(txn.sku_id)
                .or_insert_with(|| state.balances.get(&txn.sku_id).copied().unwrap_or_default())
                .apply(txn)?;
        }
        state.balances.extend(staged);
        state.entries.extend(txns);
        Ok(())
    }

    async fn balance(&self, sku_id: SkuId) -> Result<StockBalance, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned("ledger"))?;
        Ok(state.balances.get(&sku_id).copied().unwrap_or_default())
    }

    async fn balances(&self) -> Result<HashMap<SkuId, StockBalance>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned("ledger"))?;
        Ok(state.balances.clone())
    }

    async fn history(
        &self,
        sku_id: Option<SkuId>,
        limit: usize,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned("ledger"))?;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|t| sku_id.is_none_or(|id| t.sku_id == id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn has_reference(&self, sku_id: SkuId, reference: &str) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned("ledger"))?;
        Ok(state
            .entries
            .iter()
            .any(|t| t.sku_id == sku_id && t.reference_id.as_deref() == Some(reference)))
    }
}
