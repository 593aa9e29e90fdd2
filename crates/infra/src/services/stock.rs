//! Balance and ledger history queries.

use std::sync::Arc;

use serde::Serialize;

use stockroom_inventory::{InventoryTransaction, Sku, StockBalance};

use crate::catalog::SkuCatalog;
use crate::error::ServiceResult;
use crate::ledger::InventoryLedger;

#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub sku: Sku,
    #[serde(flatten)]
    pub balance: StockBalance,
    pub current: i64,
    pub available: i64,
}

pub struct StockQuery {
    catalog: Arc<SkuCatalog>,
    ledger: Arc<dyn InventoryLedger>,
}

impl StockQuery {
    pub fn new(catalog: Arc<SkuCatalog>, ledger: Arc<dyn InventoryLedger>) -> Self {
        Self { catalog, ledger }
    }

    /// `code` may be a SKU code or a barcode.
    pub async fn balance(&self, code: &str) -> ServiceResult<BalanceView> {
        let sku = self.catalog.resolve_scan(code)?;
        let balance = self.ledger.balance(sku.id).await?;
        Ok(BalanceView {
            current: balance.current(),
            available: balance.available(),
            sku,
            balance,
        })
    }

    /// Newest first, optionally restricted to one SKU.
    pub async fn transactions(&self, code: Option<&str>, limit: usize) -> ServiceResult<Vec<InventoryTransaction>> {
        let sku_id = match code {
            Some(code) => Some(self.catalog.resolve_scan(code)?.id),
            None => None,
        };
        Ok(self.ledger.history(sku_id, limit).await?)
    }
}
