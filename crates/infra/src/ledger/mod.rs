//! Inventory ledger storage.
//!
//! The ledger is append-only. Balances are derived from it; nothing else in
//! the service holds stock quantities.

use std::collections::HashMap;

use stockroom_core::SkuId;
use stockroom_inventory::{InventoryTransaction, StockBalance};

use crate::error::StoreError;

mod in_memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use in_memory::InMemoryLedger;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLedger;

#[async_trait::async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Append entries all-or-nothing.
    async fn append_batch(&self, txns: Vec<InventoryTransaction>) -> Result<(), StoreError>;

    async fn append(&self, txn: InventoryTransaction) -> Result<(), StoreError> {
        self.append_batch(vec![txn]).await
    }

    async fn balance(&self, sku_id: SkuId) -> Result<StockBalance, StoreError>;

    /// Balances of every SKU that has ledger entries.
    async fn balances(&self) -> Result<HashMap<SkuId, StockBalance>, StoreError>;

    /// Newest first, optionally for one SKU.
    async fn history(
        &self,
        sku_id: Option<SkuId>,
        limit: usize,
    ) -> Result<Vec<InventoryTransaction>, StoreError>;

    /// Whether the SKU already has an entry carrying `reference`.
    async fn has_reference(&self, sku_id: SkuId, reference: &str) -> Result<bool, StoreError>;
}
