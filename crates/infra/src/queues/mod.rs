//! Queue providers: pending work per inward source.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use stockroom_core::SkuId;
use stockroom_inventory::{PendingQueueItem, QueueSource, Sku};

use crate::catalog::SkuCatalog;
use crate::error::StoreError;

mod production;
mod repacking;
mod returns;
mod rto;

pub use production::ProductionQueue;
pub use repacking::RepackingQueue;
pub use returns::ReturnsQueue;
pub use rto::RtoQueue;

#[async_trait::async_trait]
pub trait QueueProvider: Send + Sync {
    fn source(&self) -> QueueSource;

    /// Pending items in this source's own order.
    async fn pending(&self, limit: Option<usize>) -> Result<Vec<PendingQueueItem>, StoreError>;

    async fn pending_for_sku(&self, sku_id: SkuId) -> Result<Vec<PendingQueueItem>, StoreError> {
        Ok(self
            .pending(None)
            .await?
            .into_iter()
            .filter(|item| item.sku_id == sku_id)
            .collect())
    }
}

/// The four providers, addressable by source.
#[derive(Clone)]
pub struct QueueProviders {
    pub production: Arc<dyn QueueProvider>,
    pub returns: Arc<dyn QueueProvider>,
    pub rto: Arc<dyn QueueProvider>,
    pub repacking: Arc<dyn QueueProvider>,
}

impl QueueProviders {
    pub fn get(&self, source: QueueSource) -> &Arc<dyn QueueProvider> {
        match source {
            QueueSource::Production => &self.production,
            QueueSource::Returns => &self.returns,
            QueueSource::Rto => &self.rto,
            QueueSource::Repacking => &self.repacking,
        }
    }
}

/// Fields every queue entry shares, before the SKU is attached.
struct Entry {
    source: QueueSource,
    id: String,
    sku_id: SkuId,
    qty: i64,
    context_label: &'static str,
    context_value: String,
    days_in_rto: Option<i64>,
    at_warehouse: bool,
    queued_at: DateTime<Utc>,
}

impl Entry {
    fn project(self, sku: &Sku) -> PendingQueueItem {
        PendingQueueItem {
            source: self.source,
            id: self.id,
            sku_id: self.sku_id,
            sku_code: sku.code.to_string(),
            product_name: sku.product_name.clone(),
            colour: sku.colour.clone(),
            size: sku.size.clone(),
            qty: self.qty,
            context_label: self.context_label.to_string(),
            context_value: self.context_value,
            days_in_rto: self.days_in_rto,
            at_warehouse: self.at_warehouse,
            queued_at: self.queued_at,
        }
    }
}

/// Attach SKU details, dropping entries whose SKU is unknown, then truncate.
fn project_all(
    catalog: &SkuCatalog,
    entries: Vec<Entry>,
    limit: Option<usize>,
) -> Result<Vec<PendingQueueItem>, StoreError> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match catalog.get(entry.sku_id)? {
            Some(sku) => out.push(entry.project(&sku)),
            None => tracing::warn!(
                source = entry.source.as_str(),
                id = %entry.id,
                sku_id = %entry.sku_id,
                "queue entry references unknown sku; skipped"
            ),
        }
        if limit.is_some_and(|l| out.len() >= l) {
            break;
        }
    }
    Ok(out)
}
