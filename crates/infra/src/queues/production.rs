use std::sync::Arc;

use chrono::{NaiveTime, TimeZone, Utc};
use stockroom_core::BatchId;
use stockroom_inventory::{PendingQueueItem, ProductionBatch, QueueSource};

use super::{Entry, QueueProvider, project_all};
use crate::catalog::SkuCatalog;
use crate::error::StoreError;
use crate::store::{InMemoryKeyedStore, KeyedStore};

/// Open production batches, oldest batch date first.
pub struct ProductionQueue {
    catalog: Arc<SkuCatalog>,
    batches: Arc<InMemoryKeyedStore<BatchId, ProductionBatch>>,
}

impl ProductionQueue {
    pub fn new(catalog: Arc<SkuCatalog>, batches: Arc<InMemoryKeyedStore<BatchId, ProductionBatch>>) -> Self {
        Self { catalog, batches }
    }
}

#[async_trait::async_trait]
impl QueueProvider for ProductionQueue {
    fn source(&self) -> QueueSource {
        QueueSource::Production
    }

    async fn pending(&self, limit: Option<usize>) -> Result<Vec<PendingQueueItem>, StoreError> {
        let mut open: Vec<ProductionBatch> = self.batches.list()?.into_iter().filter(|b| b.is_open()).collect();
        open.sort_by(|a, b| {
            a.batch_date
                .cmp(&b.batch_date)
                .then_with(|| a.batch_code.cmp(&b.batch_code))
        });

        let entries = open
            .into_iter()
            .map(|b| Entry {
                source: QueueSource::Production,
                id: b.id.to_string(),
                sku_id: b.sku_id,
                qty: b.qty_pending(),
                context_label: "Batch",
                context_value: b.batch_code,
                days_in_rto: None,
                at_warehouse: false,
                queued_at: Utc.from_utc_datetime(&b.batch_date.and_time(NaiveTime::MIN)),
            })
            .collect();

        project_all(&self.catalog, entries, limit)
    }
}
