use std::sync::Arc;

use stockroom_core::RepackingItemId;
use stockroom_inventory::{PendingQueueItem, QueueSource, RepackingItem, RepackingOrigin};

use super::{Entry, QueueProvider, project_all};
use crate::catalog::SkuCatalog;
use crate::error::StoreError;
use crate::store::{InMemoryKeyedStore, KeyedStore};

/// Items waiting for a QC decision, oldest first.
pub struct RepackingQueue {
    catalog: Arc<SkuCatalog>,
    items: Arc<InMemoryKeyedStore<RepackingItemId, RepackingItem>>,
}

impl RepackingQueue {
    pub fn new(catalog: Arc<SkuCatalog>, items: Arc<InMemoryKeyedStore<RepackingItemId, RepackingItem>>) -> Self {
        Self { catalog, items }
    }
}

fn origin_label(origin: RepackingOrigin) -> &'static str {
    match origin {
        RepackingOrigin::Return => "Return",
        RepackingOrigin::Rto => "RTO",
        RepackingOrigin::Manual => "Manual",
    }
}

#[async_trait::async_trait]
impl QueueProvider for RepackingQueue {
    fn source(&self) -> QueueSource {
        QueueSource::Repacking
    }

    async fn pending(&self, limit: Option<usize>) -> Result<Vec<PendingQueueItem>, StoreError> {
        let mut pending: Vec<RepackingItem> = self.items.list()?.into_iter().filter(RepackingItem::is_pending).collect();
        pending.sort_by_key(|i| i.queued_at);

        let entries = pending
            .into_iter()
            .map(|i| Entry {
                source: QueueSource::Repacking,
                id: i.id.to_string(),
                sku_id: i.sku_id,
                qty: i.qty,
                context_label: origin_label(i.origin),
                context_value: i.origin_reference.unwrap_or_default(),
                days_in_rto: None,
                at_warehouse: true,
                queued_at: i.queued_at,
            })
            .collect();

        project_all(&self.catalog, entries, limit)
    }
}
