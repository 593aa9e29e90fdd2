use std::sync::Arc;

use stockroom_core::ReturnLineId;
use stockroom_inventory::{PendingQueueItem, QueueSource, ReturnLine};

use super::{Entry, QueueProvider, project_all};
use crate::catalog::SkuCatalog;
use crate::error::StoreError;
use crate::store::{InMemoryKeyedStore, KeyedStore};

/// Return lines awaiting receipt, oldest request first.
pub struct ReturnsQueue {
    catalog: Arc<SkuCatalog>,
    lines: Arc<InMemoryKeyedStore<ReturnLineId, ReturnLine>>,
}

impl ReturnsQueue {
    pub fn new(catalog: Arc<SkuCatalog>, lines: Arc<InMemoryKeyedStore<ReturnLineId, ReturnLine>>) -> Self {
        Self { catalog, lines }
    }
}

#[async_trait::async_trait]
impl QueueProvider for ReturnsQueue {
    fn source(&self) -> QueueSource {
        QueueSource::Returns
    }

    async fn pending(&self, limit: Option<usize>) -> Result<Vec<PendingQueueItem>, StoreError> {
        let mut awaiting: Vec<ReturnLine> = self
            .lines
            .list()?
            .into_iter()
            .filter(ReturnLine::is_awaiting_receipt)
            .collect();
        awaiting.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.ticket_number.cmp(&b.ticket_number))
        });

        let entries = awaiting
            .into_iter()
            .map(|l| Entry {
                source: QueueSource::Returns,
                id: l.id.to_string(),
                sku_id: l.sku_id,
                qty: l.qty,
                context_label: "Ticket",
                context_value: l.ticket_number,
                days_in_rto: None,
                at_warehouse: false,
                queued_at: l.requested_at,
            })
            .collect();

        project_all(&self.catalog, entries, limit)
    }
}
