use std::sync::Arc;

use chrono::Utc;
use stockroom_core::OrderId;
use stockroom_inventory::{PendingQueueItem, QueueSource, RtoOrder};

use super::{Entry, QueueProvider, project_all};
use crate::catalog::SkuCatalog;
use crate::error::StoreError;
use crate::store::{InMemoryKeyedStore, KeyedStore};

/// Unprocessed lines of RTO orders, longest in RTO first.
pub struct RtoQueue {
    catalog: Arc<SkuCatalog>,
    orders: Arc<InMemoryKeyedStore<OrderId, RtoOrder>>,
}

impl RtoQueue {
    pub fn new(catalog: Arc<SkuCatalog>, orders: Arc<InMemoryKeyedStore<OrderId, RtoOrder>>) -> Self {
        Self { catalog, orders }
    }
}

#[async_trait::async_trait]
impl QueueProvider for RtoQueue {
    fn source(&self) -> QueueSource {
        QueueSource::Rto
    }

    async fn pending(&self, limit: Option<usize>) -> Result<Vec<PendingQueueItem>, StoreError> {
        let now = Utc::now();
        let mut orders: Vec<RtoOrder> = self.orders.list()?.into_iter().filter(RtoOrder::is_pending).collect();
        orders.sort_by(|a, b| {
            a.rto_initiated_at
                .cmp(&b.rto_initiated_at)
                .then_with(|| a.order_number.cmp(&b.order_number))
        });

        let entries = orders
            .iter()
            .flat_map(|order| {
                let days = order.days_in_rto(now);
                order.lines.iter().filter(|l| !l.is_processed()).map(move |line| Entry {
                    source: QueueSource::Rto,
                    id: line.id.to_string(),
                    sku_id: line.sku_id,
                    qty: line.qty,
                    context_label: "Order",
                    context_value: order.order_number.clone(),
                    days_in_rto: Some(days),
                    at_warehouse: order.at_warehouse(),
                    queued_at: order.rto_initiated_at,
                })
            })
            .collect();

        project_all(&self.catalog, entries, limit)
    }
}
