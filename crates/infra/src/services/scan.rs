//! Scan resolution: which pending queue does a scanned unit belong to?

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use stockroom_inventory::{
    InwardSource, PendingQueueItem, QueueSource, Sku, rank_matches, recommend_source,
};

use crate::catalog::SkuCatalog;
use crate::error::ServiceResult;
use crate::ledger::InventoryLedger;
use crate::queues::QueueProviders;

#[derive(Debug, Clone, Serialize)]
pub struct ScanLookup {
    pub sku: Sku,
    /// Ordered by source priority, then by each queue's own order.
    pub matches: Vec<PendingQueueItem>,
    pub recommended_source: InwardSource,
    pub current_balance: i64,
    pub available_balance: i64,
}

pub struct ScanResolver {
    catalog: Arc<SkuCatalog>,
    ledger: Arc<dyn InventoryLedger>,
    queues: QueueProviders,
}

impl ScanResolver {
    pub fn new(catalog: Arc<SkuCatalog>, ledger: Arc<dyn InventoryLedger>, queues: QueueProviders) -> Self {
        Self {
            catalog,
            ledger,
            queues,
        }
    }

    /// Read-only: nothing is mutated until the operator submits an inward.
    #[instrument(skip(self))]
    pub async fn resolve(&self, code: &str) -> ServiceResult<ScanLookup> {
        let sku = self.catalog.resolve_scan(code)?;

        let (repacking, returns, rto, production) = tokio::join!(
            self.queues.repacking.pending_for_sku(sku.id),
            self.queues.returns.pending_for_sku(sku.id),
            self.queues.rto.pending_for_sku(sku.id),
            self.queues.production.pending_for_sku(sku.id),
        );

        let mut matches = Vec::new();
        for found in [repacking, returns, rto, production] {
            matches.extend(found?);
        }
        rank_matches(&mut matches);
        let recommended_source = recommend_source(&matches);

        let balance = self.ledger.balance(sku.id).await?;

        debug!(
            sku = %sku.code,
            matches = matches.len(),
            recommended = ?recommended_source,
            "scan resolved"
        );

        Ok(ScanLookup {
            sku,
            matches,
            recommended_source,
            current_balance: balance.current(),
            available_balance: balance.available(),
        })
    }

    pub async fn pending(&self, source: QueueSource, limit: Option<usize>) -> ServiceResult<Vec<PendingQueueItem>> {
        Ok(self.queues.get(source).pending(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use stockroom_core::DomainError;

    use super::*;
    use crate::error::ServiceError;
    use crate::seed::{SeedBatch, SeedData, SeedRepacking, SeedReturn, SeedRtoLine, SeedRtoOrder, SeedSku, SeedStock};
    use crate::services::{InventoryServices, ServiceSettings, Stores};

    fn sku(code: &str, barcode: Option<&str>) -> SeedSku {
        SeedSku {
            code: code.into(),
            barcode: barcode.map(str::to_string),
            product_name: "Anarkali".into(),
            colour: "Rust".into(),
            size: code.rsplit('-').next().unwrap_or("M").into(),
            is_active: true,
        }
    }

    fn ret(ticket: &str, code: &str, days_ago: i64) -> SeedReturn {
        SeedReturn {
            ticket_number: ticket.into(),
            sku_code: code.into(),
            qty: 1,
            customer_name: "Meera".into(),
            return_reason: None,
            requested_at: Utc::now() - Duration::days(days_ago),
        }
    }

    async fn services(seed: SeedData) -> InventoryServices {
        let stores = Stores::in_memory();
        stores.load_seed(&seed).await.unwrap();
        InventoryServices::new(stores, ServiceSettings::default())
    }

    #[tokio::test]
    async fn repacking_outranks_pending_return() {
        let svc = services(SeedData {
            skus: vec![sku("ANK-RST-M", None)],
            returns: vec![ret("RET-1", "ANK-RST-M", 1)],
            repacking: vec![SeedRepacking {
                sku_code: "ANK-RST-M".into(),
                qty: 1,
                origin: stockroom_inventory::RepackingOrigin::Manual,
                origin_reference: None,
                condition: None,
                notes: None,
                queued_at: None,
            }],
            ..SeedData::default()
        })
        .await;

        let lookup = svc.scan.resolve("ank-rst-m").await.unwrap();
        assert_eq!(lookup.recommended_source, InwardSource::Repacking);
        let sources: Vec<_> = lookup.matches.iter().map(|m| m.source).collect();
        assert_eq!(sources, vec![QueueSource::Repacking, QueueSource::Returns]);
    }

    #[tokio::test]
    async fn matches_follow_priority_then_queue_order() {
        let svc = services(SeedData {
            skus: vec![sku("ANK-RST-S", Some("890777"))],
            opening_stock: vec![SeedStock { sku_code: "ANK-RST-S".into(), qty: 4 }],
            batches: vec![SeedBatch {
                batch_code: "B-7".into(),
                sku_code: "ANK-RST-S".into(),
                batch_date: Utc::now().date_naive(),
                qty_planned: 10,
                qty_completed: 0,
            }],
            returns: vec![ret("RET-NEW", "ANK-RST-S", 1), ret("RET-OLD", "ANK-RST-S", 5)],
            rto_orders: vec![SeedRtoOrder {
                order_number: "ORD-1".into(),
                customer_name: "Kabir".into(),
                rto_initiated_at: Utc::now() - Duration::days(3),
                delivered: false,
                lines: vec![SeedRtoLine { sku_code: "ANK-RST-S".into(), qty: 1 }],
            }],
            ..SeedData::default()
        })
        .await;

        let lookup = svc.scan.resolve("890777").await.unwrap();
        assert_eq!(lookup.recommended_source, InwardSource::Return);
        let contexts: Vec<_> = lookup.matches.iter().map(|m| m.context_value.as_str()).collect();
        assert_eq!(contexts, vec!["RET-OLD", "RET-NEW", "ORD-1", "B-7"]);
        assert_eq!(lookup.matches[2].days_in_rto, Some(3));
        assert_eq!(lookup.current_balance, 4);
        assert_eq!(lookup.available_balance, 4);
    }

    #[tokio::test]
    async fn no_matches_falls_back_to_adjustment() {
        let svc = services(SeedData {
            skus: vec![sku("ANK-RST-L", None)],
            ..SeedData::default()
        })
        .await;

        let lookup = svc.scan.resolve("ANK-RST-L").await.unwrap();
        assert!(lookup.matches.is_empty());
        assert_eq!(lookup.recommended_source, InwardSource::Adjustment);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let svc = services(SeedData::default()).await;
        assert!(matches!(
            svc.scan.resolve("NOPE").await,
            Err(ServiceError::Domain(DomainError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn pending_queue_respects_limit() {
        let svc = services(SeedData {
            skus: vec![sku("ANK-RST-M", None)],
            returns: vec![ret("RET-1", "ANK-RST-M", 3), ret("RET-2", "ANK-RST-M", 2), ret("RET-3", "ANK-RST-M", 1)],
            ..SeedData::default()
        })
        .await;

        let items = svc.scan.pending(QueueSource::Returns, Some(2)).await.unwrap();
        let tickets: Vec<_> = items.iter().map(|i| i.context_value.as_str()).collect();
        assert_eq!(tickets, vec!["RET-1", "RET-2"]);
    }
}
