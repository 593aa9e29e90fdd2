//! JSON fixtures for dev and demo deployments.
//!
//! Records reference SKUs by code so fixture files stay hand-editable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockroom_core::{
    BatchId, DomainError, OrderId, OrderLineId, RepackingItemId, ReturnLineId, SkuId,
};
use stockroom_inventory::{
    BatchStatus, InventoryTransaction, ProductionBatch, RepackingItem, RepackingOrigin,
    RepackingStatus, ReturnCondition, ReturnLine, ReturnStatus, RtoLine, RtoOrder, RtoStatus, Sku,
    SkuCode, TxnReason,
};

use crate::error::{ServiceError, ServiceResult};
use crate::services::Stores;
use crate::store::KeyedStore;

/// Ledger reference of opening-stock entries.
pub const OPENING_STOCK: &str = "opening_stock";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub skus: Vec<SeedSku>,
    pub opening_stock: Vec<SeedStock>,
    pub batches: Vec<SeedBatch>,
    pub returns: Vec<SeedReturn>,
    pub rto_orders: Vec<SeedRtoOrder>,
    pub repacking: Vec<SeedRepacking>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSku {
    pub code: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub product_name: String,
    pub colour: String,
    pub size: String,
    #[serde(default = "yes")]
    pub is_active: bool,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStock {
    pub sku_code: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBatch {
    pub batch_code: String,
    pub sku_code: String,
    pub batch_date: NaiveDate,
    pub qty_planned: i64,
    #[serde(default)]
    pub qty_completed: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedReturn {
    pub ticket_number: String,
    pub sku_code: String,
    pub qty: i64,
    pub customer_name: String,
    #[serde(default)]
    pub return_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRtoOrder {
    pub order_number: String,
    pub customer_name: String,
    pub rto_initiated_at: DateTime<Utc>,
    /// Courier has handed the parcel back to the warehouse.
    #[serde(default)]
    pub delivered: bool,
    pub lines: Vec<SeedRtoLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRtoLine {
    pub sku_code: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRepacking {
    pub sku_code: String,
    pub qty: i64,
    #[serde(default = "manual")]
    pub origin: RepackingOrigin,
    #[serde(default)]
    pub origin_reference: Option<String>,
    #[serde(default)]
    pub condition: Option<ReturnCondition>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
}

fn manual() -> RepackingOrigin {
    RepackingOrigin::Manual
}

/// Counts of loaded records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub skus: usize,
    pub opening_stock: usize,
    pub batches: usize,
    pub returns: usize,
    pub rto_lines: usize,
    pub repacking: usize,
}

impl Stores {
    /// Load fixtures. SKUs go first; every other record must name a known SKU.
    pub async fn load_seed(&self, seed: &SeedData) -> ServiceResult<SeedSummary> {
        let now = Utc::now();
        let mut summary = SeedSummary::default();

        for s in &seed.skus {
            let code = SkuCode::parse(&s.code)?;
            self.catalog.insert(Sku {
                id: SkuId::from_code_key(code.key()),
                code,
                barcode: s.barcode.clone(),
                product_name: s.product_name.clone(),
                colour: s.colour.clone(),
                size: s.size.clone(),
                is_active: s.is_active,
            })?;
            summary.skus += 1;
        }

        // A durable ledger already holds the opening stock of earlier boots.
        let mut opening = Vec::with_capacity(seed.opening_stock.len());
        for s in &seed.opening_stock {
            let sku_id = self.seed_sku(&s.sku_code)?;
            if self.ledger.has_reference(sku_id, OPENING_STOCK).await? {
                continue;
            }
            opening.push(
                InventoryTransaction::inward(sku_id, s.qty, TxnReason::Adjustment, now)?
                    .with_reference(OPENING_STOCK),
            );
        }
        summary.opening_stock = opening.len();
        self.ledger.append_batch(opening).await?;

        for b in &seed.batches {
            if b.qty_planned <= 0 || b.qty_completed < 0 || b.qty_completed > b.qty_planned {
                return Err(DomainError::validation(format!(
                    "batch {} has inconsistent quantities",
                    b.batch_code
                ))
                .into());
            }
            let status = match b.qty_completed {
                0 => BatchStatus::Planned,
                done if done == b.qty_planned => BatchStatus::Completed,
                _ => BatchStatus::InProgress,
            };
            let batch = ProductionBatch {
                id: BatchId::new(),
                batch_code: b.batch_code.clone(),
                sku_id: self.seed_sku(&b.sku_code)?,
                batch_date: b.batch_date,
                qty_planned: b.qty_planned,
                qty_completed: b.qty_completed,
                status,
                completed_at: None,
            };
            self.batches.upsert(batch.id, batch)?;
            summary.batches += 1;
        }

        for r in &seed.returns {
            let line = ReturnLine {
                id: ReturnLineId::new(),
                ticket_number: r.ticket_number.clone(),
                sku_id: self.seed_sku(&r.sku_code)?,
                qty: r.qty,
                customer_name: r.customer_name.clone(),
                return_reason: r.return_reason.clone(),
                requested_at: r.requested_at,
                status: ReturnStatus::AwaitingReceipt,
                condition: None,
                received_at: None,
            };
            self.returns.upsert(line.id, line)?;
            summary.returns += 1;
        }

        for o in &seed.rto_orders {
            let mut lines = Vec::with_capacity(o.lines.len());
            for l in &o.lines {
                lines.push(RtoLine {
                    id: OrderLineId::new(),
                    sku_id: self.seed_sku(&l.sku_code)?,
                    qty: l.qty,
                    condition: None,
                    processed_at: None,
                });
            }
            summary.rto_lines += lines.len();
            let order = RtoOrder {
                id: OrderId::new(),
                order_number: o.order_number.clone(),
                customer_name: o.customer_name.clone(),
                rto_initiated_at: o.rto_initiated_at,
                status: if o.delivered {
                    RtoStatus::RtoDelivered
                } else {
                    RtoStatus::RtoInTransit
                },
                lines,
            };
            self.rto_orders.upsert(order.id, order)?;
        }

        for r in &seed.repacking {
            let item = RepackingItem {
                id: RepackingItemId::new(),
                sku_id: self.seed_sku(&r.sku_code)?,
                qty: r.qty,
                origin: r.origin,
                origin_reference: r.origin_reference.clone(),
                condition: r.condition,
                suggested_decision: r.condition.map(ReturnCondition::suggested_decision),
                status: RepackingStatus::Pending,
                notes: r.notes.clone(),
                queued_at: r.queued_at.unwrap_or(now),
                processed_at: None,
            };
            self.repacking.upsert(item.id, item)?;
            summary.repacking += 1;
        }

        info!(?summary, "seed data loaded");
        Ok(summary)
    }

    fn seed_sku(&self, code: &str) -> ServiceResult<SkuId> {
        self.catalog
            .by_code(code)?
            .map(|s| s.id)
            .ok_or_else(|| ServiceError::not_found(format!("seed references unknown sku {code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::QueueProvider;
    use stockroom_inventory::QueueSource;

    const FIXTURE: &str = r#"{
        "skus": [
            {"code": "LIN-NVY-M", "barcode": "8901000000011", "product_name": "Linen Shirt", "colour": "Navy", "size": "M"},
            {"code": "LIN-NVY-L", "product_name": "Linen Shirt", "colour": "Navy", "size": "L", "is_active": false}
        ],
        "opening_stock": [{"sku_code": "lin-nvy-m", "qty": 12}],
        "batches": [{"batch_code": "B-001", "sku_code": "LIN-NVY-M", "batch_date": "2026-09-01", "qty_planned": 50, "qty_completed": 20}],
        "returns": [{"ticket_number": "RET-1", "sku_code": "LIN-NVY-M", "qty": 1, "customer_name": "Asha", "requested_at": "2026-10-01T10:00:00Z"}],
        "rto_orders": [{"order_number": "ORD-9", "customer_name": "Ravi", "rto_initiated_at": "2026-10-02T10:00:00Z", "delivered": true,
                        "lines": [{"sku_code": "LIN-NVY-M", "qty": 2}, {"sku_code": "LIN-NVY-L", "qty": 1}]}],
        "repacking": [{"sku_code": "LIN-NVY-M", "qty": 1, "condition": "used"}]
    }"#;

    #[tokio::test]
    async fn fixture_loads_into_every_store() {
        let seed: SeedData = serde_json::from_str(FIXTURE).unwrap();
        let stores = Stores::in_memory();
        let summary = stores.load_seed(&seed).await.unwrap();

        assert_eq!(
            summary,
            SeedSummary { skus: 2, opening_stock: 1, batches: 1, returns: 1, rto_lines: 2, repacking: 1 }
        );

        let sku = stores.catalog.by_code("LIN-NVY-M").unwrap().unwrap();
        assert_eq!(stores.ledger.balance(sku.id).await.unwrap().current(), 12);

        let providers = stores.queue_providers();
        let batches = providers.get(QueueSource::Production).pending(None).await.unwrap();
        assert_eq!(batches[0].qty, 30);
        let rto = providers.get(QueueSource::Rto).pending(None).await.unwrap();
        assert_eq!(rto.len(), 2);
        assert!(rto.iter().all(|i| i.at_warehouse));
    }

    #[tokio::test]
    async fn reboot_over_the_same_ledger_keeps_ids_and_opening_stock() {
        let seed: SeedData = serde_json::from_str(FIXTURE).unwrap();
        let first = Stores::in_memory();
        first.load_seed(&seed).await.unwrap();
        let before = first.catalog.by_code("LIN-NVY-M").unwrap().unwrap();
        first
            .ledger
            .append(InventoryTransaction::inward(before.id, 3, TxnReason::Production, Utc::now()).unwrap())
            .await
            .unwrap();

        let second = Stores::with_ledger(first.ledger.clone());
        let summary = second.load_seed(&seed).await.unwrap();
        let after = second.catalog.by_code("LIN-NVY-M").unwrap().unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(summary.opening_stock, 0);
        assert_eq!(second.ledger.balance(after.id).await.unwrap().current(), 15);
    }

    #[tokio::test]
    async fn unknown_sku_reference_is_not_found() {
        let seed = SeedData {
            opening_stock: vec![SeedStock { sku_code: "GHOST".into(), qty: 1 }],
            ..SeedData::default()
        };
        let err = Stores::in_memory().load_seed(&seed).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }
}
