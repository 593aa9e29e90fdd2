//! Source-specific inward mutations.
//!
//! Each call writes at most one ledger entry. When an operational record is
//! updated before the ledger append, a failed append restores the record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockroom_core::{
    BatchId, DomainError, OrderId, OrderLineId, RepackingItemId, ReturnLineId, SkuId, WriteOffId,
};
use stockroom_inventory::{
    BatchStatus, InventoryTransaction, ProductionBatch, RepackingDecision, RepackingItem,
    RepackingOutcome, ReturnCondition, ReturnLine, RtoCondition, RtoDisposition, RtoOrder,
    RtoProgress, TxnReason, WriteOff, WriteOffReason, oldest_open_batch,
};

use super::Stores;
use crate::error::{ServiceError, ServiceResult};
use crate::notify::ChangeNotifier;
use crate::store::KeyedStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCredit {
    pub batch_id: BatchId,
    pub batch_code: String,
    pub credited: i64,
    pub qty_pending: i64,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionInward {
    pub transaction: InventoryTransaction,
    /// `None` when the SKU had no open batch.
    pub batch: Option<BatchCredit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub line: ReturnLine,
    pub repacking_item: RepackingItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct RtoReceipt {
    pub progress: RtoProgress,
    pub transaction: Option<InventoryTransaction>,
    pub write_off: Option<WriteOff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepackingResult {
    pub item: RepackingItem,
    pub transaction: Option<InventoryTransaction>,
    pub write_off: Option<WriteOff>,
}

pub struct InwardService {
    stores: Stores,
    notifier: ChangeNotifier,
}

impl InwardService {
    pub fn new(stores: Stores, notifier: ChangeNotifier) -> Self {
        Self { stores, notifier }
    }

    /// Inward finished goods and credit the oldest open batch of the SKU.
    ///
    /// The full quantity goes to stock; the batch is credited up to its
    /// pending quantity.
    #[instrument(skip(self, notes))]
    pub async fn production_inward(
        &self,
        sku_code: &str,
        qty: i64,
        notes: Option<String>,
        actor: Option<String>,
    ) -> ServiceResult<ProductionInward> {
        if qty <= 0 {
            return Err(DomainError::validation("quantity must be positive").into());
        }
        let sku = self.stores.catalog.resolve_scan(sku_code)?;
        let now = Utc::now();

        let batches = self.stores.batches.list()?;
        let target = oldest_open_batch(sku.id, &batches).map(|b| (b.id, b.batch_code.clone()));

        let mut txn = InventoryTransaction::inward(sku.id, qty, TxnReason::Production, now)?
            .with_notes(notes)
            .created_by(actor);
        if let Some((_, code)) = &target {
            txn = txn.with_reference(code.clone());
        }
        self.stores.ledger.append(txn.clone()).await?;

        let batch = match target {
            Some((batch_id, _)) => self.credit_batch(batch_id, qty, now)?,
            None => None,
        };

        info!(
            sku = %sku.code,
            qty,
            batch = batch.as_ref().map(|b| b.batch_code.as_str()),
            "production inward recorded"
        );
        self.notifier.publish(
            "inventory.inward",
            vec![sku.code.to_string()],
            batch.as_ref().map(|b| b.batch_code.clone()),
        );

        Ok(ProductionInward {
            transaction: txn,
            batch,
        })
    }

    fn credit_batch(
        &self,
        batch_id: BatchId,
        qty: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<BatchCredit>> {
        let credited = self.stores.batches.modify(&batch_id, |b: &mut ProductionBatch| {
            b.record_inward(qty, now).map(|credited| BatchCredit {
                batch_id: b.id,
                batch_code: b.batch_code.clone(),
                credited,
                qty_pending: b.qty_pending(),
                status: b.status,
            })
        })?;

        match credited {
            Some(Ok(credit)) => Ok(Some(credit)),
            // Closed or removed between lookup and credit; the stock is already in.
            Some(Err(e)) => {
                warn!(%batch_id, error = %e, "batch credit skipped");
                Ok(None)
            }
            None => {
                warn!(%batch_id, "batch vanished before credit");
                Ok(None)
            }
        }
    }

    /// Receive a customer return into the repacking queue. No stock movement.
    #[instrument(skip(self, notes))]
    pub async fn receive_return(
        &self,
        line_id: ReturnLineId,
        condition: Option<ReturnCondition>,
        notes: Option<String>,
    ) -> ServiceResult<ReturnReceipt> {
        let condition = condition.ok_or_else(|| DomainError::selection_required("return condition is required"))?;
        let now = Utc::now();

        let line = self
            .stores
            .returns
            .modify(&line_id, |l: &mut ReturnLine| l.receive(condition, now).map(|_| l.clone()))?
            .ok_or_else(|| ServiceError::not_found(format!("return line {line_id}")))??;

        let item = RepackingItem::from_return(line.sku_id, line.qty, &line.ticket_number, condition, notes, now);
        self.stores.repacking.upsert(item.id, item.clone())?;

        let sku_code = self.sku_code(&line.sku_id)?;
        info!(
            ticket = %line.ticket_number,
            sku = %sku_code,
            condition = condition.as_str(),
            "return received into repacking"
        );
        self.notifier
            .publish("returns.received", vec![sku_code], Some(line.ticket_number.clone()));

        Ok(ReturnReceipt {
            line,
            repacking_item: item,
        })
    }

    /// Receive one RTO line. Unopened/good units are inwarded, the rest written off.
    #[instrument(skip(self, notes))]
    pub async fn receive_rto_line(
        &self,
        line_id: OrderLineId,
        condition: Option<RtoCondition>,
        notes: Option<String>,
        actor: Option<String>,
    ) -> ServiceResult<RtoReceipt> {
        let condition = condition.ok_or_else(|| DomainError::selection_required("rto condition is required"))?;
        let now = Utc::now();

        let before = self
            .stores
            .rto_orders
            .list()?
            .into_iter()
            .find(|o| o.line(line_id).is_some())
            .ok_or_else(|| ServiceError::not_found(format!("rto line {line_id}")))?;

        let (line, order) = self
            .stores
            .rto_orders
            .modify(&before.id, |o: &mut RtoOrder| {
                o.receive_line(line_id, condition, now).map(|l| (l, o.clone()))
            })?
            .ok_or_else(|| ServiceError::not_found(format!("rto order {}", before.id)))??;

        let mut transaction = None;
        let mut write_off = None;
        match condition.disposition() {
            RtoDisposition::Restock => {
                let txn = InventoryTransaction::inward(line.sku_id, line.qty, TxnReason::RtoReceived, now)?
                    .with_reference(order.order_number.clone())
                    .with_notes(notes)
                    .created_by(actor);
                if let Err(e) = self.stores.ledger.append(txn.clone()).await {
                    self.stores.rto_orders.upsert(before.id, before)?;
                    return Err(e.into());
                }
                transaction = Some(txn);
            }
            RtoDisposition::WriteOff(reason) => {
                let record = write_off_record(line.sku_id, line.qty, reason, &order.order_number, notes, actor, now);
                self.stores.write_offs.upsert(record.id, record.clone())?;
                write_off = Some(record);
            }
        }

        let sku_code = self.sku_code(&line.sku_id)?;
        let progress = order.progress();
        info!(
            order = %order.order_number,
            sku = %sku_code,
            condition = ?condition,
            processed = progress.processed_lines,
            total = progress.total_lines,
            "rto line received"
        );
        self.notifier
            .publish("rto.line_received", vec![sku_code], Some(order.order_number.clone()));

        Ok(RtoReceipt {
            progress,
            transaction,
            write_off,
        })
    }

    pub fn rto_order(&self, order_id: OrderId) -> ServiceResult<RtoOrder> {
        self.stores
            .rto_orders
            .get(&order_id)?
            .ok_or_else(|| ServiceError::not_found(format!("rto order {order_id}")))
    }

    /// Apply a QC decision to a repacking item.
    #[instrument(skip(self, notes))]
    pub async fn process_repacking(
        &self,
        item_id: RepackingItemId,
        decision: Option<RepackingDecision>,
        write_off_reason: Option<WriteOffReason>,
        notes: Option<String>,
        actor: Option<String>,
    ) -> ServiceResult<RepackingResult> {
        let decision = decision.ok_or_else(|| DomainError::selection_required("decision is required"))?;
        let now = Utc::now();

        let before = self
            .stores
            .repacking
            .get(&item_id)?
            .ok_or_else(|| ServiceError::not_found(format!("repacking item {item_id}")))?;

        let (outcome, item) = self
            .stores
            .repacking
            .modify(&item_id, |i: &mut RepackingItem| {
                i.process(decision, write_off_reason, notes.clone(), actor.clone(), now)
                    .map(|o| (o, i.clone()))
            })?
            .ok_or_else(|| ServiceError::not_found(format!("repacking item {item_id}")))??;

        let reference = item.origin_reference.clone().unwrap_or_else(|| item.id.to_string());
        let mut result = RepackingResult {
            item,
            transaction: None,
            write_off: None,
        };

        match outcome {
            RepackingOutcome::Restock { qty } => {
                let txn = InventoryTransaction::inward(result.item.sku_id, qty, TxnReason::RepackComplete, now)?
                    .with_reference(reference)
                    .with_notes(notes)
                    .created_by(actor);
                if let Err(e) = self.stores.ledger.append(txn.clone()).await {
                    self.stores.repacking.upsert(item_id, before)?;
                    return Err(e.into());
                }
                result.transaction = Some(txn);
            }
            RepackingOutcome::WrittenOff(record) => {
                self.stores.write_offs.upsert(record.id, record.clone())?;
                result.write_off = Some(record);
            }
        }

        let sku_code = self.sku_code(&result.item.sku_id)?;
        info!(item = %item_id, sku = %sku_code, decision = ?decision, "repacking item processed");
        self.notifier
            .publish("repacking.processed", vec![sku_code], Some(item_id.to_string()));

        Ok(result)
    }

    /// Manual correction when nothing in the queues matches.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        sku_code: &str,
        delta: i64,
        reason: &str,
        actor: Option<String>,
    ) -> ServiceResult<InventoryTransaction> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::selection_required("adjustment reason is required").into());
        }
        let sku = self.stores.catalog.resolve_scan(sku_code)?;

        if delta < 0 {
            let current = self.stores.ledger.balance(sku.id).await?.current();
            if current + delta < 0 {
                return Err(DomainError::invariant(format!(
                    "adjustment of {delta} would take {} below zero (current {current})",
                    sku.code
                ))
                .into());
            }
        }

        let txn = InventoryTransaction::correction(sku.id, delta, TxnReason::Adjustment, Utc::now())?
            .with_notes(Some(reason.to_string()))
            .created_by(actor);
        self.stores.ledger.append(txn.clone()).await?;

        info!(sku = %sku.code, delta, "stock adjusted");
        self.notifier.publish("inventory.adjusted", vec![sku.code.to_string()], None);
        Ok(txn)
    }

    fn sku_code(&self, sku_id: &SkuId) -> ServiceResult<String> {
        Ok(self.stores.catalog.require(*sku_id)?.code.to_string())
    }
}

fn write_off_record(
    sku_id: SkuId,
    qty: i64,
    reason: WriteOffReason,
    origin_reference: &str,
    notes: Option<String>,
    actor: Option<String>,
    at: DateTime<Utc>,
) -> WriteOff {
    WriteOff {
        id: WriteOffId::new(),
        sku_id,
        qty,
        reason,
        origin_reference: Some(origin_reference.to_string()),
        notes,
        created_by: actor,
        created_at: at,
    }
}
