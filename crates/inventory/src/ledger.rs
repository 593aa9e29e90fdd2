//! Inventory ledger entries.
//!
//! The ledger is append-only: balances are always folded from transactions,
//! never stored as the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, SkuId, TransactionId};

use crate::sku::StockBalance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnType {
    Inward,
    Outward,
    /// Units held for an allocated order; reduces availability, not stock.
    Reserved,
}

/// Why a ledger entry was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnReason {
    Production,
    RtoReceived,
    RepackComplete,
    Adjustment,
    Reconciliation,
    OrderAllocation,
}

impl TxnReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TxnReason::Production => "production",
            TxnReason::RtoReceived => "rto_received",
            TxnReason::RepackComplete => "repack_complete",
            TxnReason::Adjustment => "adjustment",
            TxnReason::Reconciliation => "reconciliation",
            TxnReason::OrderAllocation => "order_allocation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" => Some(TxnReason::Production),
            "rto_received" => Some(TxnReason::RtoReceived),
            "repack_complete" => Some(TxnReason::RepackComplete),
            "adjustment" => Some(TxnReason::Adjustment),
            "reconciliation" => Some(TxnReason::Reconciliation),
            "order_allocation" => Some(TxnReason::OrderAllocation),
            _ => None,
        }
    }
}

impl TxnType {
    pub fn as_str(self) -> &'static str {
        match self {
            TxnType::Inward => "inward",
            TxnType::Outward => "outward",
            TxnType::Reserved => "reserved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inward" => Some(TxnType::Inward),
            "outward" => Some(TxnType::Outward),
            "reserved" => Some(TxnType::Reserved),
            _ => None,
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub sku_id: SkuId,
    pub txn_type: TxnType,
    /// Always positive; direction comes from `txn_type`.
    pub qty: i64,
    pub reason: TxnReason,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    pub fn new(
        sku_id: SkuId,
        txn_type: TxnType,
        qty: i64,
        reason: TxnReason,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if qty <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            id: TransactionId::new(),
            sku_id,
            txn_type,
            qty,
            reason,
            reference_id: None,
            notes: None,
            created_by: None,
            created_at,
        })
    }

    pub fn inward(
        sku_id: SkuId,
        qty: i64,
        reason: TxnReason,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::new(sku_id, TxnType::Inward, qty, reason, created_at)
    }

    /// Signed stock correction: positive deltas are inward, negative outward.
    pub fn correction(
        sku_id: SkuId,
        delta: i64,
        reason: TxnReason,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        match delta.signum() {
            1 => Self::new(sku_id, TxnType::Inward, delta, reason, created_at),
            -1 => Self::new(sku_id, TxnType::Outward, -delta, reason, created_at),
            _ => Err(DomainError::validation("delta cannot be zero")),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_id = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn created_by(mut self, actor: Option<String>) -> Self {
        self.created_by = actor;
        self
    }

    /// Effect on the current (physical) balance.
    pub fn stock_delta(&self) -> i64 {
        match self.txn_type {
            TxnType::Inward => self.qty,
            TxnType::Outward => -self.qty,
            TxnType::Reserved => 0,
        }
    }
}

impl StockBalance {
    /// Add one entry to the running totals. A total that would leave the
    /// `i64` range is an error and leaves `self` untouched.
    pub fn apply(&mut self, txn: &InventoryTransaction) -> DomainResult<()> {
        let total = match txn.txn_type {
            TxnType::Inward => &mut self.total_inward,
            TxnType::Outward => &mut self.total_outward,
            TxnType::Reserved => &mut self.reserved,
        };
        *total = total.checked_add(txn.qty).ok_or_else(|| {
            DomainError::validation(format!(
                "{} total for sku {} would exceed {}",
                txn.txn_type.as_str(),
                txn.sku_id,
                i64::MAX
            ))
        })?;
        Ok(())
    }
}

/// Fold the balance of one SKU from its ledger entries.
pub fn fold_balance<'a>(
    sku_id: SkuId,
    txns: impl IntoIterator<Item = &'a InventoryTransaction>,
) -> DomainResult<StockBalance> {
    let mut balance = StockBalance::default();
    for txn in txns.into_iter().filter(|t| t.sku_id == sku_id) {
        balance.apply(txn)?;
    }
    Ok(balance)
}
