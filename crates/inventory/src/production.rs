//! Production batches: planned output per SKU, completed as units are inwarded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{BatchId, DomainError, DomainResult, SkuId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub id: BatchId,
    pub batch_code: String,
    pub sku_id: SkuId,
    pub batch_date: NaiveDate,
    pub qty_planned: i64,
    #[serde(default)]
    pub qty_completed: i64,
    #[serde(default = "default_status")]
    pub status: BatchStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_status() -> BatchStatus {
    BatchStatus::Planned
}

impl ProductionBatch {
    pub fn qty_pending(&self) -> i64 {
        (self.qty_planned - self.qty_completed).max(0)
    }

    pub fn is_open(&self) -> bool {
        self.status != BatchStatus::Completed && self.qty_pending() > 0
    }

    /// Credit `qty` inwarded units against this batch.
    ///
    /// Only the pending part is credited; returns the credited amount.
    pub fn record_inward(&mut self, qty: i64, at: DateTime<Utc>) -> DomainResult<i64> {
        if qty <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !self.is_open() {
            return Err(DomainError::invariant(format!(
                "batch {} has no pending quantity",
                self.batch_code
            )));
        }

        let credited = qty.min(self.qty_pending());
        self.qty_completed += credited;
        if self.qty_pending() == 0 {
            self.status = BatchStatus::Completed;
            self.completed_at = Some(at);
        } else {
            self.status = BatchStatus::InProgress;
        }
        Ok(credited)
    }
}

/// The batch a production inward should be credited to: the oldest open
/// batch of the SKU (batch date, then batch code).
pub fn oldest_open_batch<'a>(
    sku_id: SkuId,
    batches: impl IntoIterator<Item = &'a ProductionBatch>,
) -> Option<&'a ProductionBatch> {
    batches
        .into_iter()
        .filter(|b| b.sku_id == sku_id && b.is_open())
        .min_by(|a, b| {
            a.batch_date
                .cmp(&b.batch_date)
                .then_with(|| a.batch_code.cmp(&b.batch_code))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(code: &str, sku: SkuId, date: (i32, u32, u32), planned: i64, done: i64) -> ProductionBatch {
        ProductionBatch {
            id: BatchId::new(),
            batch_code: code.into(),
            sku_id: sku,
            batch_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            qty_planned: planned,
            qty_completed: done,
            status: if done > 0 { BatchStatus::InProgress } else { BatchStatus::Planned },
            completed_at: None,
        }
    }

    #[test]
    fn oldest_open_batch_skips_completed_and_other_skus() {
        let sku = SkuId::new();
        let other = SkuId::new();
        let batches = vec![
            batch("B-003", sku, (2025, 3, 1), 10, 0),
            batch("B-001", sku, (2025, 1, 1), 10, 10),
            batch("B-002", sku, (2025, 2, 1), 10, 4),
            batch("B-000", other, (2024, 1, 1), 10, 0),
        ];

        let picked = oldest_open_batch(sku, &batches).unwrap();
        assert_eq!(picked.batch_code, "B-002");
    }

    #[test]
    fn same_day_batches_break_ties_by_code() {
        let sku = SkuId::new();
        let batches = vec![
            batch("B-010", sku, (2025, 1, 1), 5, 0),
            batch("B-009", sku, (2025, 1, 1), 5, 0),
        ];
        assert_eq!(oldest_open_batch(sku, &batches).unwrap().batch_code, "B-009");
    }

    #[test]
    fn record_inward_credits_only_pending_and_completes() {
        let mut b = batch("B-1", SkuId::new(), (2025, 1, 1), 10, 7);
        let credited = b.record_inward(5, Utc::now()).unwrap();
        assert_eq!(credited, 3);
        assert_eq!(b.qty_completed, 10);
        assert_eq!(b.status, BatchStatus::Completed);
        assert!(b.completed_at.is_some());
        assert!(b.record_inward(1, Utc::now()).is_err());
    }

    #[test]
    fn partial_inward_moves_batch_in_progress() {
        let mut b = batch("B-1", SkuId::new(), (2025, 1, 1), 10, 0);
        assert_eq!(b.record_inward(4, Utc::now()).unwrap(), 4);
        assert_eq!(b.status, BatchStatus::InProgress);
        assert_eq!(b.qty_pending(), 6);
    }
}
