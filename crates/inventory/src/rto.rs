//! Return-to-origin orders: shipments the courier is bringing back.
//!
//! Lines are received one at a time so a multi-line order can be partially
//! processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, OrderId, OrderLineId, SkuId};

use crate::repacking::WriteOffReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtoStatus {
    RtoInTransit,
    RtoDelivered,
    RtoReceived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtoCondition {
    Unopened,
    Good,
    Damaged,
    WrongProduct,
}

/// What receiving a line does to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtoDisposition {
    Restock,
    WriteOff(WriteOffReason),
}

impl RtoCondition {
    pub fn disposition(self) -> RtoDisposition {
        match self {
            RtoCondition::Unopened | RtoCondition::Good => RtoDisposition::Restock,
            RtoCondition::Damaged => RtoDisposition::WriteOff(WriteOffReason::Damaged),
            RtoCondition::WrongProduct => RtoDisposition::WriteOff(WriteOffReason::WrongProduct),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtoLine {
    pub id: OrderLineId,
    pub sku_id: SkuId,
    pub qty: i64,
    #[serde(default)]
    pub condition: Option<RtoCondition>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl RtoLine {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtoOrder {
    pub id: OrderId,
    pub order_number: String,
    pub customer_name: String,
    pub rto_initiated_at: DateTime<Utc>,
    pub status: RtoStatus,
    pub lines: Vec<RtoLine>,
}

/// Per-order receiving progress, shown next to each line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtoProgress {
    pub order_id: OrderId,
    pub order_number: String,
    pub total_lines: usize,
    pub processed_lines: usize,
    pub lines: Vec<RtoLine>,
}

impl RtoProgress {
    pub fn is_complete(&self) -> bool {
        self.processed_lines == self.total_lines
    }
}

impl RtoOrder {
    /// Whether the order still has lines waiting at (or on the way to) the warehouse.
    pub fn is_pending(&self) -> bool {
        self.status != RtoStatus::RtoReceived && self.lines.iter().any(|l| !l.is_processed())
    }

    pub fn at_warehouse(&self) -> bool {
        self.status == RtoStatus::RtoDelivered
    }

    pub fn days_in_rto(&self, now: DateTime<Utc>) -> i64 {
        (now - self.rto_initiated_at).num_days().max(0)
    }

    pub fn line(&self, line_id: OrderLineId) -> Option<&RtoLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Receive one line; the order flips to `RtoReceived` once every line is in.
    pub fn receive_line(
        &mut self,
        line_id: OrderLineId,
        condition: RtoCondition,
        at: DateTime<Utc>,
    ) -> DomainResult<RtoLine> {
        if self.status == RtoStatus::RtoReceived {
            return Err(DomainError::conflict(format!(
                "order {} already fully received",
                self.order_number
            )));
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(format!("rto line {line_id}")))?;

        if line.is_processed() {
            return Err(DomainError::conflict(format!(
                "line {line_id} of order {} already processed",
                self.order_number
            )));
        }

        line.condition = Some(condition);
        line.processed_at = Some(at);
        let received = line.clone();

        if self.lines.iter().all(RtoLine::is_processed) {
            self.status = RtoStatus::RtoReceived;
        }
        Ok(received)
    }

    pub fn progress(&self) -> RtoProgress {
        RtoProgress {
            order_id: self.id,
            order_number: self.order_number.clone(),
            total_lines: self.lines.len(),
            processed_lines: self.lines.iter().filter(|l| l.is_processed()).count(),
            lines: self.lines.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order(lines: usize) -> RtoOrder {
        RtoOrder {
            id: OrderId::new(),
            order_number: "ORD-5521".into(),
            customer_name: "B. Buyer".into(),
            rto_initiated_at: Utc::now() - Duration::days(9),
            status: RtoStatus::RtoInTransit,
            lines: (0..lines)
                .map(|_| RtoLine {
                    id: OrderLineId::new(),
                    sku_id: SkuId::new(),
                    qty: 1,
                    condition: None,
                    processed_at: None,
                })
                .collect(),
        }
    }

    #[test]
    fn partial_receipt_tracks_progress() {
        let mut o = order(3);
        let first = o.lines[0].id;
        o.receive_line(first, RtoCondition::Unopened, Utc::now()).unwrap();

        let p = o.progress();
        assert_eq!(p.total_lines, 3);
        assert_eq!(p.processed_lines, 1);
        assert!(!p.is_complete());
        assert_eq!(o.status, RtoStatus::RtoInTransit);
        assert!(o.is_pending());
    }

    #[test]
    fn last_line_completes_order() {
        let mut o = order(2);
        let ids: Vec<_> = o.lines.iter().map(|l| l.id).collect();
        o.receive_line(ids[0], RtoCondition::Good, Utc::now()).unwrap();
        o.receive_line(ids[1], RtoCondition::Damaged, Utc::now()).unwrap();
        assert_eq!(o.status, RtoStatus::RtoReceived);
        assert!(o.progress().is_complete());
        assert!(!o.is_pending());
    }

    #[test]
    fn line_cannot_be_received_twice() {
        let mut o = order(2);
        let id = o.lines[0].id;
        o.receive_line(id, RtoCondition::Good, Utc::now()).unwrap();
        let err = o.receive_line(id, RtoCondition::Good, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn unknown_line_is_not_found() {
        let mut o = order(1);
        let err = o
            .receive_line(OrderLineId::new(), RtoCondition::Good, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn condition_decides_restock_or_write_off() {
        assert_eq!(RtoCondition::Unopened.disposition(), RtoDisposition::Restock);
        assert_eq!(RtoCondition::Good.disposition(), RtoDisposition::Restock);
        assert_eq!(
            RtoCondition::Damaged.disposition(),
            RtoDisposition::WriteOff(WriteOffReason::Damaged)
        );
        assert_eq!(
            RtoCondition::WrongProduct.disposition(),
            RtoDisposition::WriteOff(WriteOffReason::WrongProduct)
        );
    }

    #[test]
    fn days_in_rto_counts_whole_days() {
        let o = order(1);
        assert_eq!(o.days_in_rto(Utc::now()), 9);
    }
}
