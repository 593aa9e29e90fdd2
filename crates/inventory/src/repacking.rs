//! Repacking (QC) queue and write-offs.
//!
//! Returned units land here before anyone decides whether they go back to
//! stock or get written off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, RepackingItemId, SkuId, WriteOffId};

use crate::returns::ReturnCondition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepackingOrigin {
    Return,
    Rto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepackingStatus {
    Pending,
    Ready,
    WrittenOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepackingDecision {
    Ready,
    WriteOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOffReason {
    Damaged,
    Defective,
    Stained,
    WrongProduct,
    MissingParts,
    Other,
}

impl WriteOffReason {
    pub const ALL: [WriteOffReason; 6] = [
        WriteOffReason::Damaged,
        WriteOffReason::Defective,
        WriteOffReason::Stained,
        WriteOffReason::WrongProduct,
        WriteOffReason::MissingParts,
        WriteOffReason::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WriteOffReason::Damaged => "damaged",
            WriteOffReason::Defective => "defective",
            WriteOffReason::Stained => "stained",
            WriteOffReason::WrongProduct => "wrong_product",
            WriteOffReason::MissingParts => "missing_parts",
            WriteOffReason::Other => "other",
        }
    }
}

/// Permanent removal record. Write-offs never touch the ledger: the units
/// were not in stock to begin with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOff {
    pub id: WriteOffId,
    pub sku_id: SkuId,
    pub qty: i64,
    pub reason: WriteOffReason,
    pub origin_reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepackingItem {
    pub id: RepackingItemId,
    pub sku_id: SkuId,
    pub qty: i64,
    pub origin: RepackingOrigin,
    #[serde(default)]
    pub origin_reference: Option<String>,
    #[serde(default)]
    pub condition: Option<ReturnCondition>,
    #[serde(default)]
    pub suggested_decision: Option<RepackingDecision>,
    #[serde(default = "default_status")]
    pub status: RepackingStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

fn default_status() -> RepackingStatus {
    RepackingStatus::Pending
}

/// Result of a QC decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepackingOutcome {
    /// Units go back to sellable stock.
    Restock { qty: i64 },
    WrittenOff(WriteOff),
}

impl RepackingItem {
    /// Queue a received return for inspection.
    pub fn from_return(
        sku_id: SkuId,
        qty: i64,
        ticket_number: &str,
        condition: ReturnCondition,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RepackingItemId::new(),
            sku_id,
            qty,
            origin: RepackingOrigin::Return,
            origin_reference: Some(ticket_number.to_string()),
            condition: Some(condition),
            suggested_decision: Some(condition.suggested_decision()),
            status: RepackingStatus::Pending,
            notes,
            queued_at: at,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RepackingStatus::Pending
    }

    pub fn process(
        &mut self,
        decision: RepackingDecision,
        write_off_reason: Option<WriteOffReason>,
        notes: Option<String>,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<RepackingOutcome> {
        if !self.is_pending() {
            return Err(DomainError::conflict(format!(
                "repacking item {} already processed",
                self.id
            )));
        }

        let outcome = match decision {
            RepackingDecision::Ready => {
                self.status = RepackingStatus::Ready;
                RepackingOutcome::Restock { qty: self.qty }
            }
            RepackingDecision::WriteOff => {
                let reason = write_off_reason.ok_or_else(|| {
                    DomainError::selection_required("write-off reason is required")
                })?;
                self.status = RepackingStatus::WrittenOff;
                RepackingOutcome::WrittenOff(WriteOff {
                    id: WriteOffId::new(),
                    sku_id: self.sku_id,
                    qty: self.qty,
                    reason,
                    origin_reference: self.origin_reference.clone(),
                    notes: notes.clone(),
                    created_by: actor,
                    created_at: at,
                })
            }
        };

        if notes.is_some() {
            self.notes = notes;
        }
        self.processed_at = Some(at);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> RepackingItem {
        RepackingItem::from_return(
            SkuId::new(),
            2,
            "RET-7",
            ReturnCondition::Damaged,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn returns_enter_queue_with_suggested_routing() {
        let i = item();
        assert!(i.is_pending());
        assert_eq!(i.origin, RepackingOrigin::Return);
        assert_eq!(i.suggested_decision, Some(RepackingDecision::WriteOff));
        assert_eq!(i.origin_reference.as_deref(), Some("RET-7"));
    }

    #[test]
    fn ready_restocks_full_quantity() {
        let mut i = item();
        let out = i
            .process(RepackingDecision::Ready, None, None, None, Utc::now())
            .unwrap();
        assert_eq!(out, RepackingOutcome::Restock { qty: 2 });
        assert_eq!(i.status, RepackingStatus::Ready);
    }

    #[test]
    fn write_off_requires_reason() {
        let mut i = item();
        let err = i
            .process(RepackingDecision::WriteOff, None, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::SelectionRequired(_)));
        assert!(i.is_pending());

        let out = i
            .process(
                RepackingDecision::WriteOff,
                Some(WriteOffReason::Stained),
                Some("ink stain".into()),
                Some("qc-desk".into()),
                Utc::now(),
            )
            .unwrap();
        match out {
            RepackingOutcome::WrittenOff(w) => {
                assert_eq!(w.reason, WriteOffReason::Stained);
                assert_eq!(w.qty, 2);
                assert_eq!(w.created_by.as_deref(), Some("qc-desk"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(i.status, RepackingStatus::WrittenOff);
    }

    #[test]
    fn processed_item_cannot_be_processed_again() {
        let mut i = item();
        i.process(RepackingDecision::Ready, None, None, None, Utc::now())
            .unwrap();
        let err = i
            .process(RepackingDecision::Ready, None, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
