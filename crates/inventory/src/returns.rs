//! Customer return tickets, one record per SKU line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ReturnLineId, SkuId};

use crate::repacking::RepackingDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    AwaitingReceipt,
    Received,
    Cancelled,
}

/// Condition of a returned unit as judged at the receiving desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    Good,
    Used,
    Damaged,
    WrongProduct,
}

impl ReturnCondition {
    /// Default QC routing; the repacking desk makes the final call.
    pub fn suggested_decision(self) -> RepackingDecision {
        match self {
            ReturnCondition::Good | ReturnCondition::Used => RepackingDecision::Ready,
            ReturnCondition::Damaged | ReturnCondition::WrongProduct => RepackingDecision::WriteOff,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnCondition::Good => "good",
            ReturnCondition::Used => "used",
            ReturnCondition::Damaged => "damaged",
            ReturnCondition::WrongProduct => "wrong_product",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub id: ReturnLineId,
    pub ticket_number: String,
    pub sku_id: SkuId,
    pub qty: i64,
    pub customer_name: String,
    #[serde(default)]
    pub return_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: ReturnStatus,
    #[serde(default)]
    pub condition: Option<ReturnCondition>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

fn default_status() -> ReturnStatus {
    ReturnStatus::AwaitingReceipt
}

impl ReturnLine {
    pub fn is_awaiting_receipt(&self) -> bool {
        self.status == ReturnStatus::AwaitingReceipt
    }

    /// Mark the line as physically received in the given condition.
    pub fn receive(&mut self, condition: ReturnCondition, at: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            ReturnStatus::AwaitingReceipt => {}
            ReturnStatus::Received => {
                return Err(DomainError::conflict(format!(
                    "return {} already received",
                    self.ticket_number
                )));
            }
            ReturnStatus::Cancelled => {
                return Err(DomainError::invariant(format!(
                    "return {} was cancelled",
                    self.ticket_number
                )));
            }
        }
        self.status = ReturnStatus::Received;
        self.condition = Some(condition);
        self.received_at = Some(at);
        Ok(())
    }
}
