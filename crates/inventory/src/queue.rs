//! Pending inward queues and scan-source ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, SkuId};

/// One of the four queues an inwarded unit can be matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSource {
    Production,
    Returns,
    Rto,
    Repacking,
}

impl QueueSource {
    pub const ALL: [QueueSource; 4] = [
        QueueSource::Production,
        QueueSource::Returns,
        QueueSource::Rto,
        QueueSource::Repacking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueSource::Production => "production",
            QueueSource::Returns => "returns",
            QueueSource::Rto => "rto",
            QueueSource::Repacking => "repacking",
        }
    }

    pub fn inward_source(self) -> InwardSource {
        match self {
            QueueSource::Production => InwardSource::Production,
            QueueSource::Returns => InwardSource::Return,
            QueueSource::Rto => InwardSource::Rto,
            QueueSource::Repacking => InwardSource::Repacking,
        }
    }
}

impl core::str::FromStr for QueueSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" => Ok(QueueSource::Production),
            "returns" | "return" => Ok(QueueSource::Returns),
            "rto" => Ok(QueueSource::Rto),
            "repacking" => Ok(QueueSource::Repacking),
            other => Err(DomainError::validation(format!(
                "unknown queue source '{other}' (expected production, returns, rto, repacking)"
            ))),
        }
    }
}

/// Recommended inward flow for a scanned unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InwardSource {
    Repacking,
    Return,
    Rto,
    Production,
    Adjustment,
}

/// Queue sources in recommendation order. Items already in the warehouse
/// awaiting a QC decision come first, net-new receipts last.
pub const SOURCE_PRIORITY: [QueueSource; 4] = [
    QueueSource::Repacking,
    QueueSource::Returns,
    QueueSource::Rto,
    QueueSource::Production,
];

/// Position of a source in [`SOURCE_PRIORITY`].
pub fn priority_rank(source: QueueSource) -> usize {
    SOURCE_PRIORITY
        .iter()
        .position(|s| *s == source)
        .unwrap_or(SOURCE_PRIORITY.len())
}

/// First source in priority order that has a match; adjustment otherwise.
pub fn recommend_source(matches: &[PendingQueueItem]) -> InwardSource {
    SOURCE_PRIORITY
        .iter()
        .find(|source| matches.iter().any(|m| m.source == **source))
        .map(|source| source.inward_source())
        .unwrap_or(InwardSource::Adjustment)
}

/// Order matches by source priority, keeping each source's own order.
pub fn rank_matches(matches: &mut [PendingQueueItem]) {
    matches.sort_by_key(|m| priority_rank(m.source));
}

/// A pending queue entry projected into a common shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQueueItem {
    pub source: QueueSource,
    /// Id of the underlying record (batch, return line, order line, repacking item).
    pub id: String,
    pub sku_id: SkuId,
    pub sku_code: String,
    pub product_name: String,
    pub colour: String,
    pub size: String,
    pub qty: i64,
    pub context_label: String,
    pub context_value: String,
    pub days_in_rto: Option<i64>,
    pub at_warehouse: bool,
    pub queued_at: DateTime<Utc>,
}
