use serde::Deserialize;

use stockroom_core::DomainError;
use stockroom_inventory::{ItemUpdate, RepackingDecision, ReturnCondition, RtoCondition, WriteOffReason};

use crate::app::errors;

pub const DEFAULT_QUEUE_LIMIT: usize = 50;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 500;

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub sku: Option<String>,
    pub limit: Option<usize>,
}

// -------------------------
// Request bodies
// -------------------------

#[derive(Debug, Deserialize)]
pub struct QuickInwardRequest {
    pub sku_code: String,
    pub qty: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub sku_code: String,
    pub delta: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReturnReceiveRequest {
    pub line_id: String,
    /// Optional so a missing value surfaces as a selection error, not a parse error.
    #[serde(default)]
    pub condition: Option<ReturnCondition>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RtoInwardLineRequest {
    pub line_id: String,
    #[serde(default)]
    pub condition: Option<RtoCondition>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepackingProcessRequest {
    pub item_id: String,
    #[serde(default)]
    pub decision: Option<RepackingDecision>,
    #[serde(default)]
    pub write_off_reason: Option<WriteOffReason>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub items: Vec<ItemUpdate>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Parse a path or body id, answering 400 on garbage.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(errors::domain_error_to_response)
}

pub fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::SkuId;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 50), 50);
        assert_eq!(clamp_limit(Some(0), 50), 1);
        assert_eq!(clamp_limit(Some(10_000), 50), MAX_LIMIT);
    }

    #[test]
    fn bad_ids_are_rejected() {
        assert!(parse_id::<SkuId>("not-a-uuid").is_err());
        let id = SkuId::new();
        assert_eq!(parse_id::<SkuId>(&id.to_string()).unwrap(), id);
    }
}
