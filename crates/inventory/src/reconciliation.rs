//! Stock reconciliation sessions.
//!
//! A session snapshots the system quantity of every active SKU, collects
//! physical counts, and on submission turns every non-zero variance into one
//! adjustment transaction.
//!
//! Lifecycle: `draft → submitted` or `draft → deleted`. Both are terminal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, Event, ExpectedVersion, ReconciliationId,
    SkuId,
};

use crate::count_sheet::CountRow;
use crate::ledger::{InventoryTransaction, TxnReason};
use crate::sku::SkuCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Draft,
    Submitted,
    Deleted,
}

/// Why a counted quantity differs from the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    Shrinkage,
    Damaged,
    Theft,
    CountError,
    Expired,
    Misplaced,
    Found,
    UnrecordedProduction,
    UnrecordedReturn,
}

impl AdjustmentReason {
    /// Reasons allowed when physical < system.
    pub const SHORTAGE: [AdjustmentReason; 6] = [
        AdjustmentReason::Shrinkage,
        AdjustmentReason::Damaged,
        AdjustmentReason::Theft,
        AdjustmentReason::CountError,
        AdjustmentReason::Expired,
        AdjustmentReason::Misplaced,
    ];

    /// Reasons allowed when physical > system.
    pub const OVERAGE: [AdjustmentReason; 4] = [
        AdjustmentReason::Found,
        AdjustmentReason::CountError,
        AdjustmentReason::UnrecordedProduction,
        AdjustmentReason::UnrecordedReturn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentReason::Shrinkage => "shrinkage",
            AdjustmentReason::Damaged => "damaged",
            AdjustmentReason::Theft => "theft",
            AdjustmentReason::CountError => "count_error",
            AdjustmentReason::Expired => "expired",
            AdjustmentReason::Misplaced => "misplaced",
            AdjustmentReason::Found => "found",
            AdjustmentReason::UnrecordedProduction => "unrecorded_production",
            AdjustmentReason::UnrecordedReturn => "unrecorded_return",
        }
    }

    /// Reasons a variance of this sign may carry. Zero variance needs none.
    pub fn allowed_for(variance: i64) -> &'static [AdjustmentReason] {
        match variance.signum() {
            -1 => &Self::SHORTAGE,
            1 => &Self::OVERAGE,
            _ => &[],
        }
    }

    /// Whether this reason may explain the given variance.
    pub fn fits(self, variance: i64) -> bool {
        variance == 0 || Self::allowed_for(variance).contains(&self)
    }
}

/// System quantity of one SKU at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub sku_id: SkuId,
    pub sku_code: String,
    pub system_qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub sku_id: SkuId,
    pub sku_code: String,
    pub system_qty: i64,
    pub physical_qty: Option<i64>,
    pub variance: Option<i64>,
    pub adjustment_reason: Option<AdjustmentReason>,
    pub notes: Option<String>,
}

impl ReconciliationItem {
    fn from_snapshot(line: &SnapshotLine) -> Self {
        Self {
            sku_id: line.sku_id,
            sku_code: line.sku_code.clone(),
            system_qty: line.system_qty,
            physical_qty: None,
            variance: None,
            adjustment_reason: None,
            notes: None,
        }
    }

    /// `physical − system`, or `None` while uncounted.
    pub fn variance_for(system_qty: i64, physical_qty: Option<i64>) -> Option<i64> {
        physical_qty.map(|p| p.saturating_sub(system_qty))
    }

    fn replace(&mut self, update: &ItemUpdate) {
        self.physical_qty = update.physical_qty;
        self.variance = Self::variance_for(self.system_qty, update.physical_qty);
        self.adjustment_reason = update.adjustment_reason;
        self.notes = update.notes.clone().filter(|n| !n.trim().is_empty());
    }

    pub fn has_variance(&self) -> bool {
        self.variance.is_some_and(|v| v != 0)
    }
}

/// Full replacement of one item's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub sku_id: SkuId,
    pub physical_qty: Option<i64>,
    #[serde(default)]
    pub adjustment_reason: Option<AdjustmentReason>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One adjustment produced by submitting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceAdjustment {
    pub sku_id: SkuId,
    pub sku_code: String,
    pub variance: i64,
    pub reason: AdjustmentReason,
    pub notes: Option<String>,
}

impl VarianceAdjustment {
    /// Ledger entry for this adjustment: outward for shortages, inward for overages.
    pub fn to_transaction(
        &self,
        session_id: ReconciliationId,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<InventoryTransaction> {
        let notes = match &self.notes {
            Some(n) => format!("{}: {}", self.reason.as_str(), n),
            None => self.reason.as_str().to_string(),
        };
        Ok(
            InventoryTransaction::correction(self.sku_id, self.variance, TxnReason::Reconciliation, at)?
                .with_reference(format!("reconciliation:{session_id}"))
                .with_notes(Some(notes))
                .created_by(actor),
        )
    }
}

/// Counters shown in session lists and headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_items: usize,
    pub counted_items: usize,
    pub items_with_variance: usize,
    pub shortage_units: i64,
    pub overage_units: i64,
}

/// Result of matching count-sheet rows against a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountMatch {
    pub updates: Vec<ItemUpdate>,
    pub matched: usize,
    pub updated: usize,
    pub not_found: Vec<String>,
}

/// Aggregate root: ReconciliationSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationSession {
    id: ReconciliationId,
    status: ReconciliationStatus,
    items: Vec<ReconciliationItem>,
    created_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    version: u64,
    #[serde(skip)]
    created: bool,
    #[serde(skip)]
    by_sku: HashMap<SkuId, usize>,
    #[serde(skip)]
    by_code: HashMap<String, usize>,
}

impl ReconciliationSession {
    /// Create an empty, not-yet-started session.
    pub fn empty(id: ReconciliationId) -> Self {
        Self {
            id,
            status: ReconciliationStatus::Draft,
            items: Vec::new(),
            created_at: None,
            submitted_at: None,
            version: 0,
            created: false,
            by_sku: HashMap::new(),
            by_code: HashMap::new(),
        }
    }

    pub fn id_typed(&self) -> ReconciliationId {
        self.id
    }

    pub fn status(&self) -> ReconciliationStatus {
        self.status
    }

    pub fn items(&self) -> &[ReconciliationItem] {
        &self.items
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn is_draft(&self) -> bool {
        self.created && self.status == ReconciliationStatus::Draft
    }

    pub fn item(&self, sku_id: SkuId) -> Option<&ReconciliationItem> {
        self.by_sku.get(&sku_id).map(|&i| &self.items[i])
    }

    /// Case-insensitive lookup by SKU code.
    pub fn item_by_code(&self, code: &str) -> Option<&ReconciliationItem> {
        self.by_code
            .get(&SkuCode::normalize(code))
            .map(|&i| &self.items[i])
    }

    pub fn summary(&self) -> SessionSummary {
        let mut s = SessionSummary {
            total_items: self.items.len(),
            ..SessionSummary::default()
        };
        for item in &self.items {
            if item.physical_qty.is_some() {
                s.counted_items += 1;
            }
            match item.variance {
                Some(v) if v < 0 => {
                    s.items_with_variance += 1;
                    s.shortage_units += -v;
                }
                Some(v) if v > 0 => {
                    s.items_with_variance += 1;
                    s.overage_units += v;
                }
                _ => {}
            }
        }
        s
    }

    /// Adjustments a submit would produce right now, in item order.
    pub fn pending_adjustments(&self) -> DomainResult<Vec<VarianceAdjustment>> {
        let mut missing = Vec::new();
        let mut adjustments = Vec::new();

        for item in self.items.iter().filter(|i| i.has_variance()) {
            let variance = item.variance.unwrap_or_default();
            match item.adjustment_reason {
                None => missing.push(item.sku_code.clone()),
                Some(reason) if !reason.fits(variance) => {
                    return Err(DomainError::validation(format!(
                        "reason '{}' does not fit variance {variance} of {}",
                        reason.as_str(),
                        item.sku_code
                    )));
                }
                Some(reason) => adjustments.push(VarianceAdjustment {
                    sku_id: item.sku_id,
                    sku_code: item.sku_code.clone(),
                    variance,
                    reason,
                    notes: item.notes.clone(),
                }),
            }
        }

        if !missing.is_empty() {
            return Err(DomainError::selection_required(format!(
                "adjustment reason required for: {}",
                missing.join(", ")
            )));
        }
        Ok(adjustments)
    }

    /// Match parsed count rows to session items by SKU code.
    ///
    /// Counts replace the physical quantity only; an existing reason is kept
    /// when it still fits the new variance and dropped otherwise.
    pub fn match_count_rows(&self, rows: &[CountRow]) -> CountMatch {
        let mut result = CountMatch::default();
        let mut latest: HashMap<SkuId, usize> = HashMap::new();
        let mut stored: Vec<Option<i64>> = Vec::new();

        for row in rows {
            let Some(item) = self.item_by_code(&row.sku_code) else {
                result.not_found.push(row.sku_code.clone());
                continue;
            };
            result.matched += 1;

            let variance = row.physical_qty.saturating_sub(item.system_qty);
            let update = ItemUpdate {
                sku_id: item.sku_id,
                physical_qty: Some(row.physical_qty),
                adjustment_reason: item.adjustment_reason.filter(|r| r.fits(variance)),
                notes: item.notes.clone(),
            };

            match latest.get(&item.sku_id) {
                Some(&idx) => result.updates[idx] = update,
                None => {
                    latest.insert(item.sku_id, result.updates.len());
                    result.updates.push(update);
                    stored.push(item.physical_qty);
                }
            }
        }

        // One per SKU whose winning row changes the stored count.
        result.updated = result
            .updates
            .iter()
            .zip(&stored)
            .filter(|(update, before)| update.physical_qty != **before)
            .count();
        result
    }

    fn ensure_session_id(&self, session_id: ReconciliationId) -> Result<(), DomainError> {
        if self.id != session_id {
            return Err(DomainError::invariant("session_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("reconciliation {}", self.id)));
        }
        match self.status {
            ReconciliationStatus::Draft => Ok(()),
            ReconciliationStatus::Submitted => Err(DomainError::conflict(format!(
                "reconciliation {} is already submitted",
                self.id
            ))),
            ReconciliationStatus::Deleted => Err(DomainError::conflict(format!(
                "reconciliation {} was deleted",
                self.id
            ))),
        }
    }

    fn rebuild_index(&mut self) {
        self.by_sku = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.sku_id, i))
            .collect();
        self.by_code = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (SkuCode::normalize(&item.sku_code), i))
            .collect();
    }
}

impl AggregateRoot for ReconciliationSession {
    type Id = ReconciliationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StartSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSession {
    pub session_id: ReconciliationId,
    pub snapshot: Vec<SnapshotLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCounts {
    pub session_id: ReconciliationId,
    pub updates: Vec<ItemUpdate>,
    pub expected_version: ExpectedVersion,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSession {
    pub session_id: ReconciliationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSession {
    pub session_id: ReconciliationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationCommand {
    StartSession(StartSession),
    RecordCounts(RecordCounts),
    SubmitSession(SubmitSession),
    DeleteSession(DeleteSession),
}

/// Event: SessionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: ReconciliationId,
    pub snapshot: Vec<SnapshotLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountsRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsRecorded {
    pub session_id: ReconciliationId,
    pub updates: Vec<ItemUpdate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SessionSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSubmitted {
    pub session_id: ReconciliationId,
    pub adjustments: Vec<VarianceAdjustment>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SessionDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDeleted {
    pub session_id: ReconciliationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationEvent {
    SessionStarted(SessionStarted),
    CountsRecorded(CountsRecorded),
    SessionSubmitted(SessionSubmitted),
    SessionDeleted(SessionDeleted),
}

impl Event for ReconciliationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconciliationEvent::SessionStarted(_) => "inventory.reconciliation.started",
            ReconciliationEvent::CountsRecorded(_) => "inventory.reconciliation.counts_recorded",
            ReconciliationEvent::SessionSubmitted(_) => "inventory.reconciliation.submitted",
            ReconciliationEvent::SessionDeleted(_) => "inventory.reconciliation.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReconciliationEvent::SessionStarted(e) => e.occurred_at,
            ReconciliationEvent::CountsRecorded(e) => e.occurred_at,
            ReconciliationEvent::SessionSubmitted(e) => e.occurred_at,
            ReconciliationEvent::SessionDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReconciliationSession {
    type Command = ReconciliationCommand;
    type Event = ReconciliationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReconciliationEvent::SessionStarted(e) => {
                self.id = e.session_id;
                self.status = ReconciliationStatus::Draft;
                self.items = e.snapshot.iter().map(ReconciliationItem::from_snapshot).collect();
                self.created_at = Some(e.occurred_at);
                self.created = true;
                self.rebuild_index();
            }
            ReconciliationEvent::CountsRecorded(e) => {
                for update in &e.updates {
                    if let Some(&idx) = self.by_sku.get(&update.sku_id) {
                        self.items[idx].replace(update);
                    }
                }
            }
            ReconciliationEvent::SessionSubmitted(e) => {
                self.status = ReconciliationStatus::Submitted;
                self.submitted_at = Some(e.occurred_at);
            }
            ReconciliationEvent::SessionDeleted(_) => {
                self.status = ReconciliationStatus::Deleted;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReconciliationCommand::StartSession(cmd) => self.handle_start(cmd),
            ReconciliationCommand::RecordCounts(cmd) => self.handle_record_counts(cmd),
            ReconciliationCommand::SubmitSession(cmd) => self.handle_submit(cmd),
            ReconciliationCommand::DeleteSession(cmd) => self.handle_delete(cmd),
        }
    }
}

impl ReconciliationSession {
    fn handle_start(&self, cmd: &StartSession) -> Result<Vec<ReconciliationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("reconciliation already started"));
        }
        self.ensure_session_id(cmd.session_id)?;

        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_codes = std::collections::HashSet::new();
        for line in &cmd.snapshot {
            if !seen_ids.insert(line.sku_id) || !seen_codes.insert(SkuCode::normalize(&line.sku_code)) {
                return Err(DomainError::invariant(format!(
                    "snapshot lists {} more than once",
                    line.sku_code
                )));
            }
        }

        Ok(vec![ReconciliationEvent::SessionStarted(SessionStarted {
            session_id: cmd.session_id,
            snapshot: cmd.snapshot.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_counts(
        &self,
        cmd: &RecordCounts,
    ) -> Result<Vec<ReconciliationEvent>, DomainError> {
        self.ensure_draft()?;
        self.ensure_session_id(cmd.session_id)?;
        cmd.expected_version.check(self.version)?;

        for update in &cmd.updates {
            let item = self.item(update.sku_id).ok_or_else(|| {
                DomainError::validation(format!("sku {} is not part of this session", update.sku_id))
            })?;

            if let Some(p) = update.physical_qty {
                if p < 0 {
                    return Err(DomainError::validation(format!(
                        "physical quantity for {} cannot be negative",
                        item.sku_code
                    )));
                }
            }

            if let (Some(reason), Some(variance)) = (
                update.adjustment_reason,
                ReconciliationItem::variance_for(item.system_qty, update.physical_qty),
            ) {
                if !reason.fits(variance) {
                    return Err(DomainError::validation(format!(
                        "reason '{}' does not fit variance {variance} of {}",
                        reason.as_str(),
                        item.sku_code
                    )));
                }
            }
        }

        Ok(vec![ReconciliationEvent::CountsRecorded(CountsRecorded {
            session_id: cmd.session_id,
            updates: cmd.updates.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitSession) -> Result<Vec<ReconciliationEvent>, DomainError> {
        self.ensure_draft()?;
        self.ensure_session_id(cmd.session_id)?;

        let adjustments = self.pending_adjustments()?;

        Ok(vec![ReconciliationEvent::SessionSubmitted(SessionSubmitted {
            session_id: cmd.session_id,
            adjustments,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteSession) -> Result<Vec<ReconciliationEvent>, DomainError> {
        self.ensure_draft()?;
        self.ensure_session_id(cmd.session_id)?;

        Ok(vec![ReconciliationEvent::SessionDeleted(SessionDeleted {
            session_id: cmd.session_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
