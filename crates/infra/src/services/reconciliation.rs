//! Stock reconciliation sessions over the ledger.
//!
//! Every mutation runs under one async mutex, so a session is never edited
//! and submitted at the same time and a double submit sees `submitted`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use stockroom_core::{Aggregate, AggregateRoot, DomainError, Event, ExpectedVersion, ReconciliationId};
use stockroom_inventory::{
    DeleteSession, ItemUpdate, ReconciliationCommand, ReconciliationEvent, ReconciliationItem,
    ReconciliationSession, ReconciliationStatus, RecordCounts, SessionSummary, SnapshotLine,
    StartSession, SubmitSession, UploadReport, VarianceAdjustment, count_sheet,
};

use super::Stores;
use crate::error::{ServiceError, ServiceResult};
use crate::notify::ChangeNotifier;
use crate::store::KeyedStore;

/// A session as returned over the API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: ReconciliationId,
    pub status: ReconciliationStatus,
    pub version: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub summary: SessionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ReconciliationItem>>,
}

impl SessionView {
    pub fn full(session: &ReconciliationSession) -> Self {
        Self {
            items: Some(session.items().to_vec()),
            ..Self::header(session)
        }
    }

    /// Without items, for lists.
    pub fn header(session: &ReconciliationSession) -> Self {
        Self {
            id: session.id_typed(),
            status: session.status(),
            version: session.version(),
            created_at: session.created_at(),
            submitted_at: session.submitted_at(),
            summary: session.summary(),
            items: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    /// False when an existing draft was returned.
    pub created: bool,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub session_id: ReconciliationId,
    pub adjustments_created: usize,
    pub adjustments: Vec<VarianceAdjustment>,
}

pub struct ReconciliationService {
    stores: Stores,
    notifier: ChangeNotifier,
    low_match_threshold: f64,
    lock: Mutex<()>,
}

impl ReconciliationService {
    pub fn new(stores: Stores, notifier: ChangeNotifier, low_match_threshold: f64) -> Self {
        Self {
            stores,
            notifier,
            low_match_threshold,
            lock: Mutex::new(()),
        }
    }

    /// Snapshot every active SKU into a new draft, or return the open draft.
    #[instrument(skip(self))]
    pub async fn start(&self) -> ServiceResult<StartOutcome> {
        let _guard = self.lock.lock().await;

        if let Some(existing) = self.open_draft()? {
            return Ok(StartOutcome {
                created: false,
                session: SessionView::full(&existing),
            });
        }

        let balances = self.stores.ledger.balances().await?;
        let snapshot = self
            .stores
            .catalog
            .active()?
            .into_iter()
            .map(|sku| SnapshotLine {
                system_qty: balances.get(&sku.id).map(|b| b.current()).unwrap_or(0),
                sku_id: sku.id,
                sku_code: sku.code.to_string(),
            })
            .collect();

        let id = ReconciliationId::new();
        let mut session = ReconciliationSession::empty(id);
        let events = session.execute(&ReconciliationCommand::StartSession(StartSession {
            session_id: id,
            snapshot,
            occurred_at: Utc::now(),
        }))?;
        self.stores.sessions.upsert(id, session.clone())?;

        info!(session = %id, items = session.items().len(), event = event_type(&events), "reconciliation started");
        self.notifier.publish("reconciliation.started", Vec::new(), Some(id.to_string()));

        Ok(StartOutcome {
            created: true,
            session: SessionView::full(&session),
        })
    }

    pub fn get(&self, id: ReconciliationId) -> ServiceResult<SessionView> {
        Ok(SessionView::full(&self.load(id)?))
    }

    /// Newest first; deleted sessions are left out.
    pub fn list(&self) -> ServiceResult<Vec<SessionView>> {
        let mut sessions: Vec<ReconciliationSession> = self
            .stores
            .sessions
            .list()?
            .into_iter()
            .filter(|s| s.status() != ReconciliationStatus::Deleted)
            .collect();
        sessions.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(sessions.iter().map(SessionView::header).collect())
    }

    /// Replace counts, reasons and notes for the given SKUs.
    #[instrument(skip(self, updates), fields(updates = updates.len()))]
    pub async fn update(
        &self,
        id: ReconciliationId,
        updates: Vec<ItemUpdate>,
        expected_version: Option<u64>,
    ) -> ServiceResult<SessionView> {
        let _guard = self.lock.lock().await;

        let mut session = self.load(id)?;
        let events = session.execute(&ReconciliationCommand::RecordCounts(RecordCounts {
            session_id: id,
            updates,
            expected_version: ExpectedVersion::from(expected_version),
            occurred_at: Utc::now(),
        }))?;
        self.stores.sessions.upsert(id, session.clone())?;

        info!(session = %id, version = session.version(), event = event_type(&events), "reconciliation counts saved");
        Ok(SessionView::full(&session))
    }

    /// Apply an uploaded count sheet.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn upload_csv(&self, id: ReconciliationId, bytes: &[u8]) -> ServiceResult<UploadReport> {
        let _guard = self.lock.lock().await;

        let mut session = self.load(id)?;
        let sheet = count_sheet::parse(bytes)?;
        let matched = session.match_count_rows(&sheet.rows);

        if !matched.updates.is_empty() {
            session.execute(&ReconciliationCommand::RecordCounts(RecordCounts {
                session_id: id,
                updates: matched.updates.clone(),
                expected_version: ExpectedVersion::Any,
                occurred_at: Utc::now(),
            }))?;
            self.stores.sessions.upsert(id, session)?;
        } else if session.status() != ReconciliationStatus::Draft {
            return Err(DomainError::conflict(format!("reconciliation {id} is not a draft")).into());
        }

        let report = UploadReport::new(sheet, &matched, self.low_match_threshold);
        info!(
            session = %id,
            total_rows = report.total_rows,
            matched = report.matched,
            not_found = report.not_found.len(),
            errors = report.errors.len(),
            "count sheet applied"
        );
        Ok(report)
    }

    /// Blank count sheet listing every session item.
    pub fn template(&self, id: ReconciliationId) -> ServiceResult<String> {
        let session = self.load(id)?;
        Ok(count_sheet::render_template(
            session.items().iter().map(|i| i.sku_code.as_str()),
        ))
    }

    /// Post one adjustment per non-zero variance, then mark the session submitted.
    #[instrument(skip(self))]
    pub async fn submit(&self, id: ReconciliationId, actor: Option<String>) -> ServiceResult<SubmitOutcome> {
        let _guard = self.lock.lock().await;

        let mut session = self.load(id)?;
        let now = Utc::now();
        let events = session.execute(&ReconciliationCommand::SubmitSession(SubmitSession {
            session_id: id,
            occurred_at: now,
        }))?;

        let adjustments = events
            .iter()
            .find_map(|e| match e {
                ReconciliationEvent::SessionSubmitted(s) => Some(s.adjustments.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let txns = adjustments
            .iter()
            .map(|a| a.to_transaction(id, actor.clone(), now))
            .collect::<Result<Vec<_>, _>>()?;

        // Ledger first: if the append fails the stored session is still a draft.
        self.stores.ledger.append_batch(txns).await?;
        self.stores.sessions.upsert(id, session)?;

        let codes: Vec<String> = adjustments.iter().map(|a| a.sku_code.clone()).collect();
        info!(session = %id, adjustments = adjustments.len(), "reconciliation submitted");
        self.notifier
            .publish("reconciliation.submitted", codes, Some(id.to_string()));

        Ok(SubmitOutcome {
            session_id: id,
            adjustments_created: adjustments.len(),
            adjustments,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: ReconciliationId) -> ServiceResult<()> {
        let _guard = self.lock.lock().await;

        let mut session = self.load(id)?;
        session.execute(&ReconciliationCommand::DeleteSession(DeleteSession {
            session_id: id,
            occurred_at: Utc::now(),
        }))?;
        self.stores.sessions.upsert(id, session)?;

        info!(session = %id, "reconciliation deleted");
        self.notifier.publish("reconciliation.deleted", Vec::new(), Some(id.to_string()));
        Ok(())
    }

    fn load(&self, id: ReconciliationId) -> ServiceResult<ReconciliationSession> {
        self.stores
            .sessions
            .get(&id)?
            .ok_or_else(|| ServiceError::not_found(format!("reconciliation {id}")))
    }

    fn open_draft(&self) -> ServiceResult<Option<ReconciliationSession>> {
        Ok(self
            .stores
            .sessions
            .list()?
            .into_iter()
            .filter(|s| s.is_draft())
            .max_by_key(|s| s.created_at()))
    }
}

fn event_type(events: &[ReconciliationEvent]) -> &'static str {
    events.first().map(Event::event_type).unwrap_or("none")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{SeedData, SeedSku, SeedStock};
    use crate::services::{InventoryServices, ServiceSettings};
    use stockroom_core::SkuId;
    use stockroom_inventory::AdjustmentReason;

    fn sku(code: &str) -> SeedSku {
        SeedSku {
            code: code.into(),
            barcode: None,
            product_name: "Kurta".into(),
            colour: "Indigo".into(),
            size: "M".into(),
            is_active: true,
        }
    }

    async fn services() -> InventoryServices {
        let services = InventoryServices::new(Stores::in_memory(), ServiceSettings::default());
        let seed = SeedData {
            skus: vec![sku("KUR-IND-A"), sku("KUR-IND-B")],
            opening_stock: vec![
                SeedStock { sku_code: "KUR-IND-A".into(), qty: 8 },
                SeedStock { sku_code: "KUR-IND-B".into(), qty: 5 },
            ],
            ..SeedData::default()
        };
        services.stores.load_seed(&seed).await.unwrap();
        services
    }

    fn sku_id(services: &InventoryServices, code: &str) -> SkuId {
        services.stores.catalog.by_code(code).unwrap().unwrap().id
    }

    fn count(sku_id: SkuId, qty: i64, reason: Option<AdjustmentReason>) -> ItemUpdate {
        ItemUpdate {
            sku_id,
            physical_qty: Some(qty),
            adjustment_reason: reason,
            notes: None,
        }
    }

    #[tokio::test]
    async fn start_snapshots_balances_and_reuses_the_draft() {
        let services = services().await;
        let recon = &services.reconciliation;

        let first = recon.start().await.unwrap();
        assert!(first.created);
        let items = first.session.items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].system_qty, 8);
        assert_eq!(items[1].system_qty, 5);

        let again = recon.start().await.unwrap();
        assert!(!again.created);
        assert_eq!(again.session.id, first.session.id);
        assert_eq!(recon.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_posts_one_correction_per_variance() {
        let services = services().await;
        let recon = &services.reconciliation;
        let (a, b) = (sku_id(&services, "KUR-IND-A"), sku_id(&services, "KUR-IND-B"));
        let id = recon.start().await.unwrap().session.id;

        recon
            .update(
                id,
                vec![
                    count(a, 6, Some(AdjustmentReason::Damaged)),
                    count(b, 7, Some(AdjustmentReason::Found)),
                ],
                Some(1),
            )
            .await
            .unwrap();

        let outcome = recon.submit(id, Some("auditor".into())).await.unwrap();
        assert_eq!(outcome.adjustments_created, 2);

        let ledger = &services.stores.ledger;
        assert_eq!(ledger.balance(a).await.unwrap().current(), 6);
        assert_eq!(ledger.balance(b).await.unwrap().current(), 7);

        let history = ledger.history(Some(a), 10).await.unwrap();
        assert_eq!(history[0].reference_id.as_deref(), Some(format!("reconciliation:{id}").as_str()));
        assert_eq!(history[0].created_by.as_deref(), Some("auditor"));

        let view = recon.get(id).unwrap();
        assert_eq!(view.status, ReconciliationStatus::Submitted);
        assert!(view.submitted_at.is_some());
    }

    #[tokio::test]
    async fn second_submit_conflicts_and_posts_nothing() {
        let services = services().await;
        let recon = &services.reconciliation;
        let a = sku_id(&services, "KUR-IND-A");
        let id = recon.start().await.unwrap().session.id;
        recon
            .update(id, vec![count(a, 7, Some(AdjustmentReason::Shrinkage))], None)
            .await
            .unwrap();

        recon.submit(id, None).await.unwrap();
        let err = recon.submit(id, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
        assert_eq!(services.stores.ledger.balance(a).await.unwrap().current(), 7);
    }

    #[tokio::test]
    async fn submit_without_reason_lists_the_codes() {
        let services = services().await;
        let recon = &services.reconciliation;
        let b = sku_id(&services, "KUR-IND-B");
        let id = recon.start().await.unwrap().session.id;
        recon.update(id, vec![count(b, 3, None)], None).await.unwrap();

        let err = recon.submit(id, None).await.unwrap_err();
        match err {
            ServiceError::Domain(DomainError::SelectionRequired(msg)) => assert!(msg.contains("KUR-IND-B")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(recon.get(id).unwrap().status == ReconciliationStatus::Draft);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let services = services().await;
        let recon = &services.reconciliation;
        let a = sku_id(&services, "KUR-IND-A");
        let id = recon.start().await.unwrap().session.id;

        recon.update(id, vec![count(a, 8, None)], Some(1)).await.unwrap();
        let err = recon.update(id, vec![count(a, 8, None)], Some(1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn upload_applies_counts_and_reports_unknown_codes() {
        let services = services().await;
        let recon = &services.reconciliation;
        let id = recon.start().await.unwrap().session.id;

        let csv = "SKU Code;Physical Qty\nkur-ind-a;8\nKUR-IND-B;4\nNOPE-1;2\n";
        let report = recon.upload_csv(id, csv.as_bytes()).await.unwrap();
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.matched, 2);
        assert_eq!(report.not_found, vec!["NOPE-1".to_string()]);

        let view = recon.get(id).unwrap();
        assert_eq!(view.summary.counted_items, 2);
        assert_eq!(view.summary.items_with_variance, 1);
    }

    #[tokio::test]
    async fn template_lists_every_item() {
        let services = services().await;
        let recon = &services.reconciliation;
        let id = recon.start().await.unwrap().session.id;

        let template = recon.template(id).unwrap();
        let lines: Vec<&str> = template.lines().collect();
        assert_eq!(lines[0], "SKU Code,Physical Qty");
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn deleted_sessions_leave_the_list() {
        let services = services().await;
        let recon = &services.reconciliation;
        let id = recon.start().await.unwrap().session.id;

        recon.delete(id).await.unwrap();
        assert!(recon.list().unwrap().is_empty());
        let err = recon.update(id, Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        let fresh = recon.start().await.unwrap();
        assert!(fresh.created);
    }
}
