//! Change notices for downstream cache invalidation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Broadcast after every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotice {
    /// e.g. `inventory.inward`, `reconciliation.submitted`.
    pub topic: String,
    pub sku_codes: Vec<String>,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeNotice>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.tx.subscribe()
    }

    /// Lossy: with no subscribers the notice is dropped.
    pub fn publish(
        &self,
        topic: &str,
        sku_codes: Vec<String>,
        reference: Option<String>,
    ) {
        let _ = self.tx.send(ChangeNotice {
            topic: topic.to_string(),
            sku_codes,
            reference,
            occurred_at: Utc::now(),
        });
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}
