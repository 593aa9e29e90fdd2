//! Service wiring: picks the ledger backend, loads fixtures and exposes the
//! change stream.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use stockroom_infra::{InventoryServices, ServiceSettings, Stores};

use crate::config::ApiConfig;

#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryServices,
    /// `in-memory` or `postgres`, reported by `/health`.
    pub backend: &'static str,
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let (stores, backend) = build_stores(config).await?;
    let settings = ServiceSettings {
        low_match_threshold: config.low_match_threshold,
        ..ServiceSettings::default()
    };
    let inventory = InventoryServices::new(stores, settings);

    if let Some(seed) = &config.seed {
        let summary = inventory.stores.load_seed(seed).await?;
        tracing::info!(
            skus = summary.skus,
            batches = summary.batches,
            returns = summary.returns,
            rto_lines = summary.rto_lines,
            repacking = summary.repacking,
            "seed data loaded"
        );
    }

    Ok(AppServices { inventory, backend })
}

#[cfg(feature = "postgres")]
async fn build_stores(config: &ApiConfig) -> anyhow::Result<(Stores, &'static str)> {
    use stockroom_infra::PostgresLedger;

    let Some(database_url) = &config.database_url else {
        return Ok((Stores::in_memory(), "in-memory"));
    };

    let pool = sqlx::PgPool::connect(database_url).await?;
    let ledger = PostgresLedger::new(pool);
    ledger.ensure_schema().await?;
    tracing::info!("using postgres ledger");
    Ok((Stores::with_ledger(Arc::new(ledger)), "postgres"))
}

#[cfg(not(feature = "postgres"))]
async fn build_stores(config: &ApiConfig) -> anyhow::Result<(Stores, &'static str)> {
    if config.database_url.is_some() {
        tracing::warn!("USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory");
    }
    Ok((Stores::in_memory(), "in-memory"))
}

/// Change notices as server-sent events; the event name is the notice topic.
pub fn change_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.inventory.notifier.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(notice) => {
            let data = serde_json::to_string(&notice).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(notice.topic.clone()).data(data)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
