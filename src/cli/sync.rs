use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SyncConfig;
use crate::database_ops::PgStore;
use crate::events::{EventSink, NdjsonSink, TracingSink};
use crate::marketplace::OzonConnector;
use crate::sync::{RunSummary, SyncOrchestrator};

#[derive(Debug, Clone, Default)]
pub struct SyncCommandConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Overrides `MARKETPLACE_ID`.
    pub marketplace_id: Option<i64>,
    /// Sync only this tenant.
    pub tenant: Option<i64>,
}

/// Runs one sync and prints the run summary as JSON on stdout.
pub async fn run(cfg: SyncCommandConfig) -> Result<RunSummary> {
    let mut config = SyncConfig::from_env();
    if let Some(id) = cfg.marketplace_id {
        config.marketplace_id = id;
    }

    let events: Arc<dyn EventSink> = match &config.event_log_path {
        Some(path) => Arc::new(
            NdjsonSink::open(path)
                .with_context(|| format!("open event log {}", path.display()))?,
        ),
        None => Arc::new(TracingSink),
    };

    let db = super::connect_db(cfg.database_url, config.db_max_connections).await?;
    let store = PgStore::new(db, config.marketplace_id);
    let connector = OzonConnector::new(config.api.clone());
    let orchestrator = SyncOrchestrator::new(config, store, connector, events);

    let summary = orchestrator
        .run_marketplace(cfg.tenant)
        .await
        .context("load marketplace credentials")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}
