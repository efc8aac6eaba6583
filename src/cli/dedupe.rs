use anyhow::Result;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::SyncConfig;
use crate::database_ops::{CatalogStore, PgStore, Table};

#[derive(Debug, Clone, Default)]
pub struct DedupeConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Only this table; every catalog table when unset.
    pub table: Option<Table>,
}

/// Runs the dedup pass outside a sync and prints deleted counts per table.
pub async fn run(cfg: DedupeConfig) -> Result<()> {
    let config = SyncConfig::from_env();
    let db = super::connect_db(cfg.database_url, config.db_max_connections).await?;
    let store = PgStore::new(db, config.marketplace_id);

    let tables: Vec<Table> = match cfg.table {
        Some(t) => vec![t],
        None => Table::ALL.to_vec(),
    };
    let mut out = Map::new();
    for table in tables {
        let deleted = store.dedupe(table).await?;
        info!(%table, deleted, "dedupe finished");
        out.insert(table.name().to_string(), Value::from(deleted));
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
    Ok(())
}
