pub mod dedupe;
pub mod preflight;
pub mod sync;

use anyhow::Result;
use tracing::info;

use crate::database_ops::Db;
use crate::util::env as env_util;

/// Connects with the explicit URL when given, else the one resolved from env.
pub(crate) async fn connect_db(database_url: Option<String>, max_connections: u32) -> Result<Db> {
    let url = match database_url {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    info!(url = %env_util::redact_value("DATABASE_URL", &url), "connecting");
    Db::connect(&url, max_connections).await
}
