use anyhow::{Context, Result};
use tracing::info;

use crate::config::{SyncConfig, PREFLIGHT_KEYS};
use crate::util::env as env_util;

/// Logs the redacted configuration and fails when no database URL resolves.
pub fn run() -> Result<()> {
    env_util::preflight_check("catalog-sync", &[], &PREFLIGHT_KEYS)?;
    env_util::db_url().context("resolve database url")?;
    let config = SyncConfig::from_env();
    info!(
        marketplace_id = config.marketplace_id,
        api = %config.api.base_url,
        rps = config.api.requests_per_second,
        "preflight ok"
    );
    Ok(())
}
