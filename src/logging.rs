use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use crate::util::env as env_util;

/// Target the [`TracingSink`](crate::events::TracingSink) writes skipped units to.
pub const EVENT_LOG_TARGET: &str = "event_log";

/// Filter directives for a run: `RUST_LOG` when set, `default` otherwise.
///
/// Skipped units are the record of what a sync left out, so `event_log`
/// stays at `warn` unless the directives already name that target.
pub fn filter_directives(rust_log: Option<&str>, default: &str) -> String {
    let base = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .trim_end_matches(',');
    if base.contains(EVENT_LOG_TARGET) {
        base.to_string()
    } else if base.is_empty() {
        format!("{EVENT_LOG_TARGET}=warn")
    } else {
        format!("{base},{EVENT_LOG_TARGET}=warn")
    }
}

/// Installs the global fmt subscriber for the sync binary.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let directives = filter_directives(env_util::env_opt("RUST_LOG").as_deref(), default_filter);
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter {directives:?}: {e}"))?;

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}
