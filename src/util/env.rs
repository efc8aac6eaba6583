//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "on" | "yes")
}

/// Database URL: `DATABASE_URL`, then `DB_URL`, then one composed from the
/// Laravel-style `DB_*` variables.
pub fn db_url() -> anyhow::Result<String> {
    init_env();
    for k in ["DATABASE_URL", "DB_URL"] {
        if let Some(v) = env_opt(k) {
            return Ok(v);
        }
    }
    if let Some(dsn) = dsn_from_parts(
        env_opt("DB_HOST"),
        env_opt("DB_USERNAME"),
        env_opt("DB_PASSWORD"),
        env_opt("DB_DATABASE"),
        env_opt("DB_PORT"),
        env_opt("DB_SSLMODE"),
    ) {
        info!(target = "env", "using DSN composed from DB_* variables");
        return Ok(dsn);
    }
    Err(anyhow::anyhow!("no database URL env vars set"))
}

fn dsn_from_parts(
    host: Option<String>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    port: Option<String>,
    ssl_mode: Option<String>,
) -> Option<String> {
    let host = host?;
    let user = user?;
    let database = database.unwrap_or_else(|| "postgres".into());
    let port: u16 = port.and_then(|p| p.trim().parse().ok()).unwrap_or(5432);
    let ssl_mode = ssl_mode.unwrap_or_else(|| "prefer".into());

    // Url-encodes user and password, which may contain '@' or '?'.
    let mut out = url::Url::parse("postgresql://localhost").ok()?;
    out.set_username(&user).ok()?;
    if let Some(pass) = password {
        out.set_password(Some(&pass)).ok()?;
    }
    let host = host.trim().trim_matches(|c| c == '[' || c == ']');
    if host.contains(':') {
        out.set_host(Some(&format!("[{host}]"))).ok()?;
    } else {
        out.set_host(Some(host)).ok()?;
    }
    out.set_port(Some(port)).ok()?;
    out.set_path(&format!("/{database}"));
    if ssl_mode != "disable" {
        out.query_pairs_mut().append_pair("sslmode", &ssl_mode);
    }
    Some(out.to_string())
}

pub fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD")
        || k.contains("SECRET")
        || k.contains("KEY")
        || k.contains("TOKEN")
    {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // Postgres DSNs carry credentials whatever the key is called.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    if (k.contains("URL") || k.contains("DSN"))
        && (val_trim.starts_with("postgres://") || val_trim.starts_with("postgresql://"))
    {
        return "postgres://***".to_string();
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// Returns error if any required key is missing.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| env_opt(k).is_none())
        .collect();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!("missing required env: {missing:?}"));
    }
    Ok(())
}
