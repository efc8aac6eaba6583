//! Run configuration, built once from the environment and passed down.
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::util::env as env_util;

pub const DEFAULT_API_URL: &str = "https://api-seller.ozon.ru";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub language: String,
    pub timeout: Duration,
    /// Client-side pacing shared by every tenant of a run.
    pub requests_per_second: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            language: "RU".to_string(),
            timeout: Duration::from_secs(30),
            requests_per_second: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub marketplace_id: i64,
    pub api: ApiConfig,
    pub product_page_limit: u32,
    /// Upper bound on ids per attributes request.
    pub attribute_chunk_size: usize,
    /// Upper bound on ids per category-attributes request.
    pub category_chunk_size: usize,
    pub dictionary_page_limit: u32,
    pub max_product_pages: usize,
    pub max_dictionary_pages: usize,
    pub db_max_connections: u32,
    pub event_log_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            marketplace_id: 1,
            api: ApiConfig::default(),
            product_page_limit: 1000,
            attribute_chunk_size: 50,
            category_chunk_size: 20,
            dictionary_page_limit: 5000,
            max_product_pages: 10_000,
            max_dictionary_pages: 10_000,
            db_max_connections: 2,
            event_log_path: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        env_util::init_env();
        Self::from_source(env_util::env_opt)
    }

    /// Builds the config from any key lookup. Unparseable values fall back to
    /// the default; sizes are clamped to at least 1.
    pub fn from_source<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(get: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            get(key)
                .and_then(|raw| raw.trim().parse::<T>().ok())
                .unwrap_or(default)
        }
        let get: &dyn Fn(&str) -> Option<String> = &get;
        let d = Self::default();

        let api = ApiConfig {
            base_url: get("OZON_API_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .unwrap_or(d.api.base_url),
            language: get("OZON_LANGUAGE").unwrap_or(d.api.language),
            timeout: Duration::from_secs(parse(get, "HTTP_TIMEOUT_SECS", 30u64).max(1)),
            requests_per_second: parse(get, "OZON_RPS", d.api.requests_per_second).max(1),
        };

        Self {
            marketplace_id: parse(get, "MARKETPLACE_ID", d.marketplace_id),
            api,
            product_page_limit: parse(get, "PRODUCT_PAGE_LIMIT", d.product_page_limit).max(1),
            attribute_chunk_size: parse(get, "ATTRIBUTE_CHUNK_SIZE", d.attribute_chunk_size).max(1),
            category_chunk_size: parse(get, "CATEGORY_CHUNK_SIZE", d.category_chunk_size).max(1),
            dictionary_page_limit: parse(get, "DICTIONARY_PAGE_LIMIT", d.dictionary_page_limit)
                .max(1),
            max_product_pages: parse(get, "MAX_PRODUCT_PAGES", d.max_product_pages).max(1),
            max_dictionary_pages: parse(get, "MAX_DICTIONARY_PAGES", d.max_dictionary_pages).max(1),
            db_max_connections: parse(get, "DB_MAX_CONNS", d.db_max_connections).max(1),
            event_log_path: get("EVENT_LOG_PATH").map(PathBuf::from),
        }
    }
}

/// Keys echoed (redacted) by `preflight`.
pub const PREFLIGHT_KEYS: [&str; 15] = [
    "DATABASE_URL",
    "DB_URL",
    "DB_MAX_CONNS",
    "MARKETPLACE_ID",
    "OZON_API_URL",
    "OZON_LANGUAGE",
    "HTTP_TIMEOUT_SECS",
    "OZON_RPS",
    "PRODUCT_PAGE_LIMIT",
    "ATTRIBUTE_CHUNK_SIZE",
    "CATEGORY_CHUNK_SIZE",
    "DICTIONARY_PAGE_LIMIT",
    "MAX_PRODUCT_PAGES",
    "MAX_DICTIONARY_PAGES",
    "EVENT_LOG_PATH",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_source_gives_defaults() {
        assert_eq!(SyncConfig::from_source(|_| None), SyncConfig::default());
    }

    #[test]
    fn overrides_and_clamps() {
        let cfg = SyncConfig::from_source(source(&[
            ("MARKETPLACE_ID", "3"),
            ("OZON_API_URL", "http://localhost:8080/"),
            ("ATTRIBUTE_CHUNK_SIZE", "0"),
            ("CATEGORY_CHUNK_SIZE", "5"),
            ("HTTP_TIMEOUT_SECS", "7"),
            ("OZON_RPS", "0"),
            ("EVENT_LOG_PATH", "/tmp/events.ndjson"),
        ]));
        assert_eq!(cfg.marketplace_id, 3);
        assert_eq!(cfg.api.base_url, "http://localhost:8080");
        assert_eq!(cfg.attribute_chunk_size, 1);
        assert_eq!(cfg.category_chunk_size, 5);
        assert_eq!(cfg.api.timeout, Duration::from_secs(7));
        assert_eq!(cfg.api.requests_per_second, 1);
        assert_eq!(cfg.event_log_path, Some(PathBuf::from("/tmp/events.ndjson")));
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let cfg = SyncConfig::from_source(source(&[("PRODUCT_PAGE_LIMIT", "lots")]));
        assert_eq!(cfg.product_page_limit, 1000);
    }
}
