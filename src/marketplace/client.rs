use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::models::{
    CategoryAttributesEntry, CategoryRecord, DescriptionResult, DictionaryPage,
    DictionaryValueRecord, Lenient, ProductListItem, ProductRecord,
};
use super::{MarketplaceApi, MarketplaceConnector};
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::Credential;
use crate::sync::paginator::Page;

const MAX_LOGGED_BODY: usize = 4096;

/// Cuts `s` to at most `max_len` bytes on a char boundary.
fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

fn transport(endpoint: &'static str, err: reqwest::Error) -> SyncError {
    SyncError::Transport {
        endpoint,
        message: err.to_string(),
    }
}

/// Envelope `result`; a missing or `null` one fails with the whole body.
fn result_of<'a>(endpoint: &'static str, body: &'a Value) -> SyncResult<&'a Value> {
    match body.get("result") {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(SyncError::shape(endpoint, "response has no `result`", Some(body.clone()))),
    }
}

/// Decodes `raw` (a part of `body`); failures carry the whole body.
fn decode<T: DeserializeOwned>(endpoint: &'static str, raw: &Value, body: &Value) -> SyncResult<T> {
    T::deserialize(raw).map_err(|e| SyncError::shape(endpoint, e.to_string(), Some(body.clone())))
}

/// Ozon Seller API client for one seller account.
///
/// Base: https://api-seller.ozon.ru
/// - POST /v2/product/list
/// - POST /v3/products/info/attributes
/// - POST /v1/product/info/description
/// - POST /v2/category/tree
/// - POST /v3/category/attribute
/// - POST /v2/category/attribute/values
#[derive(Clone)]
pub struct OzonClient {
    base_url: String,
    language: String,
    http: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl OzonClient {
    pub fn new(
        config: &ApiConfig,
        credential: &Credential,
        limiter: Arc<DefaultDirectRateLimiter>,
    ) -> SyncResult<Self> {
        let header = |name: &'static str, value: &str, sensitive: bool| {
            let mut v = HeaderValue::from_str(value.trim()).map_err(|e| SyncError::Transport {
                endpoint: "client",
                message: format!("invalid {name} header for tenant {}: {e}", credential.tenant_id),
            })?;
            v.set_sensitive(sensitive);
            Ok::<_, SyncError>(v)
        };
        let mut headers = HeaderMap::new();
        headers.insert("Client-Id", header("Client-Id", &credential.external_client_id, false)?);
        headers.insert("Api-Key", header("Api-Key", &credential.api_key, true)?);

        let http = Client::builder()
            .user_agent("catalog-sync/0.1")
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| transport("client", e))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            http,
            limiter,
        })
    }

    /// Sends one request and returns the parsed JSON body.
    async fn post(&self, endpoint: &'static str, path: &str, body: Value) -> SyncResult<Value> {
        self.limiter.until_ready().await;
        let url = format!("{}{}", self.base_url, path);
        debug!(endpoint, %url, "POST");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport(endpoint, e))?;
        if !status.is_success() {
            return Err(SyncError::Protocol {
                endpoint,
                status: status.as_u16(),
                body: truncate_for_log(text, MAX_LOGGED_BODY),
            });
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(v) => Ok(v),
            Err(e) => Err(SyncError::shape(
                endpoint,
                e.to_string(),
                Some(Value::String(truncate_for_log(text, MAX_LOGGED_BODY))),
            )),
        }
    }
}

#[async_trait]
impl MarketplaceApi for OzonClient {
    async fn list_products(&self, last_id: &str, limit: u32) -> SyncResult<Page<i64, String>> {
        const EP: &str = "product_list";
        let body = self
            .post(EP, "/v2/product/list", json!({"last_id": last_id, "limit": limit}))
            .await?;
        let result = result_of(EP, &body)?;
        let Some(raw_items) = result.get("items") else {
            return Err(SyncError::shape(EP, "result has no `items`", Some(body)));
        };
        let items: Vec<ProductListItem> = decode(EP, raw_items, &body)?;

        let mut ids = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            match item.product_id {
                Some(id) => ids.push(id),
                None => {
                    let err = SyncError::shape(
                        EP,
                        format!("items[{idx}] has no `product_id`"),
                        Some(body.clone()),
                    );
                    return Ok(Page::partial(ids, err));
                }
            }
        }

        let next_cursor = result
            .get("last_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let has_more = !ids.is_empty();
        Ok(Page::new(ids, next_cursor, has_more))
    }

    async fn product_attributes(&self, product_ids: &[i64]) -> SyncResult<Vec<Lenient<ProductRecord>>> {
        const EP: &str = "product_attributes";
        let req = json!({
            "filter": {"product_id": product_ids, "visibility": "ALL"},
            "last_id": "",
            "limit": product_ids.len().max(1),
        });
        let body = self.post(EP, "/v3/products/info/attributes", req).await?;
        decode(EP, result_of(EP, &body)?, &body)
    }

    async fn product_description(&self, product_id: i64) -> SyncResult<Option<String>> {
        const EP: &str = "product_description";
        let body = self
            .post(EP, "/v1/product/info/description", json!({"product_id": product_id}))
            .await?;
        let result: DescriptionResult = decode(EP, result_of(EP, &body)?, &body)?;
        Ok(result.description)
    }

    async fn category_tree(&self, category_id: Option<i64>) -> SyncResult<Vec<CategoryRecord>> {
        const EP: &str = "category_tree";
        let body = self
            .post(
                EP,
                "/v2/category/tree",
                json!({"category_id": category_id, "language": self.language}),
            )
            .await?;
        decode(EP, result_of(EP, &body)?, &body)
    }

    async fn category_attributes(&self, category_ids: &[i64]) -> SyncResult<Vec<CategoryAttributesEntry>> {
        const EP: &str = "category_attributes";
        let req = json!({
            "attribute_type": "ALL",
            "category_id": category_ids,
            "language": self.language,
        });
        let body = self.post(EP, "/v3/category/attribute", req).await?;
        decode(EP, result_of(EP, &body)?, &body)
    }

    async fn attribute_dictionary_values(
        &self,
        category_id: i64,
        attribute_id: i64,
        last_value_id: Option<i64>,
        limit: u32,
    ) -> SyncResult<DictionaryPage> {
        const EP: &str = "attribute_dictionary_values";
        let req = json!({
            "attribute_id": attribute_id,
            "category_id": category_id,
            "last_value_id": last_value_id,
            "language": self.language,
            "limit": limit,
        });
        let body = self.post(EP, "/v2/category/attribute/values", req).await?;
        let values: Vec<Lenient<DictionaryValueRecord>> = decode(EP, result_of(EP, &body)?, &body)?;
        Ok(DictionaryPage {
            values,
            has_next: body.get("has_next").and_then(Value::as_bool),
            raw: body,
        })
    }
}

/// Hands out one [`OzonClient`] per tenant, all sharing one rate limiter.
pub struct OzonConnector {
    config: ApiConfig,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl OzonConnector {
    pub fn new(config: ApiConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            config,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }
}

impl MarketplaceConnector for OzonConnector {
    type Api = OzonClient;

    fn connect(&self, credential: &Credential) -> SyncResult<OzonClient> {
        OzonClient::new(&self.config, credential, self.limiter.clone())
    }
}
