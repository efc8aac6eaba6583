//! Seller API surface used by the sync pipeline.
pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::models::Credential;
use crate::sync::paginator::Page;
use models::{CategoryAttributesEntry, CategoryRecord, DictionaryPage, Lenient, ProductRecord};

pub use client::{OzonClient, OzonConnector};

/// One tenant's view of the marketplace. Every call is a single request.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// One page of product ids; the cursor is the `last_id` of the previous page.
    async fn list_products(&self, last_id: &str, limit: u32) -> SyncResult<Page<i64, String>>;

    async fn product_attributes(&self, product_ids: &[i64]) -> SyncResult<Vec<Lenient<ProductRecord>>>;

    async fn product_description(&self, product_id: i64) -> SyncResult<Option<String>>;

    async fn category_tree(&self, category_id: Option<i64>) -> SyncResult<Vec<CategoryRecord>>;

    async fn category_attributes(&self, category_ids: &[i64]) -> SyncResult<Vec<CategoryAttributesEntry>>;

    async fn attribute_dictionary_values(
        &self,
        category_id: i64,
        attribute_id: i64,
        last_value_id: Option<i64>,
        limit: u32,
    ) -> SyncResult<DictionaryPage>;
}

/// Builds a per-tenant API handle from a credential.
pub trait MarketplaceConnector: Send + Sync {
    type Api: MarketplaceApi;

    fn connect(&self, credential: &Credential) -> SyncResult<Self::Api>;
}
