//! Per-tenant pipeline: product ids → product attributes → product rows →
//! categories → dictionary values.
//!
//! Each stage hands its output to the next as a plain value. Failures are
//! caught at the unit they affect (page, chunk, record, commit), reported to
//! the event sink, counted in the [`TenantSummary`] and skipped.
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::paginator::{Page, Paginator, WalkEnd, WalkReport};
use super::summary::{RunSummary, Stage, StopReason, TenantSummary};
use crate::config::SyncConfig;
use crate::database_ops::{CatalogStore, CredentialSource, StoreSession, Table};
use crate::error::{SyncError, SyncResult};
use crate::events::EventSink;
use crate::marketplace::models::{Lenient, ProductRecord};
use crate::marketplace::{MarketplaceApi, MarketplaceConnector};
use crate::models::Credential;
use crate::normalization::{self, Skip};

/// What the product stage passes on to the category stage.
#[derive(Debug, Default)]
struct ProductStage {
    category_ids: BTreeSet<i64>,
    named_keys: Vec<String>,
}

pub struct SyncOrchestrator<S, K> {
    config: SyncConfig,
    store: S,
    connector: K,
    events: Arc<dyn EventSink>,
}

impl<S, K> SyncOrchestrator<S, K>
where
    S: CatalogStore,
    K: MarketplaceConnector,
{
    pub fn new(config: SyncConfig, store: S, connector: K, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            store,
            connector,
            events,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Syncs tenants one after another. A tenant that stops early never
    /// stops the ones after it.
    pub async fn run(&self, credentials: &[Credential]) -> RunSummary {
        let mut tenants = Vec::with_capacity(credentials.len());
        for credential in credentials {
            let summary = self.sync_tenant(credential).await;
            info!(
                tenant_id = summary.tenant_id,
                stopped_at = ?summary.stopped_at,
                reason = ?summary.reason,
                rows = ?summary.rows_written,
                "tenant finished"
            );
            tenants.push(summary);
        }
        let run = RunSummary::from_tenants(self.config.marketplace_id, tenants);
        info!(
            marketplace_id = run.marketplace_id,
            tenants = run.tenants_total,
            completed = run.tenants_completed,
            rows = ?run.rows_written,
            deleted = ?run.dedup_deleted,
            "sync run finished"
        );
        run
    }

    #[instrument(skip_all, fields(tenant_id = credential.tenant_id))]
    pub async fn sync_tenant(&self, credential: &Credential) -> TenantSummary {
        let tenant_id = credential.tenant_id;
        let mut summary = TenantSummary::new(tenant_id);

        let api = match self.connector.connect(credential) {
            Ok(api) => api,
            Err(e) => {
                self.events.error("connect", &e);
                return summary.stop(Stage::Connect, StopReason::ConnectFailed);
            }
        };

        let ids = self.collect_product_ids(&api, &mut summary).await;
        if ids.is_empty() {
            self.events.log("collect_product_ids", "product id list is empty", None);
            return summary.stop(Stage::ProductIds, StopReason::NoProductIds);
        }

        let products = self.fetch_products(&api, &ids, &mut summary).await;
        if products.is_empty() {
            self.events
                .log("collect_products_attributes", "no product attributes fetched", None);
            return summary.stop(Stage::ProductAttributes, StopReason::NoProducts);
        }

        let stage = self
            .persist_products(&api, tenant_id, &products, &mut summary)
            .await;
        drop(products);
        if stage.category_ids.is_empty() {
            self.events.log("category_ids", "no usable category ids", None);
            return summary.stop(Stage::ProductRows, StopReason::NoCategories);
        }

        let dictionaries = self
            .persist_categories(&api, tenant_id, &stage, &mut summary)
            .await;
        if dictionaries.is_empty() {
            self.events
                .log("dictionary_attributes", "no dictionary attributes to walk", None);
            return summary.stop(Stage::Categories, StopReason::NoDictionaries);
        }

        for (&cat_id, chids) in &dictionaries {
            for &chid in chids {
                self.walk_dictionary(&api, cat_id, chid, &mut summary).await;
            }
        }
        summary.stop(Stage::Dictionaries, StopReason::Completed)
    }

    async fn collect_product_ids(&self, api: &K::Api, summary: &mut TenantSummary) -> Vec<i64> {
        let limit = self.config.product_page_limit;
        let walk = Paginator::new(
            move |cursor: Option<String>| async move {
                api.list_products(cursor.as_deref().unwrap_or(""), limit).await
            },
            Some(String::new()),
            self.config.max_product_pages,
        )
        .collect()
        .await;

        summary.product_id_pages = walk.report.pages;
        summary.product_id_walk = Some(walk.report.end.label());
        self.report_walk("collect_product_ids", &walk.report, summary);

        let mut seen = HashSet::with_capacity(walk.items.len());
        let mut ids = walk.items;
        ids.retain(|id| seen.insert(*id));
        summary.product_ids = ids.len();
        debug!(ids = ids.len(), pages = walk.report.pages, "product ids collected");
        ids
    }

    async fn fetch_products(
        &self,
        api: &K::Api,
        ids: &[i64],
        summary: &mut TenantSummary,
    ) -> Vec<ProductRecord> {
        let mut products = Vec::with_capacity(ids.len());
        for (chunk_no, chunk) in ids.chunks(self.config.attribute_chunk_size.max(1)).enumerate() {
            let records = match api.product_attributes(chunk).await {
                Ok(records) => records,
                Err(e) => {
                    summary.failed_chunks += 1;
                    warn!(chunk = chunk_no, size = chunk.len(), error = %e, "attribute chunk failed");
                    self.events.error("collect_products_attributes", &e);
                    continue;
                }
            };
            for record in records {
                match record {
                    Lenient::Parsed(product) => products.push(product),
                    Lenient::Malformed(raw) => {
                        summary.products_malformed += 1;
                        self.events.log(
                            "collect_products_attributes",
                            "product record could not be decoded",
                            Some(&raw),
                        );
                    }
                }
            }
        }
        summary.products_fetched = products.len();
        products
    }

    async fn persist_products(
        &self,
        api: &K::Api,
        tenant_id: i64,
        products: &[ProductRecord],
        summary: &mut TenantSummary,
    ) -> ProductStage {
        let mut stage = ProductStage {
            named_keys: products
                .first()
                .map(ProductRecord::top_level_keys)
                .unwrap_or_default(),
            ..ProductStage::default()
        };

        let mut session = self.open_session("product_attributes", summary).await;
        for product in products {
            let description = match api.product_description(product.id).await {
                Ok(d) => d,
                Err(e) => {
                    summary.failed_requests += 1;
                    self.events.error("product_description", &e);
                    None
                }
            };

            let normalized =
                normalization::normalize_product(tenant_id, product, description.as_deref());
            self.report_skips("product_attributes", &normalized.skipped, summary);
            if let Some(session) = session.as_mut() {
                let res = session.insert_product_attributes(&normalized.rows).await;
                self.record_insert(res, Table::ProductAttributes, summary);
            }

            match product.category_id {
                Some(0) | None => {
                    summary.products_without_category += 1;
                    self.events.log(
                        "category_ids",
                        &format!("product {} has no category (category_id 0 or missing)", product.id),
                        None,
                    );
                }
                Some(cat_id) => {
                    stage.category_ids.insert(cat_id);
                }
            }
        }
        self.commit(session, "product_attributes.commit", summary).await;
        self.dedupe(Table::ProductAttributes, summary).await;
        stage
    }

    /// Category rows and category attributes; returns the dictionary
    /// attributes to walk, per category.
    async fn persist_categories(
        &self,
        api: &K::Api,
        tenant_id: i64,
        stage: &ProductStage,
        summary: &mut TenantSummary,
    ) -> BTreeMap<i64, Vec<i64>> {
        let mut session = self.open_session("categories", summary).await;

        for &cat_id in &stage.category_ids {
            let nodes = match api.category_tree(Some(cat_id)).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    summary.failed_requests += 1;
                    self.events.error("category_tree", &e);
                    continue;
                }
            };
            let Some(node) = nodes.into_iter().next() else {
                self.events
                    .log("category_tree", &format!("category {cat_id} returned no nodes"), None);
                continue;
            };
            match normalization::category_row(tenant_id, &node) {
                Ok(row) => {
                    summary.categories += 1;
                    if let Some(session) = session.as_mut() {
                        let res = session.insert_categories(std::slice::from_ref(&row)).await;
                        self.record_insert(res, Table::Category, summary);
                    }
                }
                Err(skip) => self.report_skips("category_tree", &[skip], summary),
            }
        }

        let mut dictionaries: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        let ids: Vec<i64> = stage.category_ids.iter().copied().collect();
        for chunk in ids.chunks(self.config.category_chunk_size.max(1)) {
            let entries = match api.category_attributes(chunk).await {
                Ok(entries) => entries,
                Err(e) => {
                    summary.failed_chunks += 1;
                    warn!(categories = ?chunk, error = %e, "category attribute chunk failed");
                    self.events.error("category_attributes", &e);
                    continue;
                }
            };
            for entry in &entries {
                let attrs = match normalization::category_attribute_rows(entry, &stage.named_keys) {
                    Ok(attrs) => attrs,
                    Err(skip) => {
                        self.report_skips("category_attributes", &[skip], summary);
                        continue;
                    }
                };
                self.report_skips("category_attributes", &attrs.skipped, summary);
                if let Some(session) = session.as_mut() {
                    let res = session.insert_category_attributes(&attrs.rows).await;
                    self.record_insert(res, Table::CategoryAttributes, summary);
                }
                if !attrs.dictionary_chids.is_empty() {
                    let chids = dictionaries.entry(attrs.cat_id).or_default();
                    for chid in attrs.dictionary_chids {
                        if !chids.contains(&chid) {
                            chids.push(chid);
                        }
                    }
                }
            }
        }

        self.commit(session, "categories.commit", summary).await;
        self.dedupe(Table::Category, summary).await;
        self.dedupe(Table::CategoryAttributes, summary).await;
        dictionaries
    }

    /// Walks one attribute's dictionary; every page is persisted, committed
    /// and deduped before the next one is requested.
    #[instrument(skip(self, api, summary))]
    async fn walk_dictionary(
        &self,
        api: &K::Api,
        cat_id: i64,
        chid: i64,
        summary: &mut TenantSummary,
    ) {
        summary.dictionary_walks += 1;
        let limit = self.config.dictionary_page_limit;
        let events = &self.events;
        let mut pager = Paginator::new(
            move |cursor: Option<i64>| async move {
                let page = api
                    .attribute_dictionary_values(cat_id, chid, cursor, limit)
                    .await?;
                let next_cursor = page.last_value_id();
                let has_more = match page.has_next {
                    Some(has_next) => has_next,
                    None => {
                        events.log(
                            "attribute_dictionary_values",
                            &format!("page for {cat_id}:{chid} has no has_next; stopping after it"),
                            Some(&page.raw),
                        );
                        false
                    }
                };
                Ok::<_, SyncError>(Page::new(page.values, next_cursor, has_more))
            },
            None,
            self.config.max_dictionary_pages,
        );

        while let Some(values) = pager.next_page().await {
            summary.dictionary_pages += 1;
            let (rows, skipped) = normalization::dictionary_value_rows(chid, &values);
            self.report_skips("attribute_dictionary_values", &skipped, summary);
            let mut session = self.open_session("attribute_dictionary_values", summary).await;
            if let Some(session) = session.as_mut() {
                let res = session.insert_dictionary_values(&rows).await;
                self.record_insert(res, Table::DictionaryValues, summary);
            }
            self.commit(session, "attribute_dictionary_values.commit", summary)
                .await;
            self.dedupe(Table::DictionaryValues, summary).await;
        }
        let report = pager.finish();
        self.report_walk("attribute_dictionary_values", &report, summary);
    }

    async fn open_session(&self, context: &str, summary: &mut TenantSummary) -> Option<S::Session> {
        match self.store.begin().await {
            Ok(session) => Some(session),
            Err(e) => {
                summary.failed_commits += 1;
                self.events.error(context, &e);
                None
            }
        }
    }

    async fn commit(&self, session: Option<S::Session>, context: &str, summary: &mut TenantSummary) {
        let Some(session) = session else { return };
        if let Err(e) = session.commit().await {
            summary.failed_commits += 1;
            self.events.error(context, &e);
        }
    }

    async fn dedupe(&self, table: Table, summary: &mut TenantSummary) {
        match self.store.dedupe(table).await {
            Ok(deleted) => {
                summary.dedup_deleted.add(table, deleted);
                debug!(%table, deleted, "dedupe");
            }
            Err(e) => self.events.error(&format!("{table}.dedupe"), &e),
        }
    }

    fn record_insert(&self, res: SyncResult<u64>, table: Table, summary: &mut TenantSummary) {
        match res {
            Ok(n) => summary.rows_written.add(table, n),
            Err(e) => {
                summary.failed_inserts += 1;
                self.events.error(&format!("{table}.insert"), &e);
            }
        }
    }

    fn report_skips(&self, context: &str, skipped: &[Skip], summary: &mut TenantSummary) {
        summary.value_skips += skipped.len();
        for skip in skipped {
            self.events.log(
                context,
                &format!("skipped {} of {}: {}", skip.field, skip.owner, skip.reason),
                None,
            );
        }
    }

    fn report_walk(&self, context: &str, report: &WalkReport, summary: &mut TenantSummary) {
        match &report.end {
            WalkEnd::Exhausted | WalkEnd::EmptyPage => {
                debug!(context, pages = report.pages, items = report.items, "walk complete");
            }
            WalkEnd::Failed(e) => {
                summary.truncated_walks += 1;
                summary.failed_requests += 1;
                self.events.error(context, e);
            }
            end => {
                summary.truncated_walks += 1;
                self.events.log(
                    context,
                    &format!("walk ended early ({}) after {} pages", end.label(), report.pages),
                    None,
                );
            }
        }
    }
}

impl<S, K> SyncOrchestrator<S, K>
where
    S: CatalogStore + CredentialSource,
    K: MarketplaceConnector,
{
    /// Loads credentials for the configured marketplace and syncs them.
    /// Failing to read credentials is the only error returned.
    pub async fn run_marketplace(&self, tenant: Option<i64>) -> SyncResult<RunSummary> {
        let mut credentials = self.store.credentials(self.config.marketplace_id).await?;
        if let Some(tenant_id) = tenant {
            credentials.retain(|c| c.tenant_id == tenant_id);
        }
        info!(
            marketplace_id = self.config.marketplace_id,
            tenants = credentials.len(),
            "starting sync"
        );
        Ok(self.run(&credentials).await)
    }
}
