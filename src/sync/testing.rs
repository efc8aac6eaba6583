//! In-memory stand-ins for the marketplace, the store and the event sink.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::database_ops::{CatalogStore, CredentialSource, StoreSession, Table};
use crate::error::{SyncError, SyncResult};
use crate::events::EventSink;
use crate::marketplace::models::{
    CategoryAttributesEntry, CategoryRecord, DictionaryPage, Lenient, ProductRecord,
};
use crate::marketplace::{MarketplaceApi, MarketplaceConnector};
use crate::models::{
    CategoryAttributeRow, CategoryRow, Credential, DictionaryValueRow, ProductAttributeRow,
};
use crate::sync::paginator::Page;

fn reset(endpoint: &'static str) -> SyncError {
    SyncError::Transport {
        endpoint,
        message: "connection reset by peer".into(),
    }
}

fn internal(endpoint: &'static str) -> SyncError {
    SyncError::Protocol {
        endpoint,
        status: 500,
        body: r#"{"message":"internal"}"#.into(),
    }
}

/// One seller's catalog as the fake API serves it.
#[derive(Default)]
pub(crate) struct FakeCatalog {
    pub id_pages: Vec<Vec<i64>>,
    pub fail_list_at: Option<usize>,
    /// `(page, position)` of a listed item that comes back without `product_id`.
    pub item_without_id_at: Option<(usize, usize)>,
    pub products: BTreeMap<i64, Value>,
    pub failing_attribute_ids: HashSet<i64>,
    pub descriptions: HashMap<i64, String>,
    pub categories: HashMap<i64, String>,
    /// Raw `attributes` array per category id.
    pub category_attributes: HashMap<i64, Value>,
    /// Value pages per `(category_id, attribute_id)`.
    pub dictionaries: HashMap<(i64, i64), Vec<Vec<Value>>>,
    pub fail_dictionary_page: Option<(i64, i64, usize)>,
    pub failing_category_tree: HashSet<i64>,
    /// A chunk fails when it names any of these categories.
    pub failing_category_attributes: HashSet<i64>,
    pub failing_descriptions: HashSet<i64>,
    /// Dictionaries whose pages come back without `has_next`.
    pub dictionaries_without_has_next: HashSet<(i64, i64)>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with_products(products: Vec<Value>, page_size: usize) -> Self {
        let ids: Vec<i64> = products
            .iter()
            .map(|p| p["id"].as_i64().expect("fixture product has id"))
            .collect();
        Self {
            id_pages: ids.chunks(page_size).map(<[i64]>::to_vec).collect(),
            products: ids.iter().copied().zip(products).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) struct FakeApi {
    catalog: Arc<FakeCatalog>,
}

#[async_trait]
impl MarketplaceApi for FakeApi {
    async fn list_products(&self, last_id: &str, _limit: u32) -> SyncResult<Page<i64, String>> {
        let c = &self.catalog;
        c.record(format!("list_products:{last_id}"));
        let idx = if last_id.is_empty() {
            0
        } else {
            last_id.trim_start_matches('p').parse().unwrap_or(usize::MAX)
        };
        if c.fail_list_at == Some(idx) {
            return Err(reset("product_list"));
        }
        let mut items = c.id_pages.get(idx).cloned().unwrap_or_default();
        if let Some((page, pos)) = c.item_without_id_at {
            if page == idx && pos < items.len() {
                items.truncate(pos);
                let err = SyncError::shape(
                    "product_list",
                    format!("items[{pos}] has no `product_id`"),
                    Some(json!({"result": {"items": [{"offer_id": "broken"}]}})),
                );
                return Ok(Page::partial(items, err));
            }
        }
        let has_more = !items.is_empty();
        Ok(Page::new(items, Some(format!("p{}", idx + 1)), has_more))
    }

    async fn product_attributes(&self, product_ids: &[i64]) -> SyncResult<Vec<Lenient<ProductRecord>>> {
        let c = &self.catalog;
        c.record(format!("product_attributes:{product_ids:?}"));
        if product_ids.iter().any(|id| c.failing_attribute_ids.contains(id)) {
            return Err(internal("product_attributes"));
        }
        Ok(product_ids
            .iter()
            .filter_map(|id| c.products.get(id))
            .map(|raw| serde_json::from_value(raw.clone()).unwrap())
            .collect())
    }

    async fn product_description(&self, product_id: i64) -> SyncResult<Option<String>> {
        let c = &self.catalog;
        c.record(format!("product_description:{product_id}"));
        if c.failing_descriptions.contains(&product_id) {
            return Err(reset("product_description"));
        }
        Ok(c.descriptions.get(&product_id).cloned())
    }

    async fn category_tree(&self, category_id: Option<i64>) -> SyncResult<Vec<CategoryRecord>> {
        let c = &self.catalog;
        let id = category_id.unwrap_or_default();
        c.record(format!("category_tree:{id}"));
        if c.failing_category_tree.contains(&id) {
            return Err(internal("category_tree"));
        }
        Ok(c.categories
            .get(&id)
            .map(|title| CategoryRecord {
                category_id: Some(id),
                title: Some(title.clone()),
            })
            .into_iter()
            .collect())
    }

    async fn category_attributes(&self, category_ids: &[i64]) -> SyncResult<Vec<CategoryAttributesEntry>> {
        let c = &self.catalog;
        c.record(format!("category_attributes:{category_ids:?}"));
        if category_ids.iter().any(|id| c.failing_category_attributes.contains(id)) {
            return Err(internal("category_attributes"));
        }
        Ok(category_ids
            .iter()
            .filter_map(|id| {
                c.category_attributes.get(id).map(|attrs| {
                    serde_json::from_value(json!({"category_id": id, "attributes": attrs})).unwrap()
                })
            })
            .collect())
    }

    async fn attribute_dictionary_values(
        &self,
        category_id: i64,
        attribute_id: i64,
        last_value_id: Option<i64>,
        _limit: u32,
    ) -> SyncResult<DictionaryPage> {
        let c = &self.catalog;
        c.record(format!("dictionary:{category_id}:{attribute_id}:{last_value_id:?}"));
        let pages = c
            .dictionaries
            .get(&(category_id, attribute_id))
            .cloned()
            .unwrap_or_default();
        let idx = match last_value_id {
            None => 0,
            Some(last) => pages
                .iter()
                .position(|p| p.last().and_then(|v| v["id"].as_i64()) == Some(last))
                .map(|i| i + 1)
                .unwrap_or(pages.len()),
        };
        if c.fail_dictionary_page == Some((category_id, attribute_id, idx)) {
            return Err(reset("attribute_dictionary_values"));
        }
        let values = pages.get(idx).cloned().unwrap_or_default();
        let has_next = if c.dictionaries_without_has_next.contains(&(category_id, attribute_id)) {
            None
        } else {
            Some(idx + 1 < pages.len())
        };
        let raw = match has_next {
            Some(more) => json!({"result": values, "has_next": more}),
            None => json!({"result": values}),
        };
        Ok(DictionaryPage {
            values: values
                .into_iter()
                .map(|v| serde_json::from_value(v).unwrap())
                .collect(),
            has_next,
            raw,
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    pub catalogs: HashMap<i64, Arc<FakeCatalog>>,
    pub refuse: HashSet<i64>,
}

impl MarketplaceConnector for FakeConnector {
    type Api = FakeApi;

    fn connect(&self, credential: &Credential) -> SyncResult<FakeApi> {
        if self.refuse.contains(&credential.tenant_id) {
            return Err(SyncError::Transport {
                endpoint: "client",
                message: "invalid Api-Key header".into(),
            });
        }
        Ok(FakeApi {
            catalog: self
                .catalogs
                .get(&credential.tenant_id)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// Committed rows with their insertion-order ids.
#[derive(Default)]
pub(crate) struct MemoryDb {
    next_id: u64,
    pub credentials: Vec<Credential>,
    pub product_attributes: Vec<(u64, ProductAttributeRow)>,
    pub category: Vec<(u64, CategoryRow)>,
    pub category_attributes: Vec<(u64, CategoryAttributeRow)>,
    pub dictionary_values: Vec<(u64, DictionaryValueRow)>,
    pub dedupe_calls: Vec<Table>,
    pub commits: usize,
    /// Inserts touching these products fail.
    pub fail_product_inserts: HashSet<i64>,
}

impl MemoryDb {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn keep_latest<R>(rows: &mut Vec<(u64, R)>, key: impl Fn(&R) -> String) -> u64 {
    let mut latest: HashMap<String, u64> = HashMap::new();
    for (id, row) in rows.iter() {
        let entry = latest.entry(key(row)).or_insert(*id);
        *entry = (*entry).max(*id);
    }
    let before = rows.len();
    rows.retain(|(id, row)| latest.get(&key(row)) == Some(id));
    (before - rows.len()) as u64
}

#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    pub db: Arc<Mutex<MemoryDb>>,
}

impl MemoryStore {
    pub fn with<T>(&self, f: impl FnOnce(&MemoryDb) -> T) -> T {
        f(&self.db.lock().unwrap())
    }
}

#[async_trait]
impl CredentialSource for MemoryStore {
    async fn credentials(&self, _marketplace_id: i64) -> SyncResult<Vec<Credential>> {
        Ok(self.db.lock().unwrap().credentials.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> SyncResult<MemorySession> {
        Ok(MemorySession {
            db: self.db.clone(),
            product_attributes: Vec::new(),
            category: Vec::new(),
            category_attributes: Vec::new(),
            dictionary_values: Vec::new(),
        })
    }

    async fn dedupe(&self, table: Table) -> SyncResult<u64> {
        let mut db = self.db.lock().unwrap();
        db.dedupe_calls.push(table);
        Ok(match table {
            Table::ProductAttributes => keep_latest(&mut db.product_attributes, |r| r.identity.clone()),
            Table::Category => keep_latest(&mut db.category, |r| r.cat_id.to_string()),
            Table::CategoryAttributes => keep_latest(&mut db.category_attributes, |r| r.identity.clone()),
            Table::DictionaryValues => keep_latest(&mut db.dictionary_values, |r| r.identity.clone()),
        })
    }
}

pub(crate) struct MemorySession {
    db: Arc<Mutex<MemoryDb>>,
    product_attributes: Vec<ProductAttributeRow>,
    category: Vec<CategoryRow>,
    category_attributes: Vec<CategoryAttributeRow>,
    dictionary_values: Vec<DictionaryValueRow>,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn insert_product_attributes(&mut self, rows: &[ProductAttributeRow]) -> SyncResult<u64> {
        let failing = {
            let db = self.db.lock().unwrap();
            rows.iter().any(|r| db.fail_product_inserts.contains(&r.product_id))
        };
        if failing {
            return Err(sqlx::Error::Protocol("value too long for type".into()).into());
        }
        self.product_attributes.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn insert_categories(&mut self, rows: &[CategoryRow]) -> SyncResult<u64> {
        self.category.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn insert_category_attributes(&mut self, rows: &[CategoryAttributeRow]) -> SyncResult<u64> {
        self.category_attributes.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn insert_dictionary_values(&mut self, rows: &[DictionaryValueRow]) -> SyncResult<u64> {
        self.dictionary_values.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn commit(self) -> SyncResult<()> {
        let mut db = self.db.lock().unwrap();
        db.commits += 1;
        for row in self.product_attributes {
            let id = db.next();
            db.product_attributes.push((id, row));
        }
        for row in self.category {
            let id = db.next();
            db.category.push((id, row));
        }
        for row in self.category_attributes {
            let id = db.next();
            db.category_attributes.push((id, row));
        }
        for row in self.dictionary_values {
            let id = db.next();
            db.dictionary_values.push((id, row));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub events: Mutex<Vec<(String, String, Option<Value>)>>,
}

impl RecordingSink {
    pub fn messages(&self, context: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| c == context)
            .map(|(_, m, _)| m.clone())
            .collect()
    }

    pub fn payloads(&self, context: &str) -> Vec<Option<Value>> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| c == context)
            .map(|(_, _, p)| p.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn log(&self, context: &str, message: &str, payload: Option<&Value>) {
        self.events.lock().unwrap().push((
            context.to_string(),
            message.to_string(),
            payload.cloned(),
        ));
    }
}
