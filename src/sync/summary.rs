use serde::Serialize;

use crate::database_ops::Table;

/// Pipeline stages in the order they run for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connect,
    ProductIds,
    ProductAttributes,
    ProductRows,
    Categories,
    Dictionaries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    ConnectFailed,
    NoProductIds,
    NoProducts,
    NoCategories,
    NoDictionaries,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub product_attributes: u64,
    pub category: u64,
    pub category_attributes: u64,
    pub attribute_dictionary_value: u64,
}

impl TableCounts {
    pub fn add(&mut self, table: Table, n: u64) {
        match table {
            Table::ProductAttributes => self.product_attributes += n,
            Table::Category => self.category += n,
            Table::CategoryAttributes => self.category_attributes += n,
            Table::DictionaryValues => self.attribute_dictionary_value += n,
        }
    }

    pub fn get(&self, table: Table) -> u64 {
        match table {
            Table::ProductAttributes => self.product_attributes,
            Table::Category => self.category,
            Table::CategoryAttributes => self.category_attributes,
            Table::DictionaryValues => self.attribute_dictionary_value,
        }
    }

    fn merge(&mut self, other: &TableCounts) {
        for t in Table::ALL {
            self.add(t, other.get(t));
        }
    }
}

/// What happened to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantSummary {
    pub tenant_id: i64,
    pub product_ids: usize,
    pub product_id_pages: usize,
    /// How the product id walk ended (`exhausted`, `page_cap`, ...).
    pub product_id_walk: Option<&'static str>,
    pub products_fetched: usize,
    pub products_malformed: usize,
    pub products_without_category: usize,
    pub value_skips: usize,
    pub failed_chunks: usize,
    pub failed_requests: usize,
    pub categories: usize,
    pub dictionary_walks: usize,
    pub dictionary_pages: usize,
    pub truncated_walks: usize,
    pub failed_inserts: usize,
    /// Sessions that could not be opened or committed.
    pub failed_commits: usize,
    pub rows_written: TableCounts,
    pub dedup_deleted: TableCounts,
    pub stopped_at: Stage,
    pub reason: StopReason,
}

impl TenantSummary {
    pub fn new(tenant_id: i64) -> Self {
        Self {
            tenant_id,
            product_ids: 0,
            product_id_pages: 0,
            product_id_walk: None,
            products_fetched: 0,
            products_malformed: 0,
            products_without_category: 0,
            value_skips: 0,
            failed_chunks: 0,
            failed_requests: 0,
            categories: 0,
            dictionary_walks: 0,
            dictionary_pages: 0,
            truncated_walks: 0,
            failed_inserts: 0,
            failed_commits: 0,
            rows_written: TableCounts::default(),
            dedup_deleted: TableCounts::default(),
            stopped_at: Stage::Connect,
            reason: StopReason::Completed,
        }
    }

    pub(crate) fn stop(mut self, stage: Stage, reason: StopReason) -> Self {
        self.stopped_at = stage;
        self.reason = reason;
        self
    }

    pub fn completed(&self) -> bool {
        self.reason == StopReason::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub marketplace_id: i64,
    pub tenants_total: usize,
    pub tenants_completed: usize,
    pub rows_written: TableCounts,
    pub dedup_deleted: TableCounts,
    pub tenants: Vec<TenantSummary>,
}

impl RunSummary {
    pub fn from_tenants(marketplace_id: i64, tenants: Vec<TenantSummary>) -> Self {
        let mut rows_written = TableCounts::default();
        let mut dedup_deleted = TableCounts::default();
        for t in &tenants {
            rows_written.merge(&t.rows_written);
            dedup_deleted.merge(&t.dedup_deleted);
        }
        Self {
            marketplace_id,
            tenants_total: tenants.len(),
            tenants_completed: tenants.iter().filter(|t| t.completed()).count(),
            rows_written,
            dedup_deleted,
            tenants,
        }
    }
}
