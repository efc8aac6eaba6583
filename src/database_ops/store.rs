//! Storage contracts the orchestrator is written against.
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::models::{
    CategoryAttributeRow, CategoryRow, Credential, DictionaryValueRow, ProductAttributeRow,
};

/// The four tables the sync writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    ProductAttributes,
    Category,
    CategoryAttributes,
    DictionaryValues,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::ProductAttributes,
        Table::Category,
        Table::CategoryAttributes,
        Table::DictionaryValues,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::ProductAttributes => "product_attributes",
            Table::Category => "category",
            Table::CategoryAttributes => "category_attributes",
            Table::DictionaryValues => "attribute_dictionary_value",
        }
    }

    /// Columns that together identify one logical fact.
    pub fn identity_columns(self) -> &'static [&'static str] {
        match self {
            Table::Category => &["cat_id"],
            _ => &["identity_key"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Table::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Table::ALL.iter().map(|t| t.name()).collect();
                format!("unknown table `{s}` (expected one of: {})", names.join(", "))
            })
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self, marketplace_id: i64) -> SyncResult<Vec<Credential>>;
}

/// Insert-only store plus the dedup delete.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    type Session: StoreSession;

    async fn begin(&self) -> SyncResult<Self::Session>;

    /// Keeps only the newest row per identity group; returns rows deleted.
    async fn dedupe(&self, table: Table) -> SyncResult<u64>;
}

/// One unit of work. A failed insert leaves earlier inserts of the same
/// session intact; nothing is visible to others before `commit`.
#[async_trait]
pub trait StoreSession: Send {
    async fn insert_product_attributes(&mut self, rows: &[ProductAttributeRow]) -> SyncResult<u64>;

    async fn insert_categories(&mut self, rows: &[CategoryRow]) -> SyncResult<u64>;

    async fn insert_category_attributes(&mut self, rows: &[CategoryAttributeRow]) -> SyncResult<u64>;

    async fn insert_dictionary_values(&mut self, rows: &[DictionaryValueRow]) -> SyncResult<u64>;

    async fn commit(self) -> SyncResult<()>;
}
