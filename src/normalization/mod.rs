//! Raw records → flat rows.
pub mod attributes;
pub mod categories;

pub use attributes::{normalize_product, Normalized};
pub use categories::{category_attribute_rows, category_row, dictionary_value_rows};

/// A dropped entry: who owned it, which field, and why.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Skip {
    /// Product, category or attribute id the entry belonged to.
    pub owner: i64,
    pub field: String,
    pub reason: &'static str,
}

impl Skip {
    pub fn new(owner: i64, field: impl Into<String>, reason: &'static str) -> Self {
        Self {
            owner,
            field: field.into(),
            reason,
        }
    }
}
