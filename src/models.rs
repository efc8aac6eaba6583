use serde::Serialize;
use std::fmt;

/// One seller account. Read from the credential store, never written.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub tenant_id: i64,
    pub external_client_id: String,
    pub api_key: String,
}

// Keep api keys out of logs and panics.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("tenant_id", &self.tenant_id)
            .field("external_client_id", &self.external_client_id)
            .field("api_key", &"***")
            .finish()
    }
}

/// Flat attribute row for `product_attributes`.
///
/// `identity` is the dedup collision key, not a source-asserted primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductAttributeRow {
    pub product_id: i64,
    pub attribute_id: String,
    pub value: String,
    pub dictionary_value_id: Option<i64>,
    pub complex_id: Option<i64>,
    pub tenant_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub cat_id: i64,
    pub name: String,
    pub tenant_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAttributeRow {
    pub identity: String,
    pub chid: String,
    pub name: String,
    pub is_required: bool,
    pub is_collection: bool,
    pub attr_type: String,
    pub description: String,
    pub dictionary_id: Option<i64>,
    pub group_name: Option<String>,
    pub cat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryValueRow {
    pub identity: String,
    pub value: String,
    pub picture: Option<String>,
    pub info: Option<String>,
    pub attr_param_id: i64,
    pub chid: String,
}

/// Builds a dedup key from its parts.
pub fn identity_key<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: fmt::Display,
{
    let mut out = String::new();
    for (idx, part) in parts.into_iter().enumerate() {
        if idx > 0 {
            out.push(':');
        }
        out.push_str(&part.to_string());
    }
    out
}
