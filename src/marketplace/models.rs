//! Typed response records for the seller API.
//!
//! Every record is decoded once, here, at the boundary. Sub-fields the
//! normalizer treats as required are still `Option` so that a single broken
//! entry becomes a per-entry skip instead of failing the whole page.
use serde::Deserialize;
use serde_json::{Map, Value};

/// Either a decoded record or the raw JSON that failed to decode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Parsed(T),
    Malformed(Value),
}

impl<T> Lenient<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Lenient::Parsed(t) => Some(t),
            Lenient::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductListItem {
    pub product_id: Option<i64>,
    #[serde(default)]
    pub offer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileEntry {
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValueEntry {
    #[serde(default)]
    pub dictionary_value_id: Option<i64>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeGroup {
    pub attribute_id: Option<i64>,
    #[serde(default)]
    pub complex_id: Option<i64>,
    #[serde(default)]
    pub values: Vec<Lenient<ValueEntry>>,
}

/// One product from the attributes endpoint.
///
/// Known keys get typed fields; every other top-level key lands in `extra`
/// and is emitted verbatim by the normalizer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ProductRecord {
    pub id: i64,
    pub category_id: Option<i64>,
    pub attributes: Option<Vec<Lenient<AttributeGroup>>>,
    pub images: Option<Vec<Lenient<FileEntry>>>,
    pub images360: Option<Vec<Lenient<FileEntry>>>,
    pub pdf_list: Option<Vec<Lenient<FileEntry>>>,
    pub complex_attributes: Option<Vec<Lenient<FileEntry>>>,
    pub extra: Map<String, Value>,
    /// Every top-level key of the payload, `null` ones included, sorted.
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct ProductFields {
    id: i64,
    #[serde(default)]
    category_id: Option<i64>,
    #[serde(default)]
    attributes: Option<Vec<Lenient<AttributeGroup>>>,
    #[serde(default)]
    images: Option<Vec<Lenient<FileEntry>>>,
    #[serde(default)]
    images360: Option<Vec<Lenient<FileEntry>>>,
    #[serde(default)]
    pdf_list: Option<Vec<Lenient<FileEntry>>>,
    #[serde(default)]
    complex_attributes: Option<Vec<Lenient<FileEntry>>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for ProductRecord {
    type Error = serde_json::Error;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut keys: Vec<String> = raw.keys().cloned().collect();
        keys.sort();
        let f: ProductFields = serde_json::from_value(Value::Object(raw))?;
        Ok(Self {
            id: f.id,
            category_id: f.category_id,
            attributes: f.attributes,
            images: f.images,
            images360: f.images360,
            pdf_list: f.pdf_list,
            complex_attributes: f.complex_attributes,
            extra: f.extra,
            keys,
        })
    }
}

/// Keys collapsed into one `|`-joined row of file names.
pub const FILE_LIST_KEYS: [&str; 4] = ["images", "images360", "pdf_list", "complex_attributes"];

/// Top-level keys that never become rows or named attributes.
pub const CURSOR_KEYS: [&str; 2] = ["id", "last_id"];

impl ProductRecord {
    pub fn file_lists(&self) -> [(&'static str, Option<&[Lenient<FileEntry>]>); 4] {
        [
            (FILE_LIST_KEYS[0], self.images.as_deref()),
            (FILE_LIST_KEYS[1], self.images360.as_deref()),
            (FILE_LIST_KEYS[2], self.pdf_list.as_deref()),
            (FILE_LIST_KEYS[3], self.complex_attributes.as_deref()),
        ]
    }

    /// Keys present in the payload, whatever their value, except `id`,
    /// `attributes` and cursor fields. Sorted.
    pub fn top_level_keys(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter(|k| !CURSOR_KEYS.contains(&k.as_str()) && k.as_str() != "attributes")
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionResult {
    #[serde(default)]
    pub description: Option<String>,
}

/// Node of the category tree; only the fields the sync needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryRecord {
    pub category_id: Option<i64>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryAttributeRecord {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub attr_type: Option<String>,
    #[serde(default)]
    pub is_collection: Option<bool>,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default)]
    pub group_name: Option<String>,
    pub dictionary_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryAttributesEntry {
    pub category_id: Option<i64>,
    #[serde(default)]
    pub attributes: Vec<Lenient<CategoryAttributeRecord>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DictionaryValueRecord {
    pub id: Option<i64>,
    pub value: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// One page of dictionary values. `has_next` stays optional so the caller can
/// tell "last page" from "flag missing".
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryPage {
    pub values: Vec<Lenient<DictionaryValueRecord>>,
    pub has_next: Option<bool>,
    /// Response body the page was read from.
    pub raw: Value,
}

impl DictionaryPage {
    /// Cursor for the next request: the id of the last well-formed value.
    pub fn last_value_id(&self) -> Option<i64> {
        self.values
            .iter()
            .rev()
            .find_map(|v| v.parsed().and_then(|r| r.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_record_keeps_unknown_keys() {
        let raw = json!({
            "id": 5,
            "category_id": 17,
            "name": "Mug",
            "barcode": "4600",
            "images": [{"file_name": "a.jpg"}],
            "attributes": [],
            "last_id": "xyz"
        });
        let p: ProductRecord = serde_json::from_value(raw).expect("decode");
        assert_eq!(p.id, 5);
        assert_eq!(p.category_id, Some(17));
        assert_eq!(p.extra.get("name"), Some(&json!("Mug")));
        assert!(p.extra.contains_key("last_id"));
        assert_eq!(
            p.top_level_keys(),
            vec!["barcode", "category_id", "images", "name"]
        );
    }

    #[test]
    fn null_keys_still_count_as_present() {
        let raw = json!({"id": 5, "images": null, "category_id": null, "name": "Mug"});
        let p: ProductRecord = serde_json::from_value(raw).expect("decode");
        assert_eq!(p.images, None);
        assert_eq!(p.top_level_keys(), vec!["category_id", "images", "name"]);
    }

    #[test]
    fn non_object_product_is_malformed() {
        let raw = json!([{"id": 1}, "garbage", {"id": "not a number"}]);
        let items: Vec<Lenient<ProductRecord>> = serde_json::from_value(raw).expect("decode");
        assert!(items[0].parsed().is_some());
        assert!(matches!(items[1], Lenient::Malformed(_)));
        assert!(matches!(items[2], Lenient::Malformed(_)));
    }

    #[test]
    fn malformed_entries_do_not_fail_the_group() {
        let raw = json!({
            "attribute_id": 85,
            "complex_id": 0,
            "values": [{"value": "red", "dictionary_value_id": 1}, "garbage", {"dictionary_value_id": 2}]
        });
        let g: AttributeGroup = serde_json::from_value(raw).expect("decode");
        assert_eq!(g.values.len(), 3);
        assert!(g.values[0].parsed().is_some());
        assert!(matches!(g.values[1], Lenient::Malformed(_)));
        assert_eq!(g.values[2].parsed().and_then(|v| v.value.clone()), None);
    }

    #[test]
    fn product_without_id_is_malformed() {
        let raw = json!([{"id": 1}, {"name": "no id"}]);
        let items: Vec<Lenient<ProductRecord>> = serde_json::from_value(raw).expect("decode");
        assert!(items[0].parsed().is_some());
        assert!(matches!(items[1], Lenient::Malformed(_)));
    }

    #[test]
    fn dictionary_cursor_skips_malformed_tail() {
        let page = DictionaryPage {
            values: vec![
                Lenient::Parsed(DictionaryValueRecord {
                    id: Some(10),
                    value: Some("a".into()),
                    info: None,
                    picture: None,
                }),
                Lenient::Malformed(json!(1)),
            ],
            has_next: Some(true),
            raw: json!({}),
        };
        assert_eq!(page.last_value_id(), Some(10));
    }
}
