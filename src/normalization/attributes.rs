use serde_json::Value;

use crate::marketplace::models::{Lenient, ProductRecord, CURSOR_KEYS};
use crate::models::{identity_key, ProductAttributeRow};

use super::Skip;

/// Joins file names of list-valued keys. Not expected inside file names.
pub const VALUE_SEPARATOR: &str = "|";

pub const DESCRIPTION_ATTRIBUTE: &str = "description";

/// Rows produced for one product plus everything that was dropped on the way.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Normalized {
    pub rows: Vec<ProductAttributeRow>,
    pub skipped: Vec<Skip>,
}

/// Flattens one product into `product_attributes` rows.
///
/// Rule order: description, file lists, `attributes` groups, then every
/// other top-level key with its raw value. `description` comes from a
/// separate endpoint and is passed in by the caller.
pub fn normalize_product(
    tenant_id: i64,
    product: &ProductRecord,
    description: Option<&str>,
) -> Normalized {
    let mut out = Normalized::default();
    let pid = product.id;

    if let Some(text) = description.filter(|d| !d.is_empty()) {
        out.rows.push(simple_row(tenant_id, pid, DESCRIPTION_ATTRIBUTE, text.to_string()));
    }

    for (key, entries) in product.file_lists() {
        let Some(entries) = entries else { continue };
        let mut names = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            match entry.parsed().and_then(|e| e.file_name.as_deref()) {
                Some(name) => names.push(name),
                None => out.skipped.push(Skip::new(
                    pid,
                    format!("{key}[{idx}]"),
                    "entry has no file_name",
                )),
            }
        }
        if !names.is_empty() {
            out.rows
                .push(simple_row(tenant_id, pid, key, names.join(VALUE_SEPARATOR)));
        }
    }

    for (gidx, group) in product.attributes.iter().flatten().enumerate() {
        let group = match group {
            Lenient::Parsed(g) => g,
            Lenient::Malformed(_) => {
                out.skipped.push(Skip::new(
                    pid,
                    format!("attributes[{gidx}]"),
                    "attribute group is not an object",
                ));
                continue;
            }
        };
        let Some(attribute_id) = group.attribute_id else {
            out.skipped.push(Skip::new(
                pid,
                format!("attributes[{gidx}]"),
                "attribute group has no attribute_id",
            ));
            continue;
        };
        let complex_id = group.complex_id.filter(|c| *c != 0);

        for (vidx, entry) in group.values.iter().enumerate() {
            let field = format!("attributes[{attribute_id}].values[{vidx}]");
            let Some(entry) = entry.parsed() else {
                out.skipped.push(Skip::new(pid, field, "value entry is not an object"));
                continue;
            };
            let Some(value) = entry.value.as_ref().and_then(render_value) else {
                out.skipped.push(Skip::new(pid, field, "value entry has no value"));
                continue;
            };

            let mut parts = vec![pid.to_string(), attribute_id.to_string()];
            if let Some(c) = complex_id {
                parts.push(format!("c{c}"));
            }
            parts.push(format!("v{vidx}"));
            out.rows.push(ProductAttributeRow {
                product_id: pid,
                attribute_id: attribute_id.to_string(),
                value,
                dictionary_value_id: entry.dictionary_value_id,
                complex_id: group.complex_id,
                tenant_id,
                identity: identity_key(parts),
            });
        }
    }

    if let Some(category_id) = product.category_id {
        out.rows
            .push(simple_row(tenant_id, pid, "category_id", category_id.to_string()));
    }
    for (key, raw) in &product.extra {
        if CURSOR_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = render_value(raw) {
            out.rows.push(simple_row(tenant_id, pid, key, value));
        }
    }

    out
}

/// Text form of a raw JSON value; strings verbatim, `null` yields nothing.
pub fn render_value(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn simple_row(tenant_id: i64, product_id: i64, key: &str, value: String) -> ProductAttributeRow {
    ProductAttributeRow {
        product_id,
        attribute_id: key.to_string(),
        value,
        dictionary_value_id: None,
        complex_id: None,
        tenant_id,
        identity: identity_key([product_id.to_string(), key.to_string()]),
    }
}
