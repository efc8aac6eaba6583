use crate::marketplace::models::{
    CategoryAttributesEntry, CategoryRecord, DictionaryValueRecord, Lenient,
};
use crate::models::{identity_key, CategoryAttributeRow, CategoryRow, DictionaryValueRow};

use super::Skip;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CategoryAttributes {
    pub cat_id: i64,
    pub rows: Vec<CategoryAttributeRow>,
    /// Declared attributes with `dictionary_id != 0`.
    pub dictionary_chids: Vec<i64>,
    pub skipped: Vec<Skip>,
}

pub fn category_row(tenant_id: i64, record: &CategoryRecord) -> Result<CategoryRow, Skip> {
    let owner = record.category_id.unwrap_or_default();
    let Some(cat_id) = record.category_id else {
        return Err(Skip::new(owner, "category_id", "category node has no category_id"));
    };
    let Some(name) = record.title.clone() else {
        return Err(Skip::new(owner, "title", "category node has no title"));
    };
    Ok(CategoryRow {
        cat_id,
        name,
        tenant_id,
    })
}

/// Declared attributes of one category followed by the synthesized rows for
/// `named` product keys the category schema does not declare.
pub fn category_attribute_rows(
    entry: &CategoryAttributesEntry,
    named: &[String],
) -> Result<CategoryAttributes, Skip> {
    let Some(cat_id) = entry.category_id else {
        return Err(Skip::new(0, "category_id", "attribute entry has no category_id"));
    };
    let mut out = CategoryAttributes {
        cat_id,
        ..CategoryAttributes::default()
    };

    for (idx, attr) in entry.attributes.iter().enumerate() {
        let Some(attr) = attr.parsed() else {
            out.skipped
                .push(Skip::new(cat_id, format!("attributes[{idx}]"), "attribute is not an object"));
            continue;
        };
        let (Some(id), Some(name)) = (attr.id, attr.name.clone()) else {
            out.skipped
                .push(Skip::new(cat_id, format!("attributes[{idx}]"), "attribute has no id or name"));
            continue;
        };
        let Some(dictionary_id) = attr.dictionary_id else {
            out.skipped
                .push(Skip::new(cat_id, format!("attributes[{id}]"), "attribute has no dictionary_id"));
            continue;
        };

        out.rows.push(CategoryAttributeRow {
            identity: identity_key([cat_id, id]),
            chid: id.to_string(),
            name,
            is_required: attr.is_required.unwrap_or(false),
            is_collection: attr.is_collection.unwrap_or(false),
            attr_type: attr.attr_type.clone().unwrap_or_default(),
            description: attr.description.clone().unwrap_or_default(),
            dictionary_id: Some(dictionary_id),
            group_name: attr.group_name.clone(),
            cat_id,
        });
        if dictionary_id != 0 {
            out.dictionary_chids.push(id);
        }
    }

    for key in named {
        out.rows.push(named_attribute_row(cat_id, key));
    }
    Ok(out)
}

/// Row for a top-level product key, with the fixed flags named attributes carry.
pub fn named_attribute_row(cat_id: i64, key: &str) -> CategoryAttributeRow {
    CategoryAttributeRow {
        identity: identity_key([cat_id.to_string(), key.to_string()]),
        chid: key.to_string(),
        name: key.to_string(),
        is_required: true,
        is_collection: false,
        attr_type: String::new(),
        description: key.to_string(),
        dictionary_id: None,
        group_name: None,
        cat_id,
    }
}

pub fn dictionary_value_rows(
    chid: i64,
    values: &[Lenient<DictionaryValueRecord>],
) -> (Vec<DictionaryValueRow>, Vec<Skip>) {
    let mut rows = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();
    for (idx, value) in values.iter().enumerate() {
        let Some(record) = value.parsed() else {
            skipped.push(Skip::new(chid, format!("values[{idx}]"), "value is not an object"));
            continue;
        };
        let (Some(id), Some(text)) = (record.id, record.value.clone()) else {
            skipped.push(Skip::new(chid, format!("values[{idx}]"), "value has no id or value"));
            continue;
        };
        rows.push(DictionaryValueRow {
            identity: identity_key([chid, id]),
            value: text,
            picture: record.picture.clone(),
            info: record.info.clone(),
            attr_param_id: id,
            chid: chid.to_string(),
        });
    }
    (rows, skipped)
}
