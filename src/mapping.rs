//! Field naming and engine-native mapping documents.
//!
//! A values index holds one searchable document per entity, with one field
//! per indexed variable; a variables index holds one document per variable
//! describing its metadata. Both mappings are built here as plain JSON.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value as Json, json};

use crate::table::{TableRef, ValueTable, ValueType, Variable};

/// Separator between table reference, variable name and type name in a field
/// name.
pub const FIELD_SEP: char = '-';

/// Document type of value-set documents in a values index.
pub const VALUES_DOC_TYPE: &str = "ValueSet";

/// Name of the values index under the given search-index root.
pub fn values_index_name(root: &str) -> String {
    format!("{root}-values")
}

/// Deterministic field name for a variable of a table.
///
/// `tableRef SEP name SEP typeName`, with spaces replaced by `+` and periods
/// by `_` in the table/variable portion. The type-name suffix keeps names
/// collision-free across variables sharing a name with different types.
pub fn field_name(table_ref: &TableRef, variable: &Variable) -> String {
    field_name_for(&table_ref.to_string(), &variable.name, variable.value_type)
}

pub fn field_name_for(
    table_ref: &str,
    variable_name: &str,
    value_type: ValueType,
) -> String {
    format!(
        "{}{}{}",
        field_prefix(table_ref, variable_name),
        FIELD_SEP,
        value_type.name()
    )
}

fn field_prefix(table_ref: &str, variable_name: &str) -> String {
    format!("{table_ref}{FIELD_SEP}{variable_name}")
        .replace(' ', "+")
        .replace('.', "_")
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn not_analyzed_string() -> Json {
    json!({"type": "string", "index": "not_analyzed"})
}

fn plain_string() -> Json {
    json!({"type": "string"})
}

/// Dual-field text mapping: an `analyzed` sub-field for free-text search and
/// a not-analyzed sub-field (named after the field) for exact match and
/// faceting over the same data.
fn analyzed_string(field: &str) -> Json {
    json!({
        "type": "multi_field",
        "fields": {
            "analyzed": {
                "type": "string",
                "index": "analyzed",
                "analyzer": "value_index_analyzer",
                "search_analyzer": "value_search_analyzer"
            },
            field: {"type": "string", "index": "not_analyzed"}
        }
    })
}

/// Per-type field mapping for an indexed variable.
fn variable_field(value_type: ValueType, field: &str) -> Json {
    match value_type {
        ValueType::Integer => json!({"type": "long"}),
        ValueType::Decimal => json!({"type": "double"}),
        ValueType::Boolean => json!({"type": "boolean"}),
        ValueType::Date | ValueType::DateTime => json!({"type": "date"}),
        _ => analyzed_string(field),
    }
}

/// Full mapping for a table's values index.
///
/// Disables `_all`, declares the parent relation to the entity type, the
/// fixed entity fields, then one field per indexed variable.
pub fn values_mapping(table: &ValueTable) -> Json {
    let mut properties = Map::new();
    properties.insert("identifier".into(), analyzed_string("identifier"));
    for field in ["project", "datasource", "table", "reference"] {
        properties.insert(field.into(), not_analyzed_string());
    }

    let reference = table.reference.to_string();
    for variable in table.index_variables() {
        let field =
            field_name_for(&reference, &variable.name, variable.value_type);
        let mapping = variable_field(variable.value_type, &field);
        properties.insert(field, mapping);
    }

    json!({
        VALUES_DOC_TYPE: {
            "_all": {"enabled": false},
            "_parent": {"type": table.entity_type},
            "properties": properties,
            "_meta": {"_updated": now_string()}
        }
    })
}

/// Incremental mapping update for a values index.
///
/// Adds fields for variables not yet present in the live mapping, never
/// removes or redefines existing fields, and stamps `_meta._updated`. Always
/// driven by the table's current variable set, never inferred from data.
pub fn update_values_mapping(table: &ValueTable, mapping: &mut Json) {
    let Json::Object(root) = mapping else {
        *mapping = values_mapping(table);
        return;
    };
    let doc = ensure_object(root, VALUES_DOC_TYPE);
    let properties = ensure_object(doc, "properties");

    let reference = table.reference.to_string();
    for variable in table.index_variables() {
        let field =
            field_name_for(&reference, &variable.name, variable.value_type);
        if !properties.contains_key(&field) {
            let mapping = variable_field(variable.value_type, &field);
            properties.insert(field, mapping);
        }
    }

    let meta = ensure_object(doc, "_meta");
    meta.insert("_updated".into(), Json::String(now_string()));
}

/// Minimal mapping refreshing only the updated timestamp.
pub fn timestamp_update(doc_type: &str) -> Json {
    json!({doc_type: {"_meta": {"_updated": now_string()}}})
}

/// Full mapping for a table's variables index.
///
/// Fixed metadata fields plus one field per distinct custom attribute key
/// across the table's variables. Attributes named exactly `label` are
/// skipped: the fixed `label`/`label-en` fields already cover them with a
/// different analyzer.
pub fn variables_mapping(doc_type: &str, table: &ValueTable) -> Json {
    let mut properties = Map::new();
    for field in ["project", "datasource", "table"] {
        properties.insert(field.into(), plain_string());
    }
    properties.insert("reference".into(), not_analyzed_string());
    for field in ["name", "label", "label-en"] {
        properties.insert(field.into(), analyzed_string(field));
    }
    for field in [
        "fullName",
        "entityType",
        "valueType",
        "occurrenceGroup",
        "unit",
        "mimeType",
        "referencedEntityType",
        "category",
    ] {
        properties.insert(field.into(), plain_string());
    }
    properties.insert("repeatable".into(), json!({"type": "boolean"}));

    for variable in &table.variables {
        for attribute in &variable.attributes {
            if attribute.name == "label" {
                continue;
            }
            let field = attribute.field_name();
            if !properties.contains_key(&field) {
                let mapping = analyzed_string(&field);
                properties.insert(field, mapping);
            }
        }
    }

    json!({
        doc_type: {
            "properties": properties,
            "_meta": {
                "_created": now_string(),
                "_reference": table.reference.to_string()
            }
        }
    })
}

fn ensure_object<'a>(
    map: &'a mut Map<String, Json>,
    key: &str,
) -> &'a mut Map<String, Json> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Json::Object(Map::new()));
    if !entry.is_object() {
        *entry = Json::Object(Map::new());
    }
    match entry {
        Json::Object(map) => map,
        _ => unreachable!(),
    }
}
