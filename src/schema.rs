//! Flattening of table schemas into simple field listings.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One field of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub sql_type: String,
}

/// Flatten `data_model.properties` of a schema response.
///
/// Union types are joined with `", "` and arrays are rendered as
/// `array<item type>`.
pub fn flatten_fields(schema: &Value) -> Result<Vec<SchemaField>> {
    let properties = schema
        .pointer("/data_model/properties")
        .and_then(Value::as_object)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            Error::Decode("no schema (data_model.properties) found in response".to_string())
        })?;

    Ok(properties
        .iter()
        .map(|(name, spec)| {
            let mut field_type = type_name(spec.get("type"));
            if field_type == "array" {
                if let Some(items) = spec.get("items") {
                    field_type = format!("array<{}>", type_name(items.get("type")));
                }
            }

            SchemaField {
                field: name.clone(),
                field_type,
                sql_type: spec
                    .get("sqlType")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect())
}

fn type_name(ty: Option<&Value>) -> String {
    match ty {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_fields() {
        let schema = json!({
            "data_model": {
                "properties": {
                    "chrom": {"type": "string", "sqlType": "varchar"},
                    "af": {"type": ["number", "null"], "sqlType": "double"},
                    "genes": {"type": "array", "items": {"type": ["string", "null"]}},
                    "pos": {"type": "integer"}
                }
            }
        });

        let fields = flatten_fields(&schema).unwrap();
        assert_eq!(
            fields,
            vec![
                SchemaField {
                    field: "chrom".into(),
                    field_type: "string".into(),
                    sql_type: "varchar".into(),
                },
                SchemaField {
                    field: "af".into(),
                    field_type: "number, null".into(),
                    sql_type: "double".into(),
                },
                SchemaField {
                    field: "genes".into(),
                    field_type: "array<string, null>".into(),
                    sql_type: String::new(),
                },
                SchemaField {
                    field: "pos".into(),
                    field_type: "integer".into(),
                    sql_type: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_properties() {
        assert!(matches!(flatten_fields(&json!({})), Err(Error::Decode(_))));
        assert!(matches!(
            flatten_fields(&json!({"data_model": {"properties": {}}})),
            Err(Error::Decode(_))
        ));
    }
}
