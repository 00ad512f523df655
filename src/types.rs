use crate::{Error, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Filter operations understood by the Explorer filter endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
    Like,
    Regex,
    Null,
    NotNull,
}

impl Operation {
    /// Number of values the operation carries on the wire.
    pub fn arity(&self) -> usize {
        match self {
            Operation::Null | Operation::NotNull => 0,
            Operation::Between => 2,
            _ => 1,
        }
    }
}

/// Declared wire type of a filter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
}

/// A typed filter value.
///
/// This is the closed set of value kinds the API accepts; conversions from
/// Rust primitives pick the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ScalarValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ScalarValue::Boolean(_) => ValueType::Boolean,
            ScalarValue::Integer(_) => ValueType::Integer,
            ScalarValue::Float(_) => ValueType::Float,
            ScalarValue::String(_) => ValueType::String,
        }
    }

    /// Whether this value can be sent with the given declared type.
    pub fn representable_as(&self, ty: ValueType) -> bool {
        match (self, ty) {
            (ScalarValue::Float(f), ValueType::Float) => f.is_finite(),
            (ScalarValue::Integer(_), ValueType::Integer | ValueType::Float) => true,
            (ScalarValue::Boolean(_), ValueType::Boolean) => true,
            (ScalarValue::String(_), ValueType::String) => true,
            _ => false,
        }
    }

    /// Interpret a command-line literal: integer, then float, then boolean,
    /// falling back to a string.
    pub fn infer(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return ScalarValue::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return ScalarValue::Float(f);
            }
        }
        match raw {
            "true" => ScalarValue::Boolean(true),
            "false" => ScalarValue::Boolean(false),
            _ => ScalarValue::String(raw.to_string()),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::String(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::String(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Integer(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Integer(v.into())
    }
}

impl From<u32> for ScalarValue {
    fn from(v: u32) -> Self {
        ScalarValue::Integer(v.into())
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

/// Value slot of a clause: one scalar, or a list (BETWEEN bounds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClauseValue {
    Single(ScalarValue),
    List(Vec<ScalarValue>),
}

impl ClauseValue {
    fn scalars(&self) -> &[ScalarValue] {
        match self {
            ClauseValue::Single(v) => std::slice::from_ref(v),
            ClauseValue::List(values) => values,
        }
    }
}

/// One predicate on a field, in the `{operation, value, type}` wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ClauseValue>,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
}

impl FilterClause {
    fn single(operation: Operation, value: ScalarValue) -> Self {
        Self {
            operation,
            value_type: value.value_type(),
            value: Some(ClauseValue::Single(value)),
        }
    }

    pub fn eq(value: impl Into<ScalarValue>) -> Self {
        Self::single(Operation::Eq, value.into())
    }

    pub fn lt(value: impl Into<ScalarValue>) -> Self {
        Self::single(Operation::Lt, value.into())
    }

    pub fn lte(value: impl Into<ScalarValue>) -> Self {
        Self::single(Operation::Lte, value.into())
    }

    pub fn gt(value: impl Into<ScalarValue>) -> Self {
        Self::single(Operation::Gt, value.into())
    }

    pub fn gte(value: impl Into<ScalarValue>) -> Self {
        Self::single(Operation::Gte, value.into())
    }

    /// Inclusive range. Mixed integer/float bounds are declared FLOAT.
    pub fn between(low: impl Into<ScalarValue>, high: impl Into<ScalarValue>) -> Self {
        let (low, high) = (low.into(), high.into());
        let value_type = match (low.value_type(), high.value_type()) {
            (a, b) if a == b => a,
            (ValueType::Integer, ValueType::Float) | (ValueType::Float, ValueType::Integer) => {
                ValueType::Float
            }
            (a, _) => a,
        };
        Self {
            operation: Operation::Between,
            value: Some(ClauseValue::List(vec![low, high])),
            value_type,
        }
    }

    pub fn like(pattern: impl Into<String>) -> Self {
        Self::single(Operation::Like, ScalarValue::String(pattern.into()))
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::single(Operation::Regex, ScalarValue::String(pattern.into()))
    }

    pub fn is_null() -> Self {
        Self {
            operation: Operation::Null,
            value: None,
            value_type: ValueType::String,
        }
    }

    pub fn not_null() -> Self {
        Self {
            operation: Operation::NotNull,
            value: None,
            value_type: ValueType::String,
        }
    }

    /// Override the declared type, e.g. to send an integer bound as FLOAT.
    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let op = self.operation;
        let values = self.value.as_ref().map(ClauseValue::scalars).unwrap_or(&[]);

        match (&self.value, op.arity()) {
            (None, 0) => return Ok(()),
            (Some(_), 0) => {
                return Err(Error::Validation(format!("{op:?} does not take a value")));
            }
            (None, _) => return Err(Error::Validation(format!("{op:?} requires a value"))),
            (Some(ClauseValue::List(_)), 1) => {
                return Err(Error::Validation(format!("{op:?} takes a single value")));
            }
            _ => {}
        }

        if values.len() != op.arity() {
            return Err(Error::Validation(format!(
                "{op:?} requires exactly {} bounds, got {}",
                op.arity(),
                values.len()
            )));
        }

        if matches!(op, Operation::Like | Operation::Regex) && self.value_type != ValueType::String
        {
            return Err(Error::Validation(format!("{op:?} requires a STRING pattern")));
        }

        for value in values {
            if !value.representable_as(self.value_type) {
                return Err(Error::Validation(format!(
                    "value {value:?} is not representable as {:?}",
                    self.value_type
                )));
            }
        }

        Ok(())
    }
}

/// Field name to clauses; clauses on one field are AND-ed by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, Vec<FilterClause>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Filters::push`].
    pub fn and(mut self, field: impl Into<String>, clause: FilterClause) -> Self {
        self.push(field, clause);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, clause: FilterClause) {
        self.0.entry(field.into()).or_default().push(clause);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[FilterClause]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FilterClause])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn validate(&self) -> Result<()> {
        for (field, clauses) in &self.0 {
            if field.trim().is_empty() {
                return Err(Error::Validation("filter field name is empty".to_string()));
            }
            for clause in clauses {
                clause
                    .validate()
                    .map_err(|e| Error::Validation(format!("filter on {field}: {}", inner(e))))?;
            }
        }
        Ok(())
    }
}

fn inner(err: Error) -> String {
    match err {
        Error::Validation(msg) => msg,
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

pub const DEFAULT_LIMIT: u32 = 100;

/// A logical table query. Never modified while it is being polled.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub collection: String,
    pub table: String,
    pub filters: Filters,
    pub limit: u32,
    pub offset: u64,
    pub order: Option<OrderBy>,
}

impl QuerySpec {
    pub fn new(collection: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            table: table.into(),
            filters: Filters::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            order: None,
        }
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn filter(mut self, field: impl Into<String>, clause: FilterClause) -> Self {
        self.filters.push(field, clause);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_identifiers(&self.collection, &self.table)?;
        if let Some(order) = &self.order {
            if order.field.trim().is_empty() {
                return Err(Error::Validation("order field is empty".to_string()));
            }
        }
        self.filters.validate()
    }

    /// Request body for the filter endpoint, carrying `token` if set.
    pub fn query_payload<'a>(&'a self, token: Option<&'a str>) -> QueryPayload<'a> {
        QueryPayload {
            table_name: &self.table,
            filters: &self.filters,
            pagination: Pagination {
                limit: self.limit,
                offset: self.offset,
            },
            order: self.order.as_ref(),
            next_page_token: token,
        }
    }

    /// Request body for the count endpoint, carrying `token` if set.
    pub fn count_payload<'a>(&'a self, token: Option<&'a str>) -> CountPayload<'a> {
        CountPayload {
            filters: &self.filters,
            next_page_token: token,
        }
    }
}

pub(crate) fn require_identifiers(collection: &str, table: &str) -> Result<()> {
    if collection.trim().is_empty() || table.trim().is_empty() {
        return Err(Error::Validation(
            "both collection and table are required".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
}

/// Wire body of `POST .../filter`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPayload<'a> {
    pub table_name: &'a str,
    pub filters: &'a Filters,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<&'a OrderBy>,
    #[serde(rename = "next_page_token", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<&'a str>,
}

/// Wire body of `POST .../filter/count`
#[derive(Debug, Serialize)]
pub struct CountPayload<'a> {
    pub filters: &'a Filters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<&'a str>,
}

/// A finished page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
    /// Anything else the terminal object carried, such as a `next_page_token`
    /// for the following page.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a count query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub count: u64,
}

/// Collection entry from `GET /api/collections`
///
/// Known fields are picked out only when they have the expected type; anything
/// else, including off-type known fields, stays in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Map<String, Value>")]
pub struct Collection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "slugName", skip_serializing_if = "Option::is_none")]
    pub slug_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for Collection {
    fn from(mut entry: Map<String, Value>) -> Self {
        Self {
            name: take_typed(&mut entry, "name"),
            slug_name: take_typed(&mut entry, "slugName"),
            description: take_typed(&mut entry, "description"),
            extra: entry,
        }
    }
}

/// Table entry from `GET /api/collections/{collection}/tables`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Map<String, Value>")]
pub struct Table {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified_table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for Table {
    fn from(mut entry: Map<String, Value>) -> Self {
        Self {
            name: take_typed(&mut entry, "name"),
            qualified_table_name: take_typed(&mut entry, "qualified_table_name"),
            display_name: take_typed(&mut entry, "display_name"),
            size: take_typed(&mut entry, "size"),
            extra: entry,
        }
    }
}

/// Move `key` out of `entry` if it deserializes as `T`, else leave it in place.
fn take_typed<T: DeserializeOwned>(entry: &mut Map<String, Value>, key: &str) -> Option<T> {
    let parsed = T::deserialize(entry.get(key)?).ok()?;
    entry.remove(key);
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_wire_names() {
        assert_eq!(serde_json::to_value(Operation::NotNull).unwrap(), "NOT_NULL");
        assert_eq!(serde_json::to_value(Operation::Gte).unwrap(), "GTE");
        assert_eq!(serde_json::to_value(ValueType::Boolean).unwrap(), "BOOLEAN");
    }

    #[test]
    fn test_clause_wire_format() {
        let clause = FilterClause::eq("chr1");
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"operation": "EQ", "value": "chr1", "type": "STRING"})
        );

        let clause = FilterClause::between(100, 500).with_type(ValueType::Float);
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"operation": "BETWEEN", "value": [100, 500], "type": "FLOAT"})
        );

        let clause = FilterClause::not_null();
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"operation": "NOT_NULL", "type": "STRING"})
        );
    }

    #[test]
    fn test_clause_deserialize_from_wire() {
        let clause: FilterClause =
            serde_json::from_value(json!({"operation": "LT", "value": 0.01, "type": "FLOAT"}))
                .unwrap();
        assert_eq!(clause, FilterClause::lt(0.01));
        assert!(clause.validate().is_ok());
    }

    #[test]
    fn test_between_requires_two_bounds() {
        let clause: FilterClause = serde_json::from_value(
            json!({"operation": "BETWEEN", "value": [1, 2, 3], "type": "INTEGER"}),
        )
        .unwrap();
        assert!(matches!(clause.validate(), Err(Error::Validation(_))));

        let clause: FilterClause =
            serde_json::from_value(json!({"operation": "BETWEEN", "value": 1, "type": "INTEGER"}))
                .unwrap();
        assert!(clause.validate().is_err());

        assert!(FilterClause::between(1, 2).validate().is_ok());
    }

    #[test]
    fn test_mixed_between_is_float() {
        let clause = FilterClause::between(1, 2.5);
        assert_eq!(clause.value_type, ValueType::Float);
        assert!(clause.validate().is_ok());
    }

    #[test]
    fn test_value_type_representability() {
        assert!(FilterClause::eq(5).with_type(ValueType::Float).validate().is_ok());
        assert!(FilterClause::eq(5.5).with_type(ValueType::Integer).validate().is_err());
        assert!(FilterClause::eq("x").with_type(ValueType::Integer).validate().is_err());
        assert!(FilterClause::eq(true).validate().is_ok());
        assert!(FilterClause::eq(f64::NAN).validate().is_err());
        assert!(FilterClause::like("%missense%").validate().is_ok());
        assert!(FilterClause::eq(3).with_type(ValueType::String).validate().is_err());
    }

    #[test]
    fn test_null_ops_take_no_value() {
        assert!(FilterClause::is_null().validate().is_ok());
        let clause = FilterClause {
            operation: Operation::Null,
            value: Some(ClauseValue::Single(ScalarValue::Integer(1))),
            value_type: ValueType::Integer,
        };
        assert!(clause.validate().is_err());

        let clause = FilterClause {
            operation: Operation::Eq,
            value: None,
            value_type: ValueType::String,
        };
        assert!(clause.validate().is_err());
    }

    #[test]
    fn test_like_requires_string() {
        let clause = FilterClause {
            operation: Operation::Like,
            value: Some(ClauseValue::Single(ScalarValue::Integer(1))),
            value_type: ValueType::Integer,
        };
        assert!(clause.validate().is_err());
    }

    #[test]
    fn test_scalar_infer() {
        assert_eq!(ScalarValue::infer("12345"), ScalarValue::Integer(12345));
        assert_eq!(ScalarValue::infer("0.01"), ScalarValue::Float(0.01));
        assert_eq!(ScalarValue::infer("true"), ScalarValue::Boolean(true));
        assert_eq!(ScalarValue::infer("chr1"), ScalarValue::String("chr1".to_string()));
        assert_eq!(ScalarValue::infer("nan"), ScalarValue::String("nan".to_string()));
    }

    #[test]
    fn test_query_payload_shape() {
        let spec = QuerySpec::new("gnomad", "collections.gnomad.variants")
            .filter("pos", FilterClause::gte(43_000_000))
            .filter("pos", FilterClause::lte(43_200_000))
            .limit(20)
            .order_by("pos", Direction::Asc);

        let payload = serde_json::to_value(spec.query_payload(None)).unwrap();
        assert_eq!(
            payload,
            json!({
                "tableName": "collections.gnomad.variants",
                "filters": {
                    "pos": [
                        {"operation": "GTE", "value": 43000000, "type": "INTEGER"},
                        {"operation": "LTE", "value": 43200000, "type": "INTEGER"}
                    ]
                },
                "pagination": {"limit": 20, "offset": 0},
                "order": {"field": "pos", "direction": "ASC"}
            })
        );

        let payload = serde_json::to_value(spec.query_payload(Some("abc"))).unwrap();
        assert_eq!(payload["next_page_token"], "abc");
    }

    #[test]
    fn test_count_payload_shape() {
        let spec = QuerySpec::new("c", "t").filter("chrom", FilterClause::eq("chrM"));
        let payload = serde_json::to_value(spec.count_payload(None)).unwrap();
        assert_eq!(
            payload,
            json!({"filters": {"chrom": [{"operation": "EQ", "value": "chrM", "type": "STRING"}]}})
        );
    }

    #[test]
    fn test_spec_validation() {
        assert!(QuerySpec::new("", "t").validate().is_err());
        assert!(QuerySpec::new("c", "  ").validate().is_err());
        assert!(QuerySpec::new("c", "t").validate().is_ok());

        let spec = QuerySpec::new("c", "t").filter("qual", FilterClause::eq("x").with_type(ValueType::Float));
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("qual"));
    }

    #[test]
    fn test_listing_entries_keep_extra_fields() {
        let collection: Collection = serde_json::from_value(json!({
            "name": "gnomAD",
            "slugName": "gnomad",
            "description": "variants",
            "id": "42"
        }))
        .unwrap();
        assert_eq!(collection.slug_name.as_deref(), Some("gnomad"));
        assert_eq!(collection.extra["id"], "42");

        let table: Table = serde_json::from_value(json!({
            "qualified_table_name": "collections.gnomad.variants",
            "display_name": "Variants",
            "size": 1000
        }))
        .unwrap();
        assert_eq!(table.size, Some(1000));
        assert!(table.name.is_none());
    }

    #[test]
    fn test_listing_entries_tolerate_odd_fields() {
        let tables: Vec<Table> = serde_json::from_value(json!([
            {"name": "variants", "size": null},
            {"name": 7, "size": -1, "display_name": "Odd"},
            {"size": "12"}
        ]))
        .unwrap();

        assert_eq!(tables[0].name.as_deref(), Some("variants"));
        assert!(tables[0].size.is_none());

        assert!(tables[1].name.is_none());
        assert!(tables[1].size.is_none());
        assert_eq!(tables[1].display_name.as_deref(), Some("Odd"));
        assert_eq!(tables[1].extra["name"], 7);
        assert_eq!(tables[1].extra["size"], -1);

        assert_eq!(tables[2].extra["size"], "12");
        assert_eq!(
            serde_json::to_value(&tables[1]).unwrap(),
            json!({"display_name": "Odd", "name": 7, "size": -1})
        );

        let collection: Collection =
            serde_json::from_value(json!({"name": ["x"], "slugName": "s"})).unwrap();
        assert!(collection.name.is_none());
        assert_eq!(collection.slug_name.as_deref(), Some("s"));
        assert_eq!(collection.extra["name"], json!(["x"]));
    }
}
