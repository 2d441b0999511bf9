//! # Tablesync - Domain Model
//!
//! Core types shared by the tablesync store layers: opaque JSON records,
//! the typed table query AST with its OData rendering, and the system-table
//! configuration. These types are the single source of truth across the
//! local store, the remote table service client, and the read-through
//! decorator that mediates between them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// RECORDS
// =============================================================================

/// An opaque structured document belonging to exactly one table.
///
/// No schema is enforced beyond the `id` field, which identifies the record
/// uniquely within its table. Everything else is carried verbatim between
/// the local store and the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record with a freshly generated time-sortable id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::now_v7().to_string())
    }

    /// Create an empty record with the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.into()));
        Self(fields)
    }

    /// Wrap a JSON value; fails unless the value is an object.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::NotAnObject(other)),
        }
    }

    /// The record id, if present.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Field accessor.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field, returning `self` for chained construction.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Consume into the underlying JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// =============================================================================
// QUERY / FILTER TYPES
// =============================================================================

/// Comparison operators supported by [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    #[must_use]
    pub const fn as_odata(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }
}

/// Typed filter expression over one table's records.
///
/// Built as an AST rather than parsed from a string, so the same expression
/// can be rendered into a remote OData `$filter` clause and evaluated
/// locally against in-store records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// `field <op> literal`
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// `field eq value` shorthand, the overwhelmingly common case.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Render into an OData boolean expression.
    #[must_use]
    pub fn to_odata(&self) -> String {
        match self {
            Self::Compare { field, op, value } => {
                format!("{field} {} {}", op.as_odata(), odata_literal(value))
            }
            Self::And(parts) => join_odata(parts, "and"),
            Self::Or(parts) => join_odata(parts, "or"),
            Self::Not(inner) => format!("not ({})", inner.to_odata()),
        }
    }

    /// Evaluate against a record.
    ///
    /// Numbers compare numerically, strings lexicographically. A missing
    /// field only satisfies `eq null` / `ne <non-null>`; ordered
    /// comparisons against a missing or type-mismatched field are false.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Compare { field, op, value } => {
                let actual = record.get(field).unwrap_or(&Value::Null);
                compare_values(actual, *op, value)
            }
            Self::And(parts) => parts.iter().all(|f| f.matches(record)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

fn join_odata(parts: &[Filter], op: &str) -> String {
    parts
        .iter()
        .map(|f| format!("({})", f.to_odata()))
        .collect::<Vec<_>>()
        .join(&format!(" {op} "))
}

fn odata_literal(value: &Value) -> String {
    match value {
        // single quotes inside string literals are escaped by doubling
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

fn compare_values(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    if matches!(op, CompareOp::Eq | CompareOp::Ne) {
        return json_eq(actual, expected) == (op == CompareOp::Eq);
    }
    let Some(ordering) = json_partial_cmp(actual, expected) else {
        return false;
    };
    match op {
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Eq | CompareOp::Ne => false,
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        // i64/u64/f64 representations of the same number are equal
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

fn json_partial_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

/// Sort direction for [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    #[default]
    Ascending,
    Descending,
}

/// A single `$orderby` term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub dir: SortDir,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Descending,
        }
    }
}

/// Declarative query over one table's records.
///
/// Executable locally by a [`Record`]-holding store and renderable into the
/// OData query string the remote table service consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub top: Option<usize>,
    pub skip: usize,
    pub select: Vec<String>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            order_by: Vec::new(),
            top: None,
            skip: 0,
            select: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    #[must_use]
    pub fn top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.select.push(field.into());
        self
    }

    /// Render the `$filter/$orderby/$skip/$top/$select` query string.
    ///
    /// Clauses appear in a fixed order and only when set, joined with `&`.
    /// The string is not URL-encoded; that is the transport's concern.
    #[must_use]
    pub fn to_odata(&self) -> String {
        let mut clauses = Vec::new();

        if let Some(filter) = &self.filter {
            clauses.push(format!("$filter={}", filter.to_odata()));
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|o| match o.dir {
                    SortDir::Ascending => o.field.clone(),
                    SortDir::Descending => format!("{} desc", o.field),
                })
                .collect();
            clauses.push(format!("$orderby={}", terms.join(",")));
        }
        if self.skip > 0 {
            clauses.push(format!("$skip={}", self.skip));
        }
        if let Some(top) = self.top {
            clauses.push(format!("$top={top}"));
        }
        if !self.select.is_empty() {
            clauses.push(format!("$select={}", self.select.join(",")));
        }

        clauses.join("&")
    }
}

// =============================================================================
// SYSTEM TABLES
// =============================================================================

/// Names of the sync subsystem's internal bookkeeping tables.
///
/// These tables are owned entirely by the local store and its offline queue;
/// operations on them must never be routed to the remote service. The names
/// are configuration of the surrounding sync subsystem, injected here rather
/// than hard-coded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTables {
    /// Pending offline operation queue.
    pub operation_queue: String,
    /// Log of failed sync attempts.
    pub sync_errors: String,
}

impl Default for SystemTables {
    fn default() -> Self {
        Self {
            operation_queue: "__operations".to_string(),
            sync_errors: "__errors".to_string(),
        }
    }
}

impl SystemTables {
    /// Exact-name-match test for system tables.
    #[must_use]
    pub fn is_system(&self, table: &str) -> bool {
        table == self.operation_queue || table == self.sync_errors
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("record is not a JSON object: {0}")]
    NotAnObject(Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;
    use fake::faker::name::en::Name;
    use serde_json::json;

    #[test]
    fn record_id_round_trip() {
        let spotter: String = Name().fake();
        let record = Record::with_id("abc")
            .set("score", 7)
            .set("spotter", spotter.clone());
        assert_eq!(record.id(), Some("abc"));
        assert_eq!(record.get("score"), Some(&json!(7)));
        assert_eq!(record.get("spotter"), Some(&json!(spotter)));

        let value = record.clone().into_value();
        let back = Record::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2, 3])).is_err());
        assert!(Record::from_value(json!("flat")).is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = Record::new();
        let b = Record::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn filter_renders_odata() {
        let filter = Filter::And(vec![
            Filter::eq("status", "ACTIVE"),
            Filter::compare("score", CompareOp::Gt, 10),
        ]);
        assert_eq!(
            filter.to_odata(),
            "(status eq 'ACTIVE') and (score gt 10)"
        );
    }

    #[test]
    fn filter_escapes_quotes() {
        let filter = Filter::eq("name", "O'Brien");
        assert_eq!(filter.to_odata(), "name eq 'O''Brien'");
    }

    #[test]
    fn filter_matches_records() {
        let record = Record::with_id("r1").set("status", "ACTIVE").set("score", 12);

        assert!(Filter::eq("status", "ACTIVE").matches(&record));
        assert!(Filter::compare("score", CompareOp::Gt, 10).matches(&record));
        assert!(!Filter::compare("score", CompareOp::Lt, 10).matches(&record));
        assert!(Filter::Not(Box::new(Filter::eq("status", "RETIRED"))).matches(&record));
    }

    #[test]
    fn missing_field_only_matches_null() {
        let record = Record::with_id("r1");
        assert!(Filter::eq("ghost", Value::Null).matches(&record));
        assert!(Filter::compare("ghost", CompareOp::Ne, 5).matches(&record));
        assert!(!Filter::compare("ghost", CompareOp::Gt, 5).matches(&record));
    }

    #[test]
    fn query_renders_all_clauses() {
        let query = TableQuery::new("sightings")
            .filter(Filter::eq("species", "kestrel"))
            .order_by(OrderBy::desc("spotted_at"))
            .skip(20)
            .top(10)
            .select("id")
            .select("species");

        assert_eq!(
            query.to_odata(),
            "$filter=species eq 'kestrel'&$orderby=spotted_at desc&$skip=20&$top=10&$select=id,species"
        );
    }

    #[test]
    fn empty_query_renders_empty_string() {
        assert_eq!(TableQuery::new("sightings").to_odata(), "");
    }

    #[test]
    fn system_tables_match_by_exact_name() {
        let tables = SystemTables::default();
        assert!(tables.is_system("__operations"));
        assert!(tables.is_system("__errors"));
        assert!(!tables.is_system("operations"));
        assert!(!tables.is_system("sightings"));
    }
}
