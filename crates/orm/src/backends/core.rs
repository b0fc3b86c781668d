//! Core Database Backend Traits
//!
//! This module defines the connection abstraction the query engine executes
//! against, the value type used for parameter binding, and the row/cursor
//! types a connection hands back.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{ModelError, OrmResult};

/// Named parameters of a statement, keyed without the leading `:`
pub type Parameters = BTreeMap<String, DatabaseValue>;

/// Abstract database connection trait
///
/// Implementations receive SQL with named `:name` placeholders together
/// with the values bound to those names.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Execute a statement and return its cursor
    async fn execute(&self, sql: &str, params: &Parameters) -> OrmResult<Cursor>;

    /// SQL dialect spoken by this connection
    fn dialect(&self) -> SqlDialect;
}

/// Result rows plus the write counters of one executed statement
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    rows: VecDeque<Row>,
    affected_rows: u64,
    last_insert_id: Option<i64>,
}

impl Cursor {
    /// Cursor over result rows
    pub fn new(rows: Vec<Row>) -> Self {
        let affected_rows = rows.len() as u64;
        Self {
            rows: rows.into(),
            affected_rows,
            last_insert_id: None,
        }
    }

    /// Cursor for a write statement with no rows
    pub fn affected(count: u64) -> Self {
        Self {
            rows: VecDeque::new(),
            affected_rows: count,
            last_insert_id: None,
        }
    }

    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    /// Take the next row
    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Take every remaining row
    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Rows affected by the statement (row count for queries)
    pub fn affected_row_count(&self) -> u64 {
        self.affected_rows
    }

    /// Identifier generated by an insert, when the driver reports one
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Number of rows not fetched yet
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

/// One result row with ordered, named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, DatabaseValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Append a column
    pub fn with<V: Into<DatabaseValue>>(mut self, column: &str, value: V) -> Self {
        self.push(column, value);
        self
    }

    pub fn push<V: Into<DatabaseValue>>(&mut self, column: &str, value: V) {
        self.columns.push((column.to_string(), value.into()));
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        self.columns
            .get(index)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ModelError::ColumnNotFound(format!("#{}", index)))
    }

    /// Get a column value by name
    pub fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ModelError::ColumnNotFound(name.to_string()))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Convert row to JSON object
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }

    /// Convert row to HashMap
    pub fn to_map(&self) -> HashMap<String, DatabaseValue> {
        self.columns.iter().cloned().collect()
    }

    /// View of the row as seen from one table alias.
    ///
    /// Columns named `alias.column` are exposed as `column` and shadow an
    /// unprefixed column of the same name; columns of other aliases are kept
    /// under their qualified names.
    pub fn scoped(&self, alias: &str) -> Row {
        let prefix = format!("{}.", alias);
        let mut scoped: Vec<(String, DatabaseValue)> = Vec::with_capacity(self.columns.len());

        for (name, value) in &self.columns {
            if let Some(stripped) = name.strip_prefix(&prefix) {
                match scoped.iter_mut().find(|(existing, _)| existing == stripped) {
                    Some(slot) => slot.1 = value.clone(),
                    None => scoped.push((stripped.to_string(), value.clone())),
                }
            } else if !scoped.iter().any(|(existing, _)| existing == name) {
                scoped.push((name.clone(), value.clone()));
            }
        }

        Row { columns: scoped }
    }

    /// Get a typed value from a column
    pub fn get<T>(&self, column: &str) -> OrmResult<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let value = self.get_by_name(column)?;
        serde_json::from_value(value.to_json()).map_err(|e| {
            ModelError::Serialization(format!("Failed to deserialize column '{}': {}", column, e))
        })
    }

    /// Get an optional typed value; missing columns and NULL both map to `None`
    pub fn try_get<T>(&self, column: &str) -> OrmResult<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.get_by_name(column) {
            Ok(value) if value.is_null() => Ok(None),
            Ok(value) => serde_json::from_value(value.to_json()).map(Some).map_err(|e| {
                ModelError::Serialization(format!(
                    "Failed to deserialize column '{}': {}",
                    column, e
                ))
            }),
            Err(ModelError::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DatabaseValue {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
    Array(Vec<DatabaseValue>),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Check if the value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, DatabaseValue::Array(_))
    }

    /// A key value that cannot identify a row: NULL, zero, empty or nil
    pub fn is_unset(&self) -> bool {
        match self {
            DatabaseValue::Null => true,
            DatabaseValue::Int32(0) | DatabaseValue::Int64(0) => true,
            DatabaseValue::String(s) => s.is_empty(),
            DatabaseValue::Uuid(u) => u.is_nil(),
            _ => false,
        }
    }

    /// Integer view of the value, if it has one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(i64::from(*i)),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Stable textual form used when hashing values into cache keys
    pub fn signature(&self) -> String {
        match self {
            DatabaseValue::Null => "null".to_string(),
            DatabaseValue::String(s) => format!("s:{}", s),
            other => other.to_json().to_string(),
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(
                b.iter()
                    .map(|&x| JsonValue::Number(serde_json::Number::from(x)))
                    .collect(),
            ),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
            DatabaseValue::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Create DatabaseValue from decoded JSON input
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => DatabaseValue::Int32(small),
                        Err(_) => DatabaseValue::Int64(i),
                    }
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Null
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            JsonValue::Array(arr) => {
                DatabaseValue::Array(arr.into_iter().map(DatabaseValue::from_json).collect())
            }
            JsonValue::Object(_) => DatabaseValue::Json(json),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f32> for DatabaseValue {
    fn from(value: f32) -> Self {
        DatabaseValue::Float32(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<chrono::NaiveTime> for DatabaseValue {
    fn from(value: chrono::NaiveTime) -> Self {
        DatabaseValue::Time(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::from_json(value)
    }
}

impl<T> From<Vec<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(values: Vec<T>) -> Self {
        DatabaseValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the positional placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Whether inserts report generated keys through `RETURNING`
    pub fn supports_returning(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL | SqlDialect::SQLite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_fetching() {
        let mut cursor = Cursor::new(vec![
            Row::new().with("id", 1),
            Row::new().with("id", 2),
            Row::new().with("id", 3),
        ]);

        assert_eq!(cursor.affected_row_count(), 3);
        assert_eq!(cursor.fetch_one().unwrap().get::<i64>("id").unwrap(), 1);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.fetch_all().len(), 2);
        assert!(cursor.fetch_one().is_none());
    }

    #[test]
    fn test_write_cursor() {
        let cursor = Cursor::affected(4).with_last_insert_id(42);
        assert_eq!(cursor.affected_row_count(), 4);
        assert_eq!(cursor.last_insert_id(), Some(42));
    }

    #[test]
    fn test_row_typed_access() {
        let row = Row::new()
            .with("name", "Ada")
            .with("age", 36)
            .with("nickname", DatabaseValue::Null);

        assert_eq!(row.get::<String>("name").unwrap(), "Ada");
        assert_eq!(row.get::<u32>("age").unwrap(), 36);
        assert_eq!(row.try_get::<String>("nickname").unwrap(), None);
        assert_eq!(row.try_get::<String>("missing").unwrap(), None);
        assert!(matches!(
            row.get::<String>("missing"),
            Err(ModelError::ColumnNotFound(_))
        ));
        assert_eq!(row.to_json(), json!({"name": "Ada", "age": 36, "nickname": null}));
    }

    #[test]
    fn test_row_scoped_by_alias() {
        let row = Row::new()
            .with("id", 7)
            .with("u.id", 1)
            .with("u.name", "Ada")
            .with("p.title", "Notes");

        let scoped = row.scoped("u");
        assert_eq!(scoped.get_by_name("id").unwrap(), DatabaseValue::Int32(1));
        assert_eq!(scoped.get_by_name("name").unwrap(), DatabaseValue::from("Ada"));
        assert_eq!(scoped.get_by_name("p.title").unwrap(), DatabaseValue::from("Notes"));
        assert_eq!(scoped.column_count(), 3);
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(DatabaseValue::from_json(json!(5)), DatabaseValue::Int32(5));
        assert_eq!(
            DatabaseValue::from_json(json!(5_000_000_000i64)),
            DatabaseValue::Int64(5_000_000_000)
        );
        assert_eq!(
            DatabaseValue::from_json(json!([1, "a"])),
            DatabaseValue::Array(vec![DatabaseValue::Int32(1), DatabaseValue::from("a")])
        );
        assert_eq!(DatabaseValue::from_json(json!(null)), DatabaseValue::Null);
    }

    #[test]
    fn test_unset_values() {
        assert!(DatabaseValue::Null.is_unset());
        assert!(DatabaseValue::Int64(0).is_unset());
        assert!(DatabaseValue::from("").is_unset());
        assert!(DatabaseValue::Uuid(uuid::Uuid::nil()).is_unset());
        assert!(!DatabaseValue::Int32(3).is_unset());
    }

    #[test]
    fn test_dialect_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::MySQL.parameter_placeholder(3), "?");
        assert!(SqlDialect::PostgreSQL.supports_returning());
        assert!(!SqlDialect::MySQL.supports_returning());
    }
}
