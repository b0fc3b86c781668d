//! PostgreSQL Backend Implementation
//!
//! Executes compiled statements through a sqlx pool. Named `:name`
//! placeholders are rewritten to positional `$n` ones before binding.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row as SqlxRow, TypeInfo, ValueRef};

use super::core::*;
use crate::config::PoolConfig;
use crate::error::{ModelError, OrmResult};

/// Connection backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: Pool<Postgres>,
}

impl PostgresConnection {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            return Err(ModelError::Configuration(
                "Invalid PostgreSQL URL scheme".to_string(),
            ));
        }

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options.connect(database_url).await.map_err(|e| {
            ModelError::Database(format!("Failed to create PostgreSQL pool: {}", e))
        })?;

        tracing::info!(
            "PostgreSQL pool ready ({} max connections)",
            config.max_connections
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn execute(&self, sql: &str, params: &Parameters) -> OrmResult<Cursor> {
        let (sql, values) = rewrite_placeholders(sql, params)?;

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_database_value(query, value)?;
        }

        if returns_rows(&sql) {
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ModelError::Database(format!("Query fetch failed: {}", e)))?;
            let rows = rows
                .iter()
                .map(convert_row)
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Cursor::new(rows))
        } else {
            let result = query
                .execute(&self.pool)
                .await
                .map_err(|e| ModelError::Database(format!("Query execution failed: {}", e)))?;
            Ok(Cursor::affected(result.rows_affected()))
        }
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().to_uppercase();
    head.starts_with("SELECT") || head.starts_with("WITH") || head.contains(" RETURNING ")
}

/// Rewrite `:name` placeholders to `$n`, returning the values in position
/// order. Repeated names share one position; `::` casts and quoted
/// literals are left alone.
pub(crate) fn rewrite_placeholders(
    sql: &str,
    params: &Parameters,
) -> OrmResult<(String, Vec<DatabaseValue>)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut output = String::with_capacity(sql.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut values = Vec::new();
    let mut in_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            in_quote = !in_quote;
            output.push(c);
            i += 1;
            continue;
        }

        if in_quote || c != ':' {
            output.push(c);
            i += 1;
            continue;
        }

        // `::type` cast
        if chars.get(i + 1) == Some(&':') {
            output.push_str("::");
            i += 2;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        if end == start || chars[start].is_ascii_digit() {
            output.push(c);
            i += 1;
            continue;
        }

        let name: String = chars[start..end].iter().collect();
        let value = params
            .get(&name)
            .ok_or_else(|| ModelError::Validation(format!("Parameter ':{}' is not bound", name)))?;

        let position = match positions.get(&name) {
            Some(position) => *position,
            None => {
                values.push(value.clone());
                positions.insert(name, values.len() - 1);
                values.len() - 1
            }
        };
        output.push_str(&SqlDialect::PostgreSQL.parameter_placeholder(position));
        i = end;
    }

    Ok((output, values))
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> OrmResult<Query<'q, Postgres, PgArguments>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(items) => bind_array(query, items),
    }
}

/// Homogeneous integer or text arrays bind as PostgreSQL arrays
fn bind_array<'q>(
    query: Query<'q, Postgres, PgArguments>,
    items: &[DatabaseValue],
) -> OrmResult<Query<'q, Postgres, PgArguments>> {
    if let Some(integers) = items.iter().map(DatabaseValue::as_i64).collect::<Option<Vec<_>>>() {
        if items.iter().all(|item| !matches!(item, DatabaseValue::String(_))) {
            return Ok(query.bind(integers));
        }
    }

    let texts: Option<Vec<String>> = items
        .iter()
        .map(|item| match item {
            DatabaseValue::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    texts.map(|texts| query.bind(texts)).ok_or_else(|| {
        ModelError::Validation("Only integer or text arrays can be bound".to_string())
    })
}

fn convert_row(row: &PgRow) -> OrmResult<Row> {
    let mut converted = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted.push(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(converted)
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
        "INT2" => DatabaseValue::Int32(i32::from(row.try_get::<i16, _>(index)?)),
        "INT4" => DatabaseValue::Int32(row.try_get(index)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index)?),
        "FLOAT4" => DatabaseValue::Float32(row.try_get(index)?),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index)?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            DatabaseValue::DateTime(naive.and_utc())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index)?),
        "TIME" => DatabaseValue::Time(row.try_get(index)?),
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index)?),
        _ => {
            // Fallback: try to get as string
            let value: String = row.try_get(index).map_err(|e| {
                ModelError::Database(format!(
                    "Failed to read value of unknown type '{}': {}",
                    type_name, e
                ))
            })?;
            DatabaseValue::String(value)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, DatabaseValue)]) -> Parameters {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_rewrite_named_placeholders() {
        let bound = params(&[("p0", "active".into()), ("p1", 18.into())]);
        let (sql, values) =
            rewrite_placeholders("SELECT * FROM users WHERE (status = :p0) AND (age > :p1)", &bound)
                .unwrap();

        assert_eq!(sql, "SELECT * FROM users WHERE (status = $1) AND (age > $2)");
        assert_eq!(values, vec![DatabaseValue::from("active"), DatabaseValue::from(18)]);
    }

    #[test]
    fn test_repeated_names_share_position() {
        let bound = params(&[("p0", "%ada%".into())]);
        let (sql, values) =
            rewrite_placeholders("(name LIKE :p0 OR email LIKE :p0)", &bound).unwrap();

        assert_eq!(sql, "(name LIKE $1 OR email LIKE $1)");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_casts_and_literals_untouched() {
        let bound = params(&[("p0", 1.into())]);
        let (sql, values) = rewrite_placeholders(
            "SELECT created_at::date, ':p9' FROM users WHERE (id = :p0)",
            &bound,
        )
        .unwrap();

        assert_eq!(sql, "SELECT created_at::date, ':p9' FROM users WHERE (id = $1)");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_unbound_placeholder_fails() {
        let result = rewrite_placeholders("SELECT * FROM users WHERE id = :missing", &Parameters::new());
        assert!(matches!(result, Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  with x as (select 1) select * from x"));
        assert!(returns_rows("INSERT INTO users (name) VALUES ($1) RETURNING id"));
        assert!(!returns_rows("UPDATE users SET name = $1 WHERE id = $2"));
    }
}
