//! Query Builder execution and result adaptation

use std::collections::VecDeque;
use std::sync::Arc;

use super::builder::QuerySpecification;
use super::sql_generation::AGGREGATE_ALIAS;
use super::types::{CompiledStatement, Pagination};
use crate::backends::{Cursor, DatabaseConnection, DatabaseValue, Row};
use crate::error::ModelResult;

/// Row-to-record mapping callback
pub type RowMapper<T> = Arc<dyn Fn(&Row) -> ModelResult<T> + Send + Sync>;

/// When rows are mapped into records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Map each row as it is fetched
    #[default]
    Lazy,
    /// Map every row when the adapter opens; mapping errors surface immediately
    Eager,
}

/// Options applied when wrapping a cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultOptions {
    pub fetch_mode: FetchMode,
    /// Table alias whose `alias.column` names are exposed as `column`
    pub alias: Option<String>,
    /// Keep mapped records so repeated `fetch_all` calls return them again
    pub cache_results: bool,
}

/// Typed view over a cursor
pub struct ResultAdapter<T> {
    cursor: Cursor,
    mapper: RowMapper<T>,
    options: ResultOptions,
    mapped: VecDeque<T>,
    cache: Option<Vec<T>>,
}

impl<T> ResultAdapter<T> {
    /// Wrap a cursor; in eager mode every row is mapped right away
    pub fn open(cursor: Cursor, mapper: RowMapper<T>, options: ResultOptions) -> ModelResult<Self> {
        let mut adapter = Self {
            cursor,
            mapper,
            options,
            mapped: VecDeque::new(),
            cache: None,
        };

        if adapter.options.fetch_mode == FetchMode::Eager {
            for row in adapter.cursor.fetch_all() {
                let record = adapter.map_row(&row)?;
                adapter.mapped.push_back(record);
            }
        }

        Ok(adapter)
    }

    fn map_row(&self, row: &Row) -> ModelResult<T> {
        match &self.options.alias {
            Some(alias) => (self.mapper)(&row.scoped(alias)),
            None => (self.mapper)(row),
        }
    }

    /// Next record, if any
    pub fn fetch_one(&mut self) -> ModelResult<Option<T>> {
        if let Some(record) = self.mapped.pop_front() {
            return Ok(Some(record));
        }
        match self.cursor.fetch_one() {
            Some(row) => self.map_row(&row).map(Some),
            None => Ok(None),
        }
    }

    pub fn affected_row_count(&self) -> u64 {
        self.cursor.affected_row_count()
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.cursor.last_insert_id()
    }

    pub fn options(&self) -> &ResultOptions {
        &self.options
    }
}

impl<T: Clone> ResultAdapter<T> {
    /// Every remaining record (or the cached set when result caching is on)
    pub fn fetch_all(&mut self) -> ModelResult<Vec<T>> {
        if let Some(cached) = &self.cache {
            return Ok(cached.clone());
        }

        let mut records: Vec<T> = self.mapped.drain(..).collect();
        for row in self.cursor.fetch_all() {
            records.push(self.map_row(&row)?);
        }

        if self.options.cache_results {
            self.cache = Some(records.clone());
        }
        Ok(records)
    }
}

/// Hand a compiled statement to the connection
pub async fn execute_statement(
    connection: &dyn DatabaseConnection,
    statement: &CompiledStatement,
) -> ModelResult<Cursor> {
    tracing::debug!(
        "Executing statement: {} ({} parameters)",
        statement.sql,
        statement.parameters.len()
    );

    connection
        .execute(&statement.sql, &statement.parameters)
        .await
        .inspect_err(|e| tracing::error!("Statement failed: {}", e))
}

impl QuerySpecification {
    /// Compile and execute, returning the raw cursor
    pub async fn execute(&self, connection: &dyn DatabaseConnection) -> ModelResult<Cursor> {
        execute_statement(connection, &self.compile()).await
    }

    /// Number of matching rows, ignoring ordering and paging
    pub async fn count(&self, connection: &dyn DatabaseConnection) -> ModelResult<u64> {
        let value = self.aggregate_value(connection, &self.compile_count()).await?;
        Ok(value.as_i64().map_or(0, |count| count.max(0) as u64))
    }

    /// Whether at least one row matches
    pub async fn exists(&self, connection: &dyn DatabaseConnection) -> ModelResult<bool> {
        let mut cursor = execute_statement(connection, &self.compile_exists()).await?;
        Ok(cursor.fetch_one().is_some())
    }

    /// Value of one aggregate expression such as `MAX(age)`
    pub async fn aggregate(
        &self,
        connection: &dyn DatabaseConnection,
        expression: &str,
    ) -> ModelResult<DatabaseValue> {
        self.aggregate_value(connection, &self.compile_aggregate(expression))
            .await
    }

    async fn aggregate_value(
        &self,
        connection: &dyn DatabaseConnection,
        statement: &CompiledStatement,
    ) -> ModelResult<DatabaseValue> {
        let mut cursor = execute_statement(connection, statement).await?;
        match cursor.fetch_one() {
            Some(row) => row
                .get_by_name(AGGREGATE_ALIAS)
                .or_else(|_| row.get_by_index(0)),
            None => Ok(DatabaseValue::Null),
        }
    }

    /// Page summary for the current limit/offset; `None` without a limit
    pub async fn paginate(
        &self,
        connection: &dyn DatabaseConnection,
    ) -> ModelResult<Option<Pagination>> {
        let Some(limit) = self.limit_count else {
            return Ok(None);
        };

        let total = self.count(connection).await?;
        let offset = self.offset_value.unwrap_or(0);
        Ok(Some(Pagination {
            total,
            limit,
            offset,
            page: self.current_page().unwrap_or(1),
        }))
    }
}
