//! In-memory connection for tests
//!
//! [`RecordingConnection`] records every statement it receives, counts calls
//! and replays queued cursors or errors in order. With an empty queue it
//! answers with an empty cursor.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::backends::{Cursor, DatabaseConnection, Parameters, SqlDialect};
use crate::error::ModelResult;
use crate::query::CompiledStatement;

/// Call-counting stub connection
pub struct RecordingConnection {
    dialect: SqlDialect,
    statements: Mutex<Vec<CompiledStatement>>,
    results: Mutex<VecDeque<ModelResult<Cursor>>>,
}

impl Default for RecordingConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::with_dialect(SqlDialect::MySQL)
    }

    pub fn with_dialect(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            statements: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the cursor returned by the next unanswered call
    pub fn push_result(&self, cursor: Cursor) -> &Self {
        lock(&self.results).push_back(Ok(cursor));
        self
    }

    /// Queue an error returned by the next unanswered call
    pub fn push_error(&self, error: crate::error::ModelError) -> &Self {
        lock(&self.results).push_back(Err(error));
        self
    }

    /// Every statement executed so far
    pub fn statements(&self) -> Vec<CompiledStatement> {
        lock(&self.statements).clone()
    }

    /// SQL of the most recent statement
    pub fn last_sql(&self) -> Option<String> {
        lock(&self.statements).last().map(|statement| statement.sql.clone())
    }

    pub fn call_count(&self) -> usize {
        lock(&self.statements).len()
    }
}

#[async_trait]
impl DatabaseConnection for RecordingConnection {
    async fn execute(&self, sql: &str, params: &Parameters) -> ModelResult<Cursor> {
        lock(&self.statements).push(CompiledStatement {
            sql: sql.to_string(),
            parameters: params.clone(),
        });

        lock(&self.results)
            .pop_front()
            .unwrap_or_else(|| Ok(Cursor::default()))
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
