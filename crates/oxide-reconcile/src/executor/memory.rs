//! In-memory executor for previews and tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{query_error, DatabaseContext, QueryExecutor};
use crate::error::Result;
use crate::statement::{Row, Scalar, Statement};

#[derive(Debug, Default)]
struct MemoryState {
    log: Vec<Statement>,
    responses: Vec<(String, Vec<Row>)>,
    failures: Vec<String>,
}

/// Records every statement instead of sending it anywhere.
///
/// Queries return the rows registered with [`MemoryExecutor::respond`] for
/// the most recently registered fragment contained in the SQL, or no rows.
/// Statements containing a fragment registered with
/// [`MemoryExecutor::fail_on`] fail with a query error.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    state: Mutex<MemoryState>,
    context: DatabaseContext,
}

impl MemoryExecutor {
    /// Creates an executor with an empty database context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the context reported by `current_database_context`.
    #[must_use]
    pub fn with_context(mut self, context: DatabaseContext) -> Self {
        self.context = context;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `rows` for every statement containing `fragment`.
    pub fn respond(&self, fragment: impl Into<String>, rows: Vec<Row>) {
        self.state().responses.push((fragment.into(), rows));
    }

    /// Fails every statement containing `fragment`.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state().failures.push(fragment.into());
    }

    /// Removes every registered failure.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Statements executed so far, failed ones included.
    #[must_use]
    pub fn statements(&self) -> Vec<Statement> {
        self.state().log.clone()
    }

    /// SQL text of the statements executed so far.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        self.state().log.iter().map(|s| s.sql.clone()).collect()
    }

    /// Forgets the recorded statements.
    pub fn clear_log(&self) {
        self.state().log.clear();
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, sql: &str, params: &[Scalar]) -> Result<Vec<Row>> {
        debug!(sql = %sql, "Recording SQL");
        let mut state = self.state();
        state
            .log
            .push(Statement::with_params(sql, params.to_vec()));
        if state.failures.iter().any(|f| sql.contains(f.as_str())) {
            return Err(query_error(sql, params, "simulated failure"));
        }
        Ok(state
            .responses
            .iter()
            .rev()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn current_database_context(&self) -> Result<DatabaseContext> {
        Ok(self.context.clone())
    }
}
