//! Statement execution.
//!
//! The engine never talks to a driver directly: every round trip goes
//! through [`QueryExecutor::execute`]. The sqlx-backed executors hold a single
//! connection so that session state (an open transaction, foreign key
//! checks) carries over from one statement to the next.

mod memory;
mod mysql;
mod postgres;

pub use memory::MemoryExecutor;
pub use mysql::MySqlExecutor;
pub use postgres::PgExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BoxError, ReconcileError, Result};
use crate::statement::{Row, Scalar};

/// Namespace the connection resolves unqualified names into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseContext {
    /// Current database.
    pub database: Option<String>,
    /// Current schema (Postgres).
    pub schema: Option<String>,
}

impl DatabaseContext {
    /// Creates a context.
    #[must_use]
    pub fn new(database: Option<String>, schema: Option<String>) -> Self {
        Self { database, schema }
    }
}

/// Sends SQL to a server and reads rows back.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes one statement with positional parameters.
    ///
    /// Driver failures are reported as [`ReconcileError::QueryExecution`]
    /// carrying the SQL text and parameters.
    async fn execute(&self, sql: &str, params: &[Scalar]) -> Result<Vec<Row>>;

    /// Resolves the connection's current database and schema.
    async fn current_database_context(&self) -> Result<DatabaseContext>;
}

pub(crate) fn query_error(sql: &str, params: &[Scalar], source: impl Into<BoxError>) -> ReconcileError {
    ReconcileError::QueryExecution {
        sql: sql.to_string(),
        params: params.to_vec(),
        source: source.into(),
    }
}
