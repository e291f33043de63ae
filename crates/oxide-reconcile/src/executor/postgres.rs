//! PostgreSQL executor.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::{Column, Connection, Postgres, Row as SqlxRow};
use tokio::sync::Mutex;
use tracing::debug;

use super::{query_error, DatabaseContext, QueryExecutor};
use crate::error::Result;
use crate::statement::{Row, Scalar};

/// Executes statements on one PostgreSQL connection.
pub struct PgExecutor {
    connection: Mutex<PgConnection>,
}

impl PgExecutor {
    /// Opens a connection to `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let connection = PgConnection::connect(url).await?;
        Ok(Self::new(connection))
    }

    /// Wraps an open connection.
    #[must_use]
    pub fn new(connection: PgConnection) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }

    fn bind_value<'q>(
        query: sqlx::query::Query<'q, Postgres, PgArguments>,
        value: &'q Scalar,
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        match value {
            Scalar::Null => query.bind(None::<String>),
            Scalar::Bool(b) => query.bind(b),
            Scalar::Int(i) => query.bind(i),
            Scalar::Float(f) => query.bind(f),
            Scalar::Text(s) => query.bind(s),
        }
    }

    fn convert_row(pg_row: &PgRow) -> Row {
        let mut row = Row::new();
        for column in pg_row.columns() {
            let name = column.name();
            let value: Scalar = if let Ok(value) = pg_row.try_get::<Option<bool>, _>(name) {
                value.into()
            } else if let Ok(value) = pg_row.try_get::<Option<i64>, _>(name) {
                value.into()
            } else if let Ok(value) = pg_row.try_get::<Option<i32>, _>(name) {
                value.map(i64::from).into()
            } else if let Ok(value) = pg_row.try_get::<Option<i16>, _>(name) {
                value.map(i64::from).into()
            } else if let Ok(value) = pg_row.try_get::<Option<f64>, _>(name) {
                value.map_or(Scalar::Null, Scalar::Float)
            } else if let Ok(value) = pg_row.try_get::<Option<String>, _>(name) {
                value.into()
            } else {
                Scalar::Null
            };
            row.insert(name, value);
        }
        row
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str, params: &[Scalar]) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Executing SQL");
        let mut query = sqlx::query(sql);
        for param in params {
            query = Self::bind_value(query, param);
        }
        let mut connection = self.connection.lock().await;
        let rows = query
            .fetch_all(&mut *connection)
            .await
            .map_err(|e| query_error(sql, params, e))?;
        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn current_database_context(&self) -> Result<DatabaseContext> {
        let rows = self
            .execute(
                "SELECT current_database()::text AS \"database\", current_schema()::text AS \"schema\"",
                &[],
            )
            .await?;
        let row = rows.first();
        Ok(DatabaseContext::new(
            row.and_then(|r| r.text("database")).map(str::to_string),
            row.and_then(|r| r.text("schema")).map(str::to_string),
        ))
    }
}
