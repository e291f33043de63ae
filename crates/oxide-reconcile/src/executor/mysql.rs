//! MySQL executor.

use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, MySql, Row as SqlxRow};
use tokio::sync::Mutex;
use tracing::debug;

use super::{query_error, DatabaseContext, QueryExecutor};
use crate::error::Result;
use crate::statement::{Row, Scalar};

/// Executes statements on one MySQL connection.
pub struct MySqlExecutor {
    connection: Mutex<MySqlConnection>,
}

impl MySqlExecutor {
    /// Opens a connection to `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let connection = MySqlConnection::connect(url).await?;
        Ok(Self::new(connection))
    }

    /// Wraps an open connection.
    #[must_use]
    pub fn new(connection: MySqlConnection) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }

    fn bind_value<'q>(
        query: sqlx::query::Query<'q, MySql, MySqlArguments>,
        value: &'q Scalar,
    ) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
        match value {
            Scalar::Null => query.bind(None::<String>),
            Scalar::Bool(b) => query.bind(b),
            Scalar::Int(i) => query.bind(i),
            Scalar::Float(f) => query.bind(f),
            Scalar::Text(s) => query.bind(s),
        }
    }

    fn convert_row(mysql_row: &MySqlRow) -> Row {
        let mut row = Row::new();
        for column in mysql_row.columns() {
            let name = column.name();
            let value: Scalar = if let Ok(value) = mysql_row.try_get::<Option<i64>, _>(name) {
                value.into()
            } else if let Ok(value) = mysql_row.try_get::<Option<u64>, _>(name) {
                value
                    .and_then(|v| i64::try_from(v).ok())
                    .into()
            } else if let Ok(value) = mysql_row.try_get::<Option<i32>, _>(name) {
                value.map(i64::from).into()
            } else if let Ok(value) = mysql_row.try_get::<Option<f64>, _>(name) {
                value.map_or(Scalar::Null, Scalar::Float)
            } else if let Ok(value) = mysql_row.try_get::<Option<String>, _>(name) {
                value.into()
            } else if let Ok(value) = mysql_row.try_get::<Option<Vec<u8>>, _>(name) {
                // information_schema reports some text columns with a binary
                // collation
                value
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .into()
            } else {
                Scalar::Null
            };
            row.insert(name, value);
        }
        row
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
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
        let rows = self.execute("SELECT DATABASE() AS `db_name`", &[]).await?;
        let database = rows
            .first()
            .and_then(|r| r.text("db_name"))
            .map(str::to_string);
        Ok(DatabaseContext::new(database, None))
    }
}
