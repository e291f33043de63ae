//! Whole-namespace teardown.

use tracing::{debug, info, warn};

use super::SchemaEngine;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::executor::QueryExecutor;

impl<D: Dialect, E: QueryExecutor> SchemaEngine<D, E> {
    /// Drops every view, table and named type in `namespace` (the current
    /// one when `None`) inside a single transaction.
    ///
    /// Foreign key enforcement is switched off for the duration where the
    /// dialect allows it, and switched back on even when a drop fails.
    pub async fn clear_database(&self, namespace: Option<&str>) -> Result<()> {
        let namespace = match namespace {
            Some(namespace) => namespace.to_string(),
            None => self.namespace().await?,
        };
        info!(namespace = %namespace, "Clearing database");
        if !self
            .dialect
            .has_namespace(&self.executor, &namespace)
            .await?
        {
            debug!(namespace = %namespace, "Namespace does not exist, nothing to clear");
            return Ok(());
        }

        let owns_transaction = !self.is_transaction_active();
        if owns_transaction {
            self.start_transaction().await?;
        }
        if let Err(err) = self.drop_namespace_objects(&namespace).await {
            if owns_transaction {
                if let Err(rollback) = self.rollback_transaction().await {
                    warn!(error = %rollback, "Rollback failed");
                }
            }
            return Err(err);
        }
        if owns_transaction {
            self.commit_transaction().await?;
        }

        if namespace.is_empty() {
            self.cache.clear(None);
        } else {
            self.cache.clear(Some(&namespace));
        }
        Ok(())
    }

    async fn drop_namespace_objects(&self, namespace: &str) -> Result<()> {
        if let Some(sql) = self.dialect.foreign_key_checks_sql(false) {
            self.executor.execute(&sql, &[]).await?;
        }
        let dropped = self
            .dialect
            .drop_all_objects(&self.executor, namespace)
            .await;
        if let Some(sql) = self.dialect.foreign_key_checks_sql(true) {
            if let Err(err) = self.executor.execute(&sql, &[]).await {
                if dropped.is_ok() {
                    return Err(err);
                }
                warn!(error = %err, "Could not restore foreign key checks");
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::dialect::MySqlDialect;
    use crate::engine::SchemaEngine;
    use crate::error::ReconcileError;
    use crate::executor::{DatabaseContext, MemoryExecutor};
    use crate::schema::Table;
    use crate::statement::Row;

    fn engine() -> SchemaEngine<MySqlDialect, MemoryExecutor> {
        let executor =
            MemoryExecutor::new().with_context(DatabaseContext::new(Some("shop".to_string()), None));
        executor.respond("SCHEMATA", vec![Row::from_pairs([("1", 1_i64)])]);
        executor.respond(
            "`INFORMATION_SCHEMA`.`TABLES` WHERE",
            vec![Row::from_pairs([("query", "DROP TABLE IF EXISTS `shop`.`orders`")])],
        );
        let engine = SchemaEngine::new(MySqlDialect::default(), executor, EngineConfig::default());
        engine.cache().put_table("shop.orders", Table::new("orders"));
        engine
    }

    fn writes(executor: &MemoryExecutor) -> Vec<String> {
        executor
            .executed_sql()
            .into_iter()
            .filter(|s| !s.starts_with("SELECT"))
            .collect()
    }

    #[tokio::test]
    async fn test_clear_database() {
        let engine = engine();
        engine.clear_database(None).await.unwrap();
        assert_eq!(
            writes(engine.executor()),
            vec![
                "START TRANSACTION",
                "SET FOREIGN_KEY_CHECKS = 0",
                "DROP TABLE IF EXISTS `shop`.`orders`",
                "SET FOREIGN_KEY_CHECKS = 1",
                "COMMIT",
            ]
        );
        assert_eq!(engine.cache().table_count(), 0);
        assert!(!engine.is_transaction_active());
    }

    #[tokio::test]
    async fn test_clear_database_restores_checks_on_failure() {
        let engine = engine();
        engine.executor().fail_on("DROP TABLE IF EXISTS `shop`");
        let err = engine.clear_database(Some("shop")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::QueryExecution { .. }));
        assert_eq!(
            writes(engine.executor()),
            vec![
                "START TRANSACTION",
                "SET FOREIGN_KEY_CHECKS = 0",
                "DROP TABLE IF EXISTS `shop`.`orders`",
                "SET FOREIGN_KEY_CHECKS = 1",
                "ROLLBACK",
            ]
        );
        assert_eq!(engine.cache().table_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_missing_namespace_is_noop() {
        let engine = SchemaEngine::new(
            MySqlDialect::default(),
            MemoryExecutor::new(),
            EngineConfig::default(),
        );
        engine.clear_database(Some("ghost")).await.unwrap();
        assert_eq!(engine.executor().executed_sql().len(), 1);
    }
}
