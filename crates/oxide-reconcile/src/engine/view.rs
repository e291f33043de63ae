//! View operations.
//!
//! Every view is recorded in the registry table next to its `CREATE VIEW`,
//! so the loader can return the defining query verbatim.

use tracing::info;

use super::SchemaEngine;
use crate::dialect::Dialect;
use crate::error::{ObjectKind, ReconcileError, Result};
use crate::executor::QueryExecutor;
use crate::schema::{split_qualified, View};
use crate::statement::Plan;

impl<D: Dialect, E: QueryExecutor> SchemaEngine<D, E> {
    /// Creates a view and records it in the registry.
    pub async fn create_view(&self, view: &View) -> Result<View> {
        if view.materialized {
            self.require(
                self.dialect.capabilities().materialized_views,
                "materialized views",
            )?;
        }
        info!(view = %view.name, materialized = view.materialized, "Creating view");
        let namespace = self.view_namespace(view).await?;
        let metadata = &self.config.metadata_table;

        let mut plan = Plan::new();
        plan.push(
            self.dialect.create_view_sql(view),
            self.dialect.drop_view_sql(view),
        );
        plan.push(
            self.dialect
                .insert_view_metadata_sql(view, metadata, namespace.as_deref()),
            self.dialect
                .delete_view_metadata_sql(view, metadata, namespace.as_deref()),
        );
        self.apply(&plan).await?;

        self.cache
            .put_view(self.cache_key(&view.name).await?, view.clone());
        Ok(view.clone())
    }

    /// Drops the view called `name` and its registry row.
    pub async fn drop_view(&self, name: &str) -> Result<()> {
        info!(view = %name, "Dropping view");
        let view = self.get_view(name).await?;
        let namespace = self.view_namespace(&view).await?;
        let metadata = &self.config.metadata_table;

        let mut plan = Plan::new();
        plan.push(
            self.dialect
                .delete_view_metadata_sql(&view, metadata, namespace.as_deref()),
            self.dialect
                .insert_view_metadata_sql(&view, metadata, namespace.as_deref()),
        );
        plan.push(
            self.dialect.drop_view_sql(&view),
            self.dialect.create_view_sql(&view),
        );
        self.apply(&plan).await?;

        self.cache.remove_view(&self.cache_key(name).await?);
        Ok(())
    }

    /// Returns the view, loading it from the registry on a cache miss.
    pub async fn get_view(&self, name: &str) -> Result<View> {
        let key = self.cache_key(name).await?;
        if let Some(view) = self.cache.view(&key) {
            return Ok(view);
        }
        self.load_views(&[name.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReconcileError::ObjectNotFound {
                kind: ObjectKind::View,
                name: name.to_string(),
                table: None,
            })
    }

    /// Namespace recorded in the registry row: the view's own, or the
    /// current one.
    async fn view_namespace(&self, view: &View) -> Result<Option<String>> {
        let namespace = match split_qualified(&view.name).0 {
            Some(namespace) => namespace.to_string(),
            None => self.namespace().await?,
        };
        Ok((!namespace.is_empty()).then_some(namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::executor::{DatabaseContext, MemoryExecutor};
    use crate::statement::Scalar;

    fn postgres() -> SchemaEngine<PostgresDialect, MemoryExecutor> {
        SchemaEngine::new(
            PostgresDialect::default(),
            MemoryExecutor::new()
                .with_context(DatabaseContext::new(None, Some("public".to_string()))),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_and_drop_view() {
        let engine = postgres();
        let view = View::new("active_users", "SELECT * FROM \"users\" WHERE \"active\"");
        engine.create_view(&view).await.unwrap();

        let statements = engine.executor().statements();
        assert_eq!(
            statements[0].sql,
            "CREATE VIEW \"active_users\" AS SELECT * FROM \"users\" WHERE \"active\""
        );
        assert!(statements[1].sql.starts_with("INSERT INTO \"oxide_metadata\""));
        assert_eq!(statements[1].params[0], Scalar::from("VIEW"));
        assert_eq!(statements[1].params[1], Scalar::from("public"));
        assert_eq!(engine.cache().view("public.active_users"), Some(view));

        engine.executor().clear_log();
        engine.drop_view("active_users").await.unwrap();
        let sql = engine.executor().executed_sql();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("DELETE FROM \"oxide_metadata\""));
        assert_eq!(sql[1], "DROP VIEW \"active_users\"");
        assert_eq!(engine.cache().view("public.active_users"), None);
    }

    #[tokio::test]
    async fn test_materialized_view_gated_on_mysql() {
        let engine = SchemaEngine::new(
            MySqlDialect::default(),
            MemoryExecutor::new(),
            EngineConfig::default(),
        );
        let err = engine
            .create_view(&View::new("totals", "SELECT 1").materialized())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UnsupportedOperation { .. }));
        assert!(engine.executor().executed_sql().is_empty());
    }

    #[tokio::test]
    async fn test_failed_registry_insert_drops_view() {
        let engine = postgres();
        engine.executor().fail_on("INSERT INTO");
        let err = engine
            .create_view(&View::new("totals", "SELECT 1").materialized())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::PartialApply { applied: 1, .. }));
        assert_eq!(
            engine.executor().executed_sql().last().map(String::as_str),
            Some("DROP MATERIALIZED VIEW \"totals\"")
        );
        assert_eq!(engine.cache().view("public.totals"), None);
    }

    #[tokio::test]
    async fn test_get_view_missing() {
        let engine = postgres();
        let err = engine.get_view("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::ObjectNotFound {
                kind: ObjectKind::View,
                ..
            }
        ));
    }
}
