//! Table-level operations.

use tracing::info;

use super::{SchemaEngine, TableRef};
use crate::dialect::{normalize_table, Dialect};
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::naming::NameKind;
use crate::schema::{qualify, split_qualified, Table};
use crate::statement::Plan;

/// Options for [`SchemaEngine::create_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Succeed without changes when the table already exists.
    pub if_not_exists: bool,
    /// Declare the table's foreign keys.
    pub create_foreign_keys: bool,
    /// Create the table's declared indices.
    pub create_indices: bool,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self {
            if_not_exists: false,
            create_foreign_keys: true,
            create_indices: true,
        }
    }
}

impl CreateTableOptions {
    /// Sets `if_not_exists`.
    #[must_use]
    pub fn if_not_exists(mut self, enabled: bool) -> Self {
        self.if_not_exists = enabled;
        self
    }

    /// Sets `create_foreign_keys`.
    #[must_use]
    pub fn create_foreign_keys(mut self, enabled: bool) -> Self {
        self.create_foreign_keys = enabled;
        self
    }

    /// Sets `create_indices`.
    #[must_use]
    pub fn create_indices(mut self, enabled: bool) -> Self {
        self.create_indices = enabled;
        self
    }
}

/// Options for [`SchemaEngine::drop_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTableOptions {
    /// Succeed without changes when the table does not exist.
    pub if_exists: bool,
    /// Drop the foreign keys before the table.
    pub drop_foreign_keys: bool,
    /// Drop the indices before the table.
    pub drop_indices: bool,
}

impl Default for DropTableOptions {
    fn default() -> Self {
        Self {
            if_exists: false,
            drop_foreign_keys: true,
            drop_indices: true,
        }
    }
}

impl DropTableOptions {
    /// Sets `if_exists`.
    #[must_use]
    pub fn if_exists(mut self, enabled: bool) -> Self {
        self.if_exists = enabled;
        self
    }

    /// Sets `drop_foreign_keys`.
    #[must_use]
    pub fn drop_foreign_keys(mut self, enabled: bool) -> Self {
        self.drop_foreign_keys = enabled;
        self
    }

    /// Sets `drop_indices`.
    #[must_use]
    pub fn drop_indices(mut self, enabled: bool) -> Self {
        self.drop_indices = enabled;
        self
    }
}

impl<D: Dialect, E: QueryExecutor> SchemaEngine<D, E> {
    /// Whether the table exists on the server.
    pub async fn has_table(&self, name: &str) -> Result<bool> {
        let context = self.database_context().await?;
        self.dialect.has_table(&self.executor, &context, name).await
    }

    /// Creates a table with its enum types, comments and indices.
    pub async fn create_table(&self, table: &Table, options: CreateTableOptions) -> Result<Table> {
        info!(table = %table.name, "Creating table");
        table.validate()?;
        let capabilities = self.dialect.capabilities();
        if !table.checks.is_empty() {
            self.require(capabilities.check_constraints, "check constraints")?;
        }
        if !table.exclusions.is_empty() {
            self.require(capabilities.exclusion_constraints, "exclusion constraints")?;
        }

        if options.if_not_exists && self.has_table(&table.name).await? {
            return self.get_table(&table.name).await;
        }

        let mut table = table.clone();
        if !options.create_indices {
            table.indices.clear();
        }
        normalize_table(&mut table, &capabilities, self.naming.as_ref());
        let key = self.cache_key(&table.name).await?;
        let primary_key = self.name_for(
            NameKind::PrimaryKey,
            &table.name,
            &table.primary_column_names(),
            None,
        );

        let mut plan = Plan::new();
        if let Some(enums) = self.dialect.enum_types() {
            let context = self.database_context().await?;
            let mut created = Vec::new();
            for column in table.columns.iter().filter(|c| c.is_enum()) {
                let path = enums.enum_type_path(&table, column, false);
                if created.contains(&path)
                    || self
                        .dialect
                        .enum_type_exists(&self.executor, &context, &table, column)
                        .await?
                {
                    continue;
                }
                plan.push(
                    enums.create_enum_type_sql(&path, &column.enum_values),
                    enums.drop_enum_type_sql(&path),
                );
                created.push(path);
            }
        }

        plan.push(
            self.dialect
                .create_table_sql(&table, &primary_key, options.create_foreign_keys),
            self.dialect.drop_table_sql(&table.name),
        );

        for column in &table.columns {
            if let Some(comment) = column
                .comment
                .as_deref()
                .and_then(|c| self.dialect.column_comment_sql(&table, &column.name, Some(c)))
            {
                plan.push_up(comment);
            }
        }

        if !capabilities.inline_indices {
            for index in &table.indices {
                plan.push(
                    self.dialect.create_index_sql(&table, index),
                    self.dialect.drop_index_sql(&table, index),
                );
            }
        }

        if !options.create_foreign_keys {
            table.foreign_keys.clear();
        }
        self.commit(key, &plan, table).await
    }

    /// Drops a table, its indices first and then its foreign keys.
    pub async fn drop_table(&self, target: TableRef<'_>, options: DropTableOptions) -> Result<()> {
        info!(table = %target.name(), "Dropping table");
        if options.if_exists && !self.has_table(target.name()).await? {
            return Ok(());
        }
        let (key, table) = self.resolve(target).await?;
        let capabilities = self.dialect.capabilities();

        let mut plan = Plan::new();
        if options.drop_indices && !capabilities.inline_indices {
            for index in &table.indices {
                plan.push(
                    self.dialect.drop_index_sql(&table, index),
                    self.dialect.create_index_sql(&table, index),
                );
            }
        }
        if options.drop_foreign_keys {
            for fk in &table.foreign_keys {
                plan.push(
                    self.dialect.drop_foreign_key_sql(&table, fk),
                    self.dialect.create_foreign_key_sql(&table, fk),
                );
            }
        }

        let primary_key = self.name_for(
            NameKind::PrimaryKey,
            &table.name,
            &table.primary_column_names(),
            None,
        );
        // The restored table carries its foreign keys inline only when they
        // were not dropped separately.
        plan.push(
            self.dialect.drop_table_sql(&table.name),
            self.dialect
                .create_table_sql(&table, &primary_key, !options.drop_foreign_keys),
        );

        self.apply(&plan).await?;
        self.cache.remove_table(&key);
        Ok(())
    }

    /// Renames a table together with every object whose name was derived
    /// from the old table name.
    pub async fn rename_table(&self, target: TableRef<'_>, new_name: &str) -> Result<Table> {
        info!(table = %target.name(), new_name = %new_name, "Renaming table");
        let (old_key, old) = self.resolve(target).await?;
        let (namespace, _) = old.schema_and_name();
        let (_, new_bare) = split_qualified(new_name);

        let mut new = old.clone();
        new.name = qualify(namespace, new_bare);

        let mut plan = Plan::new();
        plan.push(
            self.dialect.rename_table_sql(&old.name, new_bare),
            self.dialect.rename_table_sql(&new.name, old.bare_name()),
        );

        let primary = old.primary_column_names();
        if self.dialect.capabilities().named_primary_key && !primary.is_empty() {
            let old_pk = self.name_for(NameKind::PrimaryKey, &old.name, &primary, None);
            let new_pk = self.name_for(NameKind::PrimaryKey, &new.name, &primary, None);
            if old_pk != new_pk {
                plan.push(
                    self.dialect.rename_constraint_sql(&new, &old_pk, &new_pk),
                    self.dialect.rename_constraint_sql(&new, &new_pk, &old_pk),
                );
            }
        }

        if let (Some(sequences), Some(column)) = (self.dialect.sequences(), old.increment_column()) {
            plan.push_pair(sequences.rename_sequence_sql(&old, &column.name, &new, &column.name));
        }

        self.cascade_renames(&mut plan, &old, &mut new);

        for column in old.columns.iter().filter(|c| c.is_enum()) {
            self.plan_enum_rename(&mut plan, &old, column, &new, column)
                .await?;
        }

        let new_key = self.cache_key(&new.name).await?;
        self.apply(&plan).await?;
        self.cache.remove_table(&old_key);
        self.cache.put_table(new_key, new.clone());
        Ok(new)
    }

    /// Deletes every row of the table.
    pub async fn clear_table(&self, name: &str) -> Result<()> {
        info!(table = %name, "Clearing table");
        let mut plan = Plan::new();
        plan.push_up(self.dialect.truncate_sql(name));
        self.apply(&plan).await
    }

    /// Renders the `CREATE TABLE` statement for the table, foreign keys
    /// included.
    pub async fn table_ddl(&self, target: TableRef<'_>) -> Result<String> {
        let (_, table) = self.resolve(target).await?;
        let primary_key = self.name_for(
            NameKind::PrimaryKey,
            &table.name,
            &table.primary_column_names(),
            None,
        );
        Ok(self.dialect.create_table_sql(&table, &primary_key, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::error::ReconcileError;
    use crate::executor::{DatabaseContext, MemoryExecutor};
    use crate::schema::{Check, Column, ForeignKey, GenerationStrategy, Index};

    fn postgres() -> SchemaEngine<PostgresDialect, MemoryExecutor> {
        SchemaEngine::new(
            PostgresDialect::default(),
            MemoryExecutor::new()
                .with_context(DatabaseContext::new(None, Some("public".to_string()))),
            EngineConfig::default(),
        )
    }

    fn mysql() -> SchemaEngine<MySqlDialect, MemoryExecutor> {
        SchemaEngine::new(
            MySqlDialect::default(),
            MemoryExecutor::new().with_context(DatabaseContext::new(Some("shop".to_string()), None)),
            EngineConfig::default(),
        )
    }

    fn posts() -> Table {
        Table::new("posts")
            .column(
                Column::new("id", "integer")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(
                Column::new("status", "enum")
                    .enumeration(["draft", "live"])
                    .comment("publication state"),
            )
            .column(Column::new("author_id", "integer"))
            .index(Index::new(["author_id"]))
            .foreign_key(ForeignKey::new(["author_id"], "users", ["id"]))
    }

    #[tokio::test]
    async fn test_create_table_postgres() {
        let engine = postgres();
        let table = engine
            .create_table(&posts(), CreateTableOptions::default())
            .await
            .unwrap();

        let sql = engine.executor().executed_sql();
        let ddl: Vec<&String> = sql.iter().filter(|s| !s.starts_with("SELECT")).collect();
        assert_eq!(
            ddl,
            vec![
                "CREATE TYPE \"posts_status_enum\" AS ENUM('draft', 'live')",
                "CREATE TABLE \"posts\" (\"id\" SERIAL NOT NULL, \"status\" \"posts_status_enum\", \
                 \"author_id\" integer, CONSTRAINT \"posts_author_id_fkey\" FOREIGN KEY (\"author_id\") \
                 REFERENCES \"users\" (\"id\"), CONSTRAINT \"posts_pkey\" PRIMARY KEY (\"id\"))",
                "COMMENT ON COLUMN \"posts\".\"status\" IS 'publication state'",
                "CREATE INDEX \"posts_author_id_idx\" ON \"posts\" (\"author_id\")",
            ]
        );
        assert_eq!(table.indices[0].name, "posts_author_id_idx");
        assert_eq!(engine.cache().table("public.posts"), Some(table));
    }

    #[tokio::test]
    async fn test_create_table_without_indices_or_foreign_keys() {
        let engine = mysql();
        let table = engine
            .create_table(
                &posts(),
                CreateTableOptions::default()
                    .create_indices(false)
                    .create_foreign_keys(false),
            )
            .await
            .unwrap();
        assert!(table.indices.is_empty());
        assert!(table.foreign_keys.is_empty());
        assert_eq!(
            engine.executor().executed_sql(),
            vec![
                "CREATE TABLE `posts` (`id` integer NOT NULL AUTO_INCREMENT, \
                 `status` enum ('draft', 'live') NULL COMMENT 'publication state', \
                 `author_id` integer NULL, PRIMARY KEY (`id`)) ENGINE=InnoDB"
            ]
        );
    }

    #[tokio::test]
    async fn test_create_table_rejects_checks_without_io() {
        let engine = mysql();
        let table = posts().check(Check::new("`id` > 0"));
        let err = engine
            .create_table(&table, CreateTableOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UnsupportedOperation { .. }));
        assert!(engine.executor().statements().is_empty());
    }

    #[tokio::test]
    async fn test_drop_table_orders_dependents_first() {
        let engine = postgres();
        let table = engine
            .create_table(&posts(), CreateTableOptions::default())
            .await
            .unwrap();
        engine.executor().clear_log();

        engine
            .drop_table(TableRef::Name("posts"), DropTableOptions::default())
            .await
            .unwrap();
        let sql = engine.executor().executed_sql();
        assert_eq!(
            sql,
            vec![
                "DROP INDEX \"posts_author_id_idx\"",
                "ALTER TABLE \"posts\" DROP CONSTRAINT \"posts_author_id_fkey\"",
                "DROP TABLE \"posts\"",
            ]
        );
        assert!(engine.cache().table("public.posts").is_none());
        assert_eq!(table.name, "posts");
    }

    #[tokio::test]
    async fn test_drop_table_if_exists_skips_missing() {
        let engine = postgres();
        engine
            .drop_table(TableRef::Name("ghost"), DropTableOptions::default().if_exists(true))
            .await
            .unwrap();
        let sql = engine.executor().executed_sql();
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("SELECT 1 FROM \"information_schema\".\"tables\""));
    }

    #[tokio::test]
    async fn test_rename_table_cascades() {
        let engine = postgres();
        engine
            .create_table(&posts(), CreateTableOptions::default())
            .await
            .unwrap();
        engine.executor().clear_log();

        let renamed = engine
            .rename_table(TableRef::Name("posts"), "articles")
            .await
            .unwrap();
        let ddl: Vec<String> = engine
            .executor()
            .executed_sql()
            .into_iter()
            .filter(|s| !s.starts_with("SELECT"))
            .collect();
        assert_eq!(
            ddl,
            vec![
                "ALTER TABLE \"posts\" RENAME TO \"articles\"",
                "ALTER TABLE \"articles\" RENAME CONSTRAINT \"posts_pkey\" TO \"articles_pkey\"",
                "ALTER SEQUENCE \"posts_id_seq\" RENAME TO \"articles_id_seq\"",
                "ALTER INDEX \"posts_author_id_idx\" RENAME TO \"articles_author_id_idx\"",
                "ALTER TABLE \"articles\" RENAME CONSTRAINT \"posts_author_id_fkey\" TO \"articles_author_id_fkey\"",
                "ALTER TYPE \"posts_status_enum\" RENAME TO \"articles_status_enum\"",
            ]
        );
        assert_eq!(renamed.indices[0].name, "articles_author_id_idx");
        assert_eq!(renamed.foreign_keys[0].name, "articles_author_id_fkey");
        assert!(engine.cache().table("public.posts").is_none());
        assert!(engine.cache().table("public.articles").is_some());
    }

    #[tokio::test]
    async fn test_rename_table_failure_keeps_cache() {
        let engine = mysql();
        let created = engine
            .create_table(&posts(), CreateTableOptions::default())
            .await
            .unwrap();
        engine.executor().fail_on("DROP FOREIGN KEY `posts_author_id_fkey`, ADD CONSTRAINT");

        let err = engine
            .rename_table(TableRef::Name("posts"), "articles")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::PartialApply { .. }));
        assert_eq!(engine.cache().table("shop.posts"), Some(created));
        assert!(engine.cache().table("shop.articles").is_none());
        assert_eq!(
            engine.executor().executed_sql().last().map(String::as_str),
            Some("RENAME TABLE `articles` TO `posts`")
        );
    }

    #[tokio::test]
    async fn test_clear_table() {
        let engine = mysql();
        engine.clear_table("shop.posts").await.unwrap();
        assert_eq!(
            engine.executor().executed_sql(),
            vec!["TRUNCATE TABLE `shop`.`posts`"]
        );
    }

    #[tokio::test]
    async fn test_table_ddl_runs_nothing() {
        let engine = mysql();
        let table = Table::new("tags").column(Column::new("id", "integer").primary());
        let ddl = engine.table_ddl(TableRef::Table(&table)).await.unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE `tags` (`id` integer NOT NULL, PRIMARY KEY (`id`)) ENGINE=InnoDB"
        );
        assert!(engine.executor().executed_sql().is_empty());
    }
}
