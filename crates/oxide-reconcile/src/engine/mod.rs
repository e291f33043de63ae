//! Change operations.
//!
//! [`SchemaEngine`] turns one structural intent (add a column, rename a
//! table, drop an index) into a [`Plan`] of paired up/down statements, runs
//! it through the [`Coordinator`], and only then replaces the cached table
//! with the mutated copy. A failed plan leaves the cache untouched.

mod clear;
mod column;
mod keys;
mod table;
mod view;

pub use table::{CreateTableOptions, DropTableOptions};

use std::sync::OnceLock;

use tracing::{debug, info};

use crate::cache::SchemaCache;
use crate::config::EngineConfig;
use crate::coordinator::Coordinator;
use crate::dialect::{normalize_table, Dialect};
use crate::error::{ReconcileError, Result};
use crate::executor::{DatabaseContext, QueryExecutor};
use crate::naming::{DefaultNamingStrategy, NameKind, NamingStrategy};
use crate::schema::{qualify, split_qualified, Column, Table, View};
use crate::statement::Plan;

/// A table given either by name or as an object-model instance.
#[derive(Debug, Clone, Copy)]
pub enum TableRef<'a> {
    /// Qualified or bare name, resolved through the cache.
    Name(&'a str),
    /// Instance used as the current state.
    Table(&'a Table),
}

impl<'a> From<&'a str> for TableRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for TableRef<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a Table> for TableRef<'a> {
    fn from(table: &'a Table) -> Self {
        Self::Table(table)
    }
}

impl TableRef<'_> {
    /// Name of the referenced table.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Table(table) => &table.name,
        }
    }
}

/// Dialect-aware schema reconciliation over one connection.
///
/// ```
/// # tokio_test::block_on(async {
/// use oxide_reconcile::prelude::*;
///
/// let engine = SchemaEngine::new(
///     PostgresDialect::default(),
///     MemoryExecutor::new(),
///     EngineConfig::new(),
/// );
/// engine.enable_sql_memory();
///
/// let users = Table::new("users").column(Column::new("id", "integer").primary());
/// engine.create_table(&users, CreateTableOptions::default()).await.unwrap();
///
/// let plan = engine.take_sql_memory();
/// assert!(plan.up_statements()[0].sql.starts_with("CREATE TABLE \"users\""));
/// # });
/// ```
pub struct SchemaEngine<D: Dialect, E: QueryExecutor> {
    dialect: D,
    executor: E,
    naming: Box<dyn NamingStrategy>,
    config: EngineConfig,
    cache: SchemaCache,
    coordinator: Coordinator,
    context: OnceLock<DatabaseContext>,
}

impl<D: Dialect, E: QueryExecutor> SchemaEngine<D, E> {
    /// Creates an engine using [`DefaultNamingStrategy`].
    pub fn new(dialect: D, executor: E, config: EngineConfig) -> Self {
        let naming = Box::new(DefaultNamingStrategy::new(config.max_identifier_length));
        Self {
            dialect,
            executor,
            naming,
            config,
            cache: SchemaCache::new(),
            coordinator: Coordinator::new(),
            context: OnceLock::new(),
        }
    }

    /// Replaces the naming strategy.
    #[must_use]
    pub fn with_naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the table and view cache.
    #[must_use]
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Derives a name through the naming strategy.
    #[must_use]
    pub fn name_for(
        &self,
        kind: NameKind,
        table: &str,
        columns: &[String],
        extra: Option<&str>,
    ) -> String {
        self.naming.name_for(kind, table, columns, extra)
    }

    /// The connection's current database and schema, fetched once.
    pub async fn database_context(&self) -> Result<DatabaseContext> {
        if let Some(context) = self.context.get() {
            return Ok(context.clone());
        }
        let context = self.executor.current_database_context().await?;
        Ok(self.context.get_or_init(|| context).clone())
    }

    /// Namespace unqualified names resolve into.
    pub(crate) async fn namespace(&self) -> Result<String> {
        if let Some(namespace) = self.dialect.default_namespace() {
            return Ok(namespace.to_string());
        }
        let context = self.database_context().await?;
        Ok(context.schema.or(context.database).unwrap_or_default())
    }

    /// Fully qualified cache key for `name`.
    pub(crate) async fn cache_key(&self, name: &str) -> Result<String> {
        let (namespace, bare) = split_qualified(name);
        let namespace = match namespace {
            Some(ns) => ns.to_string(),
            None => self.namespace().await?,
        };
        if namespace.is_empty() {
            Ok(bare.to_string())
        } else {
            Ok(qualify(Some(&namespace), bare))
        }
    }

    /// Fails before any round trip when the dialect lacks a capability.
    pub(crate) fn require(&self, supported: bool, operation: &'static str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(ReconcileError::UnsupportedOperation {
                dialect: self.dialect.name(),
                operation,
            })
        }
    }

    /// Resolves a table reference to its cache key and current state.
    pub(crate) async fn resolve(&self, target: TableRef<'_>) -> Result<(String, Table)> {
        let mut table = match target {
            TableRef::Table(table) => table.clone(),
            TableRef::Name(name) => self.get_table(name).await?,
        };
        normalize_table(
            &mut table,
            &self.dialect.capabilities(),
            self.naming.as_ref(),
        );
        let key = self.cache_key(&table.name).await?;
        Ok((key, table))
    }

    /// Runs `plan` through the coordinator.
    pub(crate) async fn apply(&self, plan: &Plan) -> Result<()> {
        debug!(statements = plan.len(), "Applying plan");
        self.coordinator
            .apply(&self.dialect, &self.executor, plan, self.config.atomic)
            .await
    }

    /// Applies `plan`, then replaces the cache entry with `table`.
    pub(crate) async fn commit(&self, key: String, plan: &Plan, table: Table) -> Result<Table> {
        self.apply(plan).await?;
        self.cache.put_table(key, table.clone());
        Ok(table)
    }

    /// Applies `plan`, then merges `mutate` into the current cache entry so
    /// that concurrent commits on one table compose.
    pub(crate) async fn commit_merge<F>(
        &self,
        key: String,
        plan: &Plan,
        base: Table,
        mutate: F,
    ) -> Result<Table>
    where
        F: Fn(&mut Table),
    {
        self.apply(plan).await?;
        if let Some(table) = self.cache.update_table(&key, &mutate) {
            return Ok(table);
        }
        let mut table = base;
        mutate(&mut table);
        self.cache.put_table(key, table.clone());
        Ok(table)
    }

    /// Returns the table, loading it on a cache miss.
    pub async fn get_table(&self, name: &str) -> Result<Table> {
        let key = self.cache_key(name).await?;
        if let Some(table) = self.cache.table(&key) {
            return Ok(table);
        }
        let context = self.database_context().await?;
        let table = self
            .dialect
            .load_tables(&self.executor, &context, &[name.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReconcileError::table_not_found(name))?;
        self.cache.put_table(key, table.clone());
        Ok(table)
    }

    /// Loads tables from the catalog and caches them.
    pub async fn load_tables(&self, names: &[String]) -> Result<Vec<Table>> {
        let context = self.database_context().await?;
        let tables = self
            .dialect
            .load_tables(&self.executor, &context, names)
            .await?;
        for table in &tables {
            self.cache
                .put_table(self.cache_key(&table.name).await?, table.clone());
        }
        Ok(tables)
    }

    /// Loads views recorded in the registry and caches them.
    pub async fn load_views(&self, names: &[String]) -> Result<Vec<View>> {
        let context = self.database_context().await?;
        let views = self
            .dialect
            .load_views(&self.executor, &context, names, &self.config.metadata_table)
            .await?;
        for view in &views {
            self.cache
                .put_view(self.cache_key(&view.name).await?, view.clone());
        }
        Ok(views)
    }

    /// Whether the table has the column on the server.
    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let context = self.database_context().await?;
        self.dialect
            .has_column(&self.executor, &context, table, column)
            .await
    }

    /// Opens a caller-managed transaction.
    pub async fn start_transaction(&self) -> Result<()> {
        self.coordinator
            .start_transaction(&self.dialect, &self.executor)
            .await
    }

    /// Commits the caller-managed transaction.
    pub async fn commit_transaction(&self) -> Result<()> {
        self.coordinator
            .commit_transaction(&self.dialect, &self.executor)
            .await
    }

    /// Rolls back the caller-managed transaction.
    pub async fn rollback_transaction(&self) -> Result<()> {
        self.coordinator
            .rollback_transaction(&self.dialect, &self.executor)
            .await
    }

    /// Whether a caller-managed transaction is open.
    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.coordinator.is_transaction_active()
    }

    /// Records plans instead of executing them. The cache is still updated,
    /// so a whole session can be previewed.
    pub fn enable_sql_memory(&self) {
        self.coordinator.enable_sql_memory();
    }

    /// Stops recording and discards the recording.
    pub fn disable_sql_memory(&self) {
        self.coordinator.disable_sql_memory();
    }

    /// Returns what was recorded so far and starts a fresh recording.
    pub fn take_sql_memory(&self) -> Plan {
        self.coordinator.take_sql_memory()
    }

    /// Creates the view registry table if it is missing.
    pub async fn ensure_metadata_table(&self) -> Result<()> {
        let mut plan = Plan::new();
        plan.push_up(
            self.dialect
                .create_metadata_table_sql(&self.config.metadata_table),
        );
        self.apply(&plan).await
    }

    /// Creates a schema (Postgres) or database (MySQL).
    pub async fn create_schema(&self, name: &str, if_not_exists: bool) -> Result<()> {
        info!(namespace = %name, "Creating namespace");
        let mut plan = Plan::new();
        plan.push(
            self.dialect.create_namespace_sql(name, if_not_exists),
            self.dialect.drop_namespace_sql(name, true, false),
        );
        self.apply(&plan).await
    }

    /// Drops a schema (Postgres) or database (MySQL).
    pub async fn drop_schema(&self, name: &str, if_exists: bool, cascade: bool) -> Result<()> {
        info!(namespace = %name, "Dropping namespace");
        let mut plan = Plan::new();
        plan.push(
            self.dialect.drop_namespace_sql(name, if_exists, cascade),
            self.dialect.create_namespace_sql(name, true),
        );
        self.apply(&plan).await?;
        self.cache.clear(Some(name));
        Ok(())
    }

    /// The name an object should take after a rename, when its current name
    /// is still the one derived for the old state. `None` for explicitly
    /// named objects and for names that do not change.
    #[allow(clippy::too_many_arguments)]
    fn rederived(
        &self,
        kind: NameKind,
        before: &Table,
        old_columns: &[String],
        after: &Table,
        new_columns: &[String],
        extra: Option<&str>,
        current: &str,
    ) -> Option<String> {
        if current != self.name_for(kind, &before.name, old_columns, extra) {
            return None;
        }
        let renamed = self.name_for(kind, &after.name, new_columns, extra);
        (renamed != current).then_some(renamed)
    }

    /// Renames every constraint and index of `after` whose name was derived
    /// from `before`.
    ///
    /// `after` is `before` with the table renamed or a column reference
    /// rewritten; both list their objects in the same order. The rename
    /// statements run after the table or column rename itself, so they are
    /// rendered against `after`.
    pub(crate) fn cascade_renames(&self, plan: &mut Plan, before: &Table, after: &mut Table) {
        for i in 0..before.uniques.len() {
            let old = &before.uniques[i];
            let Some(renamed) = self.rederived(
                NameKind::Unique,
                before,
                &old.columns,
                after,
                &after.uniques[i].columns,
                None,
                &old.name,
            ) else {
                continue;
            };
            plan.push(
                self.dialect.rename_constraint_sql(after, &old.name, &renamed),
                self.dialect.rename_constraint_sql(after, &renamed, &old.name),
            );
            after.uniques[i].name = renamed;
        }

        for i in 0..before.indices.len() {
            let old = &before.indices[i];
            let new_columns = after.indices[i].columns.clone();
            let renamed = self
                .rederived(
                    NameKind::Index,
                    before,
                    &old.columns,
                    after,
                    &new_columns,
                    old.predicate.as_deref(),
                    &old.name,
                )
                .or_else(|| {
                    old.is_unique
                        .then(|| {
                            self.rederived(
                                NameKind::Unique,
                                before,
                                &old.columns,
                                after,
                                &new_columns,
                                None,
                                &old.name,
                            )
                        })
                        .flatten()
                });
            let Some(renamed) = renamed else {
                continue;
            };
            let current = after.indices[i].clone();
            let mut moved = current.clone();
            moved.name = renamed.clone();
            plan.push(
                self.dialect.rename_index_sql(after, &current, &renamed),
                self.dialect.rename_index_sql(after, &moved, &old.name),
            );
            after.indices[i].name = renamed;
        }

        for i in 0..before.foreign_keys.len() {
            let old = &before.foreign_keys[i];
            let Some(renamed) = self.rederived(
                NameKind::ForeignKey,
                before,
                &old.columns,
                after,
                &after.foreign_keys[i].columns,
                None,
                &old.name,
            ) else {
                continue;
            };
            let current = after.foreign_keys[i].clone();
            let mut moved = current.clone();
            moved.name = renamed.clone();
            plan.push(
                self.dialect
                    .rename_foreign_key_sql(after, &current, &renamed),
                self.dialect.rename_foreign_key_sql(after, &moved, &old.name),
            );
            after.foreign_keys[i].name = renamed;
        }

        for i in 0..before.checks.len() {
            let old = &before.checks[i];
            let Some(renamed) = self.rederived(
                NameKind::Check,
                before,
                &old.columns,
                after,
                &after.checks[i].columns,
                Some(&old.expression),
                &old.name,
            ) else {
                continue;
            };
            plan.push(
                self.dialect.rename_constraint_sql(after, &old.name, &renamed),
                self.dialect.rename_constraint_sql(after, &renamed, &old.name),
            );
            after.checks[i].name = renamed;
        }

        for i in 0..before.exclusions.len() {
            let old = &before.exclusions[i];
            let Some(renamed) = self.rederived(
                NameKind::Exclusion,
                before,
                &[],
                after,
                &[],
                Some(&old.expression),
                &old.name,
            ) else {
                continue;
            };
            plan.push(
                self.dialect.rename_constraint_sql(after, &old.name, &renamed),
                self.dialect.rename_constraint_sql(after, &renamed, &old.name),
            );
            after.exclusions[i].name = renamed;
        }
    }

    /// Renames the named enum type backing `old_column` of `before` to the
    /// name derived for `new_column` of `after`.
    pub(crate) async fn plan_enum_rename(
        &self,
        plan: &mut Plan,
        before: &Table,
        old_column: &Column,
        after: &Table,
        new_column: &Column,
    ) -> Result<()> {
        let Some(enums) = self.dialect.enum_types() else {
            return Ok(());
        };
        let context = self.database_context().await?;
        let new_name = enums.enum_type_name(after, new_column, false);
        let (namespace, current) = match self
            .dialect
            .current_enum_type(&self.executor, &context, before, old_column)
            .await?
        {
            Some(qualified) => {
                let (namespace, bare) = split_qualified(&qualified);
                (namespace.map(str::to_string), bare.to_string())
            }
            None => (
                before.schema_and_name().0.map(str::to_string),
                enums.enum_type_name(before, old_column, false),
            ),
        };
        if current == new_name {
            return Ok(());
        }
        let current_path = self
            .dialect
            .escape_path(&qualify(namespace.as_deref(), &current));
        let renamed_path = self
            .dialect
            .escape_path(&qualify(namespace.as_deref(), &new_name));
        plan.push(
            enums.rename_enum_type_sql(&current_path, &new_name),
            enums.rename_enum_type_sql(&renamed_path, &current),
        );
        Ok(())
    }

    /// Replaces the primary key of `before` with the one of `after`.
    ///
    /// When `release` names an auto-increment column, the dialect's release
    /// statement runs first and, with `restore`, its restore statement runs
    /// last.
    pub(crate) fn plan_primary_key_change(
        &self,
        plan: &mut Plan,
        before: &Table,
        after: &Table,
        release: Option<&Column>,
        restore: bool,
    ) {
        let released = release.and_then(|column| self.dialect.auto_increment_release(before, column));
        if let Some((release, restore)) = &released {
            plan.push(release.clone(), restore.clone());
        }

        let old_columns = before.primary_column_names();
        if !old_columns.is_empty() {
            let name = self.name_for(NameKind::PrimaryKey, &before.name, &old_columns, None);
            plan.push(
                self.dialect.drop_primary_key_sql(before, &name),
                self.dialect
                    .create_primary_key_sql(before, &name, &old_columns),
            );
        }

        let new_columns = after.primary_column_names();
        if !new_columns.is_empty() {
            let name = self.name_for(NameKind::PrimaryKey, &after.name, &new_columns, None);
            plan.push(
                self.dialect
                    .create_primary_key_sql(after, &name, &new_columns),
                self.dialect.drop_primary_key_sql(after, &name),
            );
        }

        if let (Some((release, restore_sql)), true) = (released, restore) {
            plan.push(restore_sql, release);
        }
    }
}
