//! Column operations.
//!
//! A column change is broken into phases that each emit their own paired
//! statements: re-creation when the type changes, rename with its cascades,
//! in-place alteration, primary key membership, uniqueness and generation.

use tracing::info;

use super::{SchemaEngine, TableRef};
use crate::config::ColumnChangePolicy;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::naming::NameKind;
use crate::schema::{Column, GenerationStrategy, Index, Table, Unique};
use crate::statement::{Plan, Statement};

impl<D: Dialect, E: QueryExecutor> SchemaEngine<D, E> {
    /// Adds a column, with its enum type, key membership and single-column
    /// index or uniqueness.
    pub async fn add_column(&self, target: TableRef<'_>, column: &Column) -> Result<Table> {
        info!(table = %target.name(), column = %column.name, "Adding column");
        let (key, table) = self.resolve(target).await?;
        let capabilities = self.dialect.capabilities();
        let mut after = table.clone();
        after.columns.retain(|c| c.name != column.name);
        let before = after.clone();

        let mut plan = Plan::new();
        if column.is_enum() {
            if let Some(enums) = self.dialect.enum_types() {
                let context = self.database_context().await?;
                if !self
                    .dialect
                    .enum_type_exists(&self.executor, &context, &before, column)
                    .await?
                {
                    let path = enums.enum_type_path(&before, column, false);
                    plan.push(
                        enums.create_enum_type_sql(&path, &column.enum_values),
                        enums.drop_enum_type_sql(&path),
                    );
                }
            }
        }

        let has_primary = !before.primary_columns().is_empty();
        plan.push(
            self.dialect.add_column_sql(&before, column, has_primary),
            self.dialect.drop_column_sql(&before, &column.name),
        );
        if let Some(comment) = column
            .comment
            .as_deref()
            .and_then(|c| self.dialect.column_comment_sql(&before, &column.name, Some(c)))
        {
            plan.push_up(comment);
        }
        after.columns.push(column.clone());

        if column.is_primary && (has_primary || !capabilities.inline_primary_key_on_add) {
            self.plan_primary_key_change(&mut plan, &before, &after, before.increment_column(), true);
        }

        if let Some(index) = after.single_column_index(&column.name).cloned() {
            plan.push(
                self.dialect.create_index_sql(&after, &index),
                self.dialect.drop_index_sql(&after, &index),
            );
        } else if column.is_unique {
            self.plan_unique(&mut plan, &mut after, &column.name);
        }

        self.commit(key, &plan, after).await
    }

    /// Adds columns one after another.
    pub async fn add_columns(&self, target: TableRef<'_>, columns: &[Column]) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for column in columns {
            table = self.add_column(TableRef::Table(&table), column).await?;
        }
        Ok(table)
    }

    /// Renames a column, cascading into every object named after it.
    pub async fn rename_column(
        &self,
        target: TableRef<'_>,
        old_name: &str,
        new_name: &str,
    ) -> Result<Table> {
        let (_, table) = self.resolve(target).await?;
        let mut renamed = table.require_column(old_name)?.clone();
        renamed.name = new_name.to_string();
        self.change_column(TableRef::Table(&table), old_name, &renamed)
            .await
    }

    /// Turns column `old_name` into `new`.
    ///
    /// Type-level changes re-create the column (see [`ColumnChangePolicy`]).
    /// Everything else is altered in place: rename with cascades, then the
    /// dialect's attribute alterations, then key, uniqueness and generation
    /// changes.
    pub async fn change_column(
        &self,
        target: TableRef<'_>,
        old_name: &str,
        new: &Column,
    ) -> Result<Table> {
        info!(table = %target.name(), column = %old_name, "Changing column");
        let (key, table) = self.resolve(target).await?;
        let old = table.require_column(old_name)?.clone();

        let mut widened = old.clone();
        widened.length = new.length;
        let recreate = self.dialect.requires_recreate(&old, new);
        let in_place = recreate
            && self.config.column_change_policy == ColumnChangePolicy::AlterInPlace
            && old.is_length_change_only(new)
            && !self.dialect.requires_recreate(&widened, new);
        if recreate && !in_place {
            let dropped = self
                .drop_column(TableRef::Table(&table), &old.name)
                .await?;
            return self.add_column(TableRef::Table(&dropped), new).await;
        }

        let mut after = table.clone();
        let mut current = old.clone();
        let mut plan = Plan::new();

        if in_place {
            plan.push_pair(self.dialect.alter_column_type_sql(&after, &current, &widened));
            set_column(&mut after, &current.name, widened.clone());
            current = widened;
        }

        if new.name != current.name {
            let before = after.clone();
            let mut renamed = current.clone();
            renamed.name = new.name.clone();
            plan.push_pair(self.dialect.rename_column_sql(&before, &current, &renamed));

            set_column(&mut after, &current.name, renamed.clone());
            after.rename_column_references(&current.name, &new.name);

            if current.is_enum() {
                self.plan_enum_rename(&mut plan, &before, &current, &after, &renamed)
                    .await?;
            }
            if current.is_primary && self.dialect.capabilities().named_primary_key {
                let old_pk = self.name_for(
                    NameKind::PrimaryKey,
                    &before.name,
                    &before.primary_column_names(),
                    None,
                );
                let new_pk = self.name_for(
                    NameKind::PrimaryKey,
                    &after.name,
                    &after.primary_column_names(),
                    None,
                );
                if old_pk != new_pk {
                    plan.push(
                        self.dialect.rename_constraint_sql(&after, &old_pk, &new_pk),
                        self.dialect.rename_constraint_sql(&after, &new_pk, &old_pk),
                    );
                }
            }
            if let (Some(sequences), true) = (self.dialect.sequences(), current.is_increment()) {
                plan.push_pair(sequences.rename_sequence_sql(
                    &before,
                    &current.name,
                    &after,
                    &new.name,
                ));
            }
            self.cascade_renames(&mut plan, &before, &mut after);
            current = renamed;
        }

        let mut altered = new.clone();
        altered.is_primary = current.is_primary;
        altered.is_unique = current.is_unique;
        altered.is_generated = current.is_generated;
        altered.generation_strategy = current.generation_strategy;
        for pair in self.dialect.alter_column_sql(&after, &current, &altered) {
            plan.push_pair(pair);
        }
        set_column(&mut after, &current.name, altered.clone());
        current = altered;

        if current.is_primary != new.is_primary {
            let before = after.clone();
            if let Some(column) = after.find_column_mut(&new.name) {
                column.is_primary = new.is_primary;
            }
            let release = before.increment_column().cloned();
            self.plan_primary_key_change(&mut plan, &before, &after, release.as_ref(), true);
            current.is_primary = new.is_primary;
        }

        if current.is_unique != new.is_unique {
            if new.is_unique {
                self.plan_unique(&mut plan, &mut after, &new.name);
            } else {
                self.plan_drop_unique(&mut plan, &mut after, &new.name);
            }
        }

        let uuid = |c: &Column| c.generation_strategy == Some(GenerationStrategy::Uuid);
        if current.is_generated != new.is_generated && !uuid(new) && !uuid(&current) {
            if let Some(sequences) = self.dialect.sequences() {
                let pairs = if new.is_increment() {
                    sequences.attach_sequence_sql(&after, new)
                } else {
                    sequences.detach_sequence_sql(&after, &current)
                };
                for pair in pairs {
                    plan.push_pair(pair);
                }
            }
        }

        set_column(&mut after, &new.name, new.clone());
        self.commit(key, &plan, after).await
    }

    /// Applies `(old_name, new)` changes one after another.
    pub async fn change_columns(
        &self,
        target: TableRef<'_>,
        changes: &[(String, Column)],
    ) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for (old_name, new) in changes {
            table = self
                .change_column(TableRef::Table(&table), old_name, new)
                .await?;
        }
        Ok(table)
    }

    /// Drops a column after the key, index, check, unique and foreign keys
    /// that depend on it.
    pub async fn drop_column(&self, target: TableRef<'_>, name: &str) -> Result<Table> {
        info!(table = %target.name(), column = %name, "Dropping column");
        let (key, table) = self.resolve(target).await?;
        let column = table.require_column(name)?.clone();
        let capabilities = self.dialect.capabilities();

        let mut after = table.clone();
        after.columns.retain(|c| c.name != name);
        let mut plan = Plan::new();

        // Re-added without its auto-increment when that was released first.
        let mut restored = column.clone();
        if column.is_primary {
            let increment = table.increment_column().cloned();
            let drops_increment = increment.as_ref().is_some_and(|c| c.name == name);
            let releases = increment
                .as_ref()
                .is_some_and(|c| self.dialect.auto_increment_release(&table, c).is_some());
            if drops_increment && releases {
                restored.is_generated = false;
                restored.generation_strategy = None;
            }
            let restore = !drops_increment && !after.primary_columns().is_empty();
            self.plan_primary_key_change(&mut plan, &table, &after, increment.as_ref(), restore);
            if releases && !restore && !drops_increment {
                release_increment(&mut after, increment.as_ref());
            }
        }

        for fk in table.foreign_keys_referencing(name) {
            plan.push(
                self.dialect.drop_foreign_key_sql(&table, fk),
                self.dialect.create_foreign_key_sql(&table, fk),
            );
        }
        if let Some(index) = table.single_column_index(name) {
            plan.push(
                self.dialect.drop_index_sql(&table, index),
                self.dialect.create_index_sql(&table, index),
            );
        }
        if capabilities.check_constraints {
            if let Some(check) = table.single_column_check(name) {
                plan.push(
                    self.dialect.drop_constraint_sql(&table, &check.name),
                    self.dialect
                        .create_check_sql(&table, &check.name, &check.expression),
                );
            }
        }
        if capabilities.unique_constraints {
            if let Some(unique) = table.single_column_unique(name) {
                plan.push(
                    self.dialect.drop_constraint_sql(&table, &unique.name),
                    self.dialect.create_unique_sql(&table, unique),
                );
            }
        }

        let mut restore_column = vec![Statement::from(
            self.dialect.add_column_sql(&table, &restored, true),
        )];
        if let Some(comment) = restored
            .comment
            .as_deref()
            .and_then(|c| self.dialect.column_comment_sql(&table, name, Some(c)))
        {
            restore_column.insert(0, Statement::from(comment));
        }
        plan.push_with_downs(self.dialect.drop_column_sql(&table, name), restore_column);

        if column.is_enum() {
            if let Some(enums) = self.dialect.enum_types() {
                let context = self.database_context().await?;
                if self
                    .dialect
                    .enum_type_exists(&self.executor, &context, &table, &column)
                    .await?
                {
                    let path = enums.enum_type_path(&table, &column, false);
                    plan.push(
                        enums.drop_enum_type_sql(&path),
                        enums.create_enum_type_sql(&path, &column.enum_values),
                    );
                }
            }
        }

        let references = |columns: &[String]| columns.iter().any(|c| c == name);
        after.indices.retain(|i| !references(&i.columns));
        after.uniques.retain(|u| !references(&u.columns));
        after.checks.retain(|c| !references(&c.columns));
        after.foreign_keys.retain(|fk| !references(&fk.columns));

        self.commit(key, &plan, after).await
    }

    /// Drops columns one after another.
    pub async fn drop_columns(&self, target: TableRef<'_>, names: &[&str]) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for name in names {
            table = self.drop_column(TableRef::Table(&table), name).await?;
        }
        Ok(table)
    }

    /// Makes `column` unique: a constraint where the dialect has them, a
    /// unique index otherwise. An object already declared in the model is
    /// created as declared.
    fn plan_unique(&self, plan: &mut Plan, table: &mut Table, column: &str) {
        let columns = vec![column.to_string()];
        let name = self.name_for(NameKind::Unique, &table.name, &columns, None);
        if self.dialect.capabilities().unique_constraints {
            let unique = match table.single_column_unique(column) {
                Some(existing) => existing.clone(),
                None => {
                    let unique = Unique::new(columns).named(name);
                    table.uniques.push(unique.clone());
                    unique
                }
            };
            plan.push(
                self.dialect.create_unique_sql(table, &unique),
                self.dialect.drop_constraint_sql(table, &unique.name),
            );
        } else {
            let declared = table
                .indices
                .iter()
                .find(|i| i.is_unique && i.columns == columns)
                .cloned();
            let index = match declared {
                Some(existing) => existing,
                None => {
                    let index = Index::new(columns).named(name).unique();
                    table.indices.push(index.clone());
                    index
                }
            };
            plan.push(
                self.dialect.create_index_sql(table, &index),
                self.dialect.drop_index_sql(table, &index),
            );
        }
        if let Some(c) = table.find_column_mut(column) {
            c.is_unique = true;
        }
    }

    /// Removes the single-column uniqueness of `column`.
    fn plan_drop_unique(&self, plan: &mut Plan, table: &mut Table, column: &str) {
        if self.dialect.capabilities().unique_constraints {
            if let Some(unique) = table.single_column_unique(column).cloned() {
                plan.push(
                    self.dialect.drop_constraint_sql(table, &unique.name),
                    self.dialect.create_unique_sql(table, &unique),
                );
                table.uniques.retain(|u| u.name != unique.name);
            }
        } else if let Some(index) = table
            .indices
            .iter()
            .find(|i| i.is_unique && i.columns.len() == 1 && i.columns[0] == column)
            .cloned()
        {
            plan.push(
                self.dialect.drop_index_sql(table, &index),
                self.dialect.create_index_sql(table, &index),
            );
            table.indices.retain(|i| i.name != index.name);
        }
        if let Some(c) = table.find_column_mut(column) {
            c.is_unique = false;
        }
    }
}

fn set_column(table: &mut Table, name: &str, column: Column) {
    if let Some(slot) = table.find_column_mut(name) {
        *slot = column;
    }
}

/// Marks the released auto-increment column as no longer generated.
pub(super) fn release_increment(table: &mut Table, increment: Option<&Column>) {
    if let Some(column) = increment.and_then(|c| table.find_column_mut(&c.name)) {
        column.is_generated = false;
        column.generation_strategy = None;
    }
}
