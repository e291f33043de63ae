//! Primary keys, constraints, foreign keys and indices.

use futures::future::try_join_all;
use tracing::info;

use super::column::release_increment;
use super::{SchemaEngine, TableRef};
use crate::dialect::Dialect;
use crate::error::{ObjectKind, ReconcileError, Result};
use crate::executor::QueryExecutor;
use crate::naming::NameKind;
use crate::schema::{Check, Column, Exclusion, ForeignKey, Index, Table, Unique};
use crate::statement::Plan;

impl<D: Dialect, E: QueryExecutor> SchemaEngine<D, E> {
    /// Adds `column_names` to the primary key.
    pub async fn create_primary_key(
        &self,
        target: TableRef<'_>,
        column_names: &[String],
    ) -> Result<Table> {
        info!(table = %target.name(), columns = ?column_names, "Creating primary key");
        let (key, table) = self.resolve(target).await?;
        for name in column_names {
            table.require_column(name)?;
        }
        let mut after = table.clone();
        for column in &mut after.columns {
            if column_names.contains(&column.name) {
                column.is_primary = true;
                column.is_nullable = false;
            }
        }
        self.replace_primary_key(key, table, after).await
    }

    /// Applies the `is_primary` flag of each given column and rebuilds the
    /// primary key over the resulting set.
    pub async fn update_primary_keys(
        &self,
        target: TableRef<'_>,
        columns: &[Column],
    ) -> Result<Table> {
        info!(table = %target.name(), "Updating primary key");
        let (key, table) = self.resolve(target).await?;
        let mut after = table.clone();
        for changed in columns {
            let column = after.find_column_mut(&changed.name).ok_or_else(|| {
                ReconcileError::not_found_in(ObjectKind::Column, &changed.name, &table.name)
            })?;
            column.is_primary = changed.is_primary;
            if changed.is_primary {
                column.is_nullable = false;
            }
        }
        self.replace_primary_key(key, table, after).await
    }

    /// Drops the primary key.
    pub async fn drop_primary_key(&self, target: TableRef<'_>) -> Result<Table> {
        info!(table = %target.name(), "Dropping primary key");
        let (key, table) = self.resolve(target).await?;
        if table.primary_columns().is_empty() {
            return Err(ReconcileError::not_found_in(
                ObjectKind::PrimaryKey,
                self.name_for(NameKind::PrimaryKey, &table.name, &[], None),
                &table.name,
            ));
        }
        let mut after = table.clone();
        for column in &mut after.columns {
            column.is_primary = false;
        }
        self.replace_primary_key(key, table, after).await
    }

    /// Swaps the primary key of `before` for the one of `after`, releasing an
    /// auto-increment column around the swap. The increment is restored
    /// when its column stays in the key.
    async fn replace_primary_key(&self, key: String, before: Table, mut after: Table) -> Result<Table> {
        let increment = before.increment_column().cloned();
        let keeps_increment = increment.as_ref().is_some_and(|c| {
            after
                .find_column(&c.name)
                .is_some_and(|c| c.is_primary)
        });
        let mut plan = Plan::new();
        self.plan_primary_key_change(
            &mut plan,
            &before,
            &after,
            increment.as_ref(),
            keeps_increment,
        );
        let releases = increment
            .as_ref()
            .is_some_and(|c| self.dialect.auto_increment_release(&before, c).is_some());
        if releases && !keeps_increment {
            release_increment(&mut after, increment.as_ref());
        }
        self.commit(key, &plan, after).await
    }

    /// Adds a unique constraint.
    pub async fn create_unique_constraint(
        &self,
        target: TableRef<'_>,
        unique: &Unique,
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().unique_constraints,
            "unique constraints",
        )?;
        info!(table = %target.name(), columns = ?unique.columns, "Creating unique constraint");
        let (key, table) = self.resolve(target).await?;
        for column in &unique.columns {
            table.require_column(column)?;
        }
        let mut unique = unique.clone();
        if unique.name.is_empty() {
            unique.name = self.name_for(NameKind::Unique, &table.name, &unique.columns, None);
        }

        let mut plan = Plan::new();
        plan.push(
            self.dialect.create_unique_sql(&table, &unique),
            self.dialect.drop_constraint_sql(&table, &unique.name),
        );

        let mut after = table;
        if let [column] = unique.columns.as_slice() {
            if let Some(column) = after.find_column_mut(column) {
                column.is_unique = true;
            }
        }
        after.uniques.push(unique);
        self.commit(key, &plan, after).await
    }

    /// Adds unique constraints one after another.
    pub async fn create_unique_constraints(
        &self,
        target: TableRef<'_>,
        uniques: &[Unique],
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().unique_constraints,
            "unique constraints",
        )?;
        let (_, mut table) = self.resolve(target).await?;
        for unique in uniques {
            table = self
                .create_unique_constraint(TableRef::Table(&table), unique)
                .await?;
        }
        Ok(table)
    }

    /// Drops the unique constraint called `name`.
    pub async fn drop_unique_constraint(&self, target: TableRef<'_>, name: &str) -> Result<Table> {
        self.require(
            self.dialect.capabilities().unique_constraints,
            "unique constraints",
        )?;
        info!(table = %target.name(), constraint = %name, "Dropping unique constraint");
        let (key, table) = self.resolve(target).await?;
        let unique = table
            .uniques
            .iter()
            .find(|u| u.name == name)
            .cloned()
            .ok_or_else(|| {
                ReconcileError::not_found_in(ObjectKind::UniqueConstraint, name, &table.name)
            })?;

        let mut plan = Plan::new();
        plan.push(
            self.dialect.drop_constraint_sql(&table, &unique.name),
            self.dialect.create_unique_sql(&table, &unique),
        );

        let mut after = table;
        after.uniques.retain(|u| u.name != name);
        if let [column] = unique.columns.as_slice() {
            let still_unique = after.single_column_unique(column).is_some();
            if let Some(column) = after.find_column_mut(column) {
                column.is_unique = still_unique;
            }
        }
        self.commit(key, &plan, after).await
    }

    /// Drops unique constraints one after another.
    pub async fn drop_unique_constraints(
        &self,
        target: TableRef<'_>,
        names: &[&str],
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().unique_constraints,
            "unique constraints",
        )?;
        let (_, mut table) = self.resolve(target).await?;
        for name in names {
            table = self
                .drop_unique_constraint(TableRef::Table(&table), name)
                .await?;
        }
        Ok(table)
    }

    /// Adds a check constraint.
    pub async fn create_check_constraint(&self, target: TableRef<'_>, check: &Check) -> Result<Table> {
        self.require(
            self.dialect.capabilities().check_constraints,
            "check constraints",
        )?;
        info!(table = %target.name(), expression = %check.expression, "Creating check constraint");
        let (key, table) = self.resolve(target).await?;
        let mut check = check.clone();
        if check.name.is_empty() {
            check.name = self.name_for(
                NameKind::Check,
                &table.name,
                &check.columns,
                Some(&check.expression),
            );
        }

        let mut plan = Plan::new();
        plan.push(
            self.dialect
                .create_check_sql(&table, &check.name, &check.expression),
            self.dialect.drop_constraint_sql(&table, &check.name),
        );
        self.commit_merge(key, &plan, table, |t| {
            t.checks.retain(|c| c.name != check.name);
            t.checks.push(check.clone());
        })
        .await
    }

    /// Adds check constraints concurrently, or one after another when each
    /// operation runs in its own transaction.
    pub async fn create_check_constraints(
        &self,
        target: TableRef<'_>,
        checks: &[Check],
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().check_constraints,
            "check constraints",
        )?;
        let (key, table) = self.seed(target).await?;
        if self.config.atomic {
            for check in checks {
                self.create_check_constraint(TableRef::Table(&table), check)
                    .await?;
            }
        } else {
            try_join_all(
                checks
                    .iter()
                    .map(|check| self.create_check_constraint(TableRef::Table(&table), check)),
            )
            .await?;
        }
        Ok(self.cache.table(&key).unwrap_or(table))
    }

    /// Drops the check constraint called `name`.
    pub async fn drop_check_constraint(&self, target: TableRef<'_>, name: &str) -> Result<Table> {
        self.require(
            self.dialect.capabilities().check_constraints,
            "check constraints",
        )?;
        info!(table = %target.name(), constraint = %name, "Dropping check constraint");
        let (key, table) = self.resolve(target).await?;
        let check = table
            .checks
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| {
                ReconcileError::not_found_in(ObjectKind::CheckConstraint, name, &table.name)
            })?;

        let mut plan = Plan::new();
        plan.push(
            self.dialect.drop_constraint_sql(&table, &check.name),
            self.dialect
                .create_check_sql(&table, &check.name, &check.expression),
        );
        self.commit_merge(key, &plan, table, |t| t.checks.retain(|c| c.name != name))
            .await
    }

    /// Drops check constraints concurrently, or one after another when each
    /// operation runs in its own transaction.
    pub async fn drop_check_constraints(&self, target: TableRef<'_>, names: &[&str]) -> Result<Table> {
        self.require(
            self.dialect.capabilities().check_constraints,
            "check constraints",
        )?;
        let (key, table) = self.seed(target).await?;
        if self.config.atomic {
            for name in names {
                self.drop_check_constraint(TableRef::Table(&table), name)
                    .await?;
            }
        } else {
            try_join_all(
                names
                    .iter()
                    .map(|name| self.drop_check_constraint(TableRef::Table(&table), name)),
            )
            .await?;
        }
        Ok(self.cache.table(&key).unwrap_or(table))
    }

    /// Adds an exclusion constraint.
    pub async fn create_exclusion_constraint(
        &self,
        target: TableRef<'_>,
        exclusion: &Exclusion,
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().exclusion_constraints,
            "exclusion constraints",
        )?;
        info!(table = %target.name(), expression = %exclusion.expression, "Creating exclusion constraint");
        let (key, table) = self.resolve(target).await?;
        let mut exclusion = exclusion.clone();
        if exclusion.name.is_empty() {
            exclusion.name = self.name_for(
                NameKind::Exclusion,
                &table.name,
                &[],
                Some(&exclusion.expression),
            );
        }

        let mut plan = Plan::new();
        plan.push(
            self.dialect
                .create_exclusion_sql(&table, &exclusion.name, &exclusion.expression),
            self.dialect.drop_constraint_sql(&table, &exclusion.name),
        );
        self.commit_merge(key, &plan, table, |t| {
            t.exclusions.retain(|e| e.name != exclusion.name);
            t.exclusions.push(exclusion.clone());
        })
        .await
    }

    /// Adds exclusion constraints concurrently, or one after another when
    /// each operation runs in its own transaction.
    pub async fn create_exclusion_constraints(
        &self,
        target: TableRef<'_>,
        exclusions: &[Exclusion],
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().exclusion_constraints,
            "exclusion constraints",
        )?;
        let (key, table) = self.seed(target).await?;
        if self.config.atomic {
            for exclusion in exclusions {
                self.create_exclusion_constraint(TableRef::Table(&table), exclusion)
                    .await?;
            }
        } else {
            try_join_all(exclusions.iter().map(|exclusion| {
                self.create_exclusion_constraint(TableRef::Table(&table), exclusion)
            }))
            .await?;
        }
        Ok(self.cache.table(&key).unwrap_or(table))
    }

    /// Drops the exclusion constraint called `name`.
    pub async fn drop_exclusion_constraint(
        &self,
        target: TableRef<'_>,
        name: &str,
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().exclusion_constraints,
            "exclusion constraints",
        )?;
        info!(table = %target.name(), constraint = %name, "Dropping exclusion constraint");
        let (key, table) = self.resolve(target).await?;
        let exclusion = table
            .exclusions
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| {
                ReconcileError::not_found_in(ObjectKind::ExclusionConstraint, name, &table.name)
            })?;

        let mut plan = Plan::new();
        plan.push(
            self.dialect.drop_constraint_sql(&table, &exclusion.name),
            self.dialect
                .create_exclusion_sql(&table, &exclusion.name, &exclusion.expression),
        );
        self.commit_merge(key, &plan, table, |t| {
            t.exclusions.retain(|e| e.name != name);
        })
        .await
    }

    /// Drops exclusion constraints concurrently, or one after another when
    /// each operation runs in its own transaction.
    pub async fn drop_exclusion_constraints(
        &self,
        target: TableRef<'_>,
        names: &[&str],
    ) -> Result<Table> {
        self.require(
            self.dialect.capabilities().exclusion_constraints,
            "exclusion constraints",
        )?;
        let (key, table) = self.seed(target).await?;
        if self.config.atomic {
            for name in names {
                self.drop_exclusion_constraint(TableRef::Table(&table), name)
                    .await?;
            }
        } else {
            try_join_all(
                names
                    .iter()
                    .map(|name| self.drop_exclusion_constraint(TableRef::Table(&table), name)),
            )
            .await?;
        }
        Ok(self.cache.table(&key).unwrap_or(table))
    }

    /// Adds a foreign key.
    pub async fn create_foreign_key(&self, target: TableRef<'_>, fk: &ForeignKey) -> Result<Table> {
        fk.validate()?;
        info!(
            table = %target.name(),
            references = %fk.referenced_table,
            "Creating foreign key"
        );
        let (key, table) = self.resolve(target).await?;
        for column in &fk.columns {
            table.require_column(column)?;
        }
        let mut fk = fk.clone();
        if fk.name.is_empty() {
            fk.name = self.name_for(NameKind::ForeignKey, &table.name, &fk.columns, None);
        }

        let mut plan = Plan::new();
        plan.push(
            self.dialect.create_foreign_key_sql(&table, &fk),
            self.dialect.drop_foreign_key_sql(&table, &fk),
        );
        let mut after = table;
        after.foreign_keys.push(fk);
        self.commit(key, &plan, after).await
    }

    /// Adds foreign keys one after another.
    pub async fn create_foreign_keys(
        &self,
        target: TableRef<'_>,
        fks: &[ForeignKey],
    ) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for fk in fks {
            table = self
                .create_foreign_key(TableRef::Table(&table), fk)
                .await?;
        }
        Ok(table)
    }

    /// Drops the foreign key called `name`.
    pub async fn drop_foreign_key(&self, target: TableRef<'_>, name: &str) -> Result<Table> {
        info!(table = %target.name(), constraint = %name, "Dropping foreign key");
        let (key, table) = self.resolve(target).await?;
        let fk = table
            .foreign_keys
            .iter()
            .find(|fk| fk.name == name)
            .cloned()
            .ok_or_else(|| ReconcileError::not_found_in(ObjectKind::ForeignKey, name, &table.name))?;

        let mut plan = Plan::new();
        plan.push(
            self.dialect.drop_foreign_key_sql(&table, &fk),
            self.dialect.create_foreign_key_sql(&table, &fk),
        );
        let mut after = table;
        after.foreign_keys.retain(|fk| fk.name != name);
        self.commit(key, &plan, after).await
    }

    /// Drops foreign keys one after another.
    pub async fn drop_foreign_keys(&self, target: TableRef<'_>, names: &[&str]) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for name in names {
            table = self.drop_foreign_key(TableRef::Table(&table), name).await?;
        }
        Ok(table)
    }

    /// Creates an index.
    pub async fn create_index(&self, target: TableRef<'_>, index: &Index) -> Result<Table> {
        info!(table = %target.name(), columns = ?index.columns, "Creating index");
        let (key, table) = self.resolve(target).await?;
        for column in &index.columns {
            table.require_column(column)?;
        }
        let mut index = index.clone();
        if index.name.is_empty() {
            index.name = self.name_for(
                NameKind::Index,
                &table.name,
                &index.columns,
                index.predicate.as_deref(),
            );
        }

        let mut plan = Plan::new();
        plan.push(
            self.dialect.create_index_sql(&table, &index),
            self.dialect.drop_index_sql(&table, &index),
        );
        let mut after = table;
        after.indices.push(index);
        self.commit(key, &plan, after).await
    }

    /// Creates indices one after another.
    pub async fn create_indices(&self, target: TableRef<'_>, indices: &[Index]) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for index in indices {
            table = self.create_index(TableRef::Table(&table), index).await?;
        }
        Ok(table)
    }

    /// Drops the index called `name`.
    pub async fn drop_index(&self, target: TableRef<'_>, name: &str) -> Result<Table> {
        info!(table = %target.name(), index = %name, "Dropping index");
        let (key, table) = self.resolve(target).await?;
        let index = table
            .indices
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or_else(|| ReconcileError::not_found_in(ObjectKind::Index, name, &table.name))?;

        let mut plan = Plan::new();
        plan.push(
            self.dialect.drop_index_sql(&table, &index),
            self.dialect.create_index_sql(&table, &index),
        );
        let mut after = table;
        after.indices.retain(|i| i.name != name);
        self.commit(key, &plan, after).await
    }

    /// Drops indices one after another.
    pub async fn drop_indices(&self, target: TableRef<'_>, names: &[&str]) -> Result<Table> {
        let (_, mut table) = self.resolve(target).await?;
        for name in names {
            table = self.drop_index(TableRef::Table(&table), name).await?;
        }
        Ok(table)
    }

    /// Resolves `target` and makes sure the cache holds an entry for the
    /// concurrent commits to merge into.
    async fn seed(&self, target: TableRef<'_>) -> Result<(String, Table)> {
        let (key, table) = self.resolve(target).await?;
        if self.cache.table(&key).is_none() {
            self.cache.put_table(key.clone(), table.clone());
        }
        Ok((key, table))
    }
}
