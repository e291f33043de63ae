//! Table definitions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{split_qualified, Check, Column, Exclusion, ForeignKey, Index, Unique};
use crate::error::{ObjectKind, ReconcileError, Result};

/// A table and everything attached to it.
///
/// Tables are plain values: the engine clones the cached table, mutates the
/// clone, and only swaps it into the cache once the statements ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, optionally `namespace.name`.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Index definitions.
    pub indices: Vec<Index>,
    /// Foreign key definitions.
    pub foreign_keys: Vec<ForeignKey>,
    /// Unique constraint definitions.
    pub uniques: Vec<Unique>,
    /// Check constraint definitions.
    pub checks: Vec<Check>,
    /// Exclusion constraint definitions.
    pub exclusions: Vec<Exclusion>,
    /// Storage engine hint (MySQL).
    pub engine: Option<String>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indices: Vec::new(),
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            exclusions: Vec::new(),
            engine: None,
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indices.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, unique: Unique) -> Self {
        self.uniques.push(unique);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds an exclusion constraint.
    #[must_use]
    pub fn exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Splits the name into `(namespace, bare name)`.
    #[must_use]
    pub fn schema_and_name(&self) -> (Option<&str>, &str) {
        split_qualified(&self.name)
    }

    /// Name without its namespace.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        self.schema_and_name().1
    }

    /// Gets a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Gets a column or reports it missing.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.find_column(name)
            .ok_or_else(|| ReconcileError::not_found_in(ObjectKind::Column, name, &self.name))
    }

    /// Whether a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    /// Primary key columns in table order.
    #[must_use]
    pub fn primary_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary).collect()
    }

    /// Primary key column names in table order.
    #[must_use]
    pub fn primary_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary)
            .map(|c| c.name.clone())
            .collect()
    }

    /// The auto-increment column, if any.
    #[must_use]
    pub fn increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_increment())
    }

    /// Indices whose key includes `column`.
    #[must_use]
    pub fn indices_referencing(&self, column: &str) -> Vec<&Index> {
        self.indices
            .iter()
            .filter(|i| i.columns.iter().any(|c| c == column))
            .collect()
    }

    /// Foreign keys whose local columns include `column`.
    #[must_use]
    pub fn foreign_keys_referencing(&self, column: &str) -> Vec<&ForeignKey> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.columns.iter().any(|c| c == column))
            .collect()
    }

    /// Unique constraints that include `column`.
    #[must_use]
    pub fn uniques_referencing(&self, column: &str) -> Vec<&Unique> {
        self.uniques
            .iter()
            .filter(|u| u.columns.iter().any(|c| c == column))
            .collect()
    }

    /// The single-column index on `column`, if one exists.
    #[must_use]
    pub fn single_column_index(&self, column: &str) -> Option<&Index> {
        self.indices
            .iter()
            .find(|i| i.columns.len() == 1 && i.columns[0] == column)
    }

    /// The single-column unique constraint on `column`, if one exists.
    #[must_use]
    pub fn single_column_unique(&self, column: &str) -> Option<&Unique> {
        self.uniques
            .iter()
            .find(|u| u.columns.len() == 1 && u.columns[0] == column)
    }

    /// The single-column check constraint on `column`, if one exists.
    #[must_use]
    pub fn single_column_check(&self, column: &str) -> Option<&Check> {
        self.checks
            .iter()
            .find(|c| c.columns.len() == 1 && c.columns[0] == column)
    }

    /// Rewrites every reference to column `from` in indices, foreign keys,
    /// uniques and checks.
    pub fn rename_column_references(&mut self, from: &str, to: &str) {
        let rewrite = |columns: &mut Vec<String>| {
            for column in columns.iter_mut().filter(|c| c.as_str() == from) {
                *column = to.to_string();
            }
        };
        self.indices.iter_mut().for_each(|i| rewrite(&mut i.columns));
        self.foreign_keys
            .iter_mut()
            .for_each(|fk| rewrite(&mut fk.columns));
        self.uniques.iter_mut().for_each(|u| rewrite(&mut u.columns));
        self.checks.iter_mut().for_each(|c| rewrite(&mut c.columns));
    }

    /// Checks structural invariants: unique column names, aligned foreign
    /// keys, and at most one auto-increment column.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ReconcileError::InvalidDefinition(format!(
                    "column '{}' is declared twice in table '{}'",
                    column.name, self.name
                )));
            }
        }
        if self.columns.iter().filter(|c| c.is_increment()).count() > 1 {
            return Err(ReconcileError::InvalidDefinition(format!(
                "table '{}' has more than one auto-increment column",
                self.name
            )));
        }
        for fk in &self.foreign_keys {
            fk.validate()?;
        }
        Ok(())
    }
}
