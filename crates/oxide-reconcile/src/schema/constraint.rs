//! Indices, foreign keys and table constraints.
//!
//! An empty `name` means "not yet named": the engine derives one through the
//! configured [`crate::naming::NamingStrategy`] and stores it back on the
//! committed table, so later cascades can recognise it.

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReferentialAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the rule text reported by `information_schema` or
    /// `pg_constraint` (`a`, `r`, `c`, `n`, `d` codes included).
    #[must_use]
    pub fn from_catalog(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" | "A" => Some(Self::NoAction),
            "RESTRICT" | "R" => Some(Self::Restrict),
            "CASCADE" | "C" => Some(Self::Cascade),
            "SET NULL" | "N" => Some(Self::SetNull),
            "SET DEFAULT" | "D" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// A table index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub is_unique: bool,
    /// Whether this is a spatial (GiST / SPATIAL) index.
    pub is_spatial: bool,
    /// Whether this is a full-text index.
    pub is_fulltext: bool,
    /// Partial index condition (WHERE clause).
    pub predicate: Option<String>,
}

impl Index {
    /// Creates an unnamed index over `columns`.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: String::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            is_unique: false,
            is_spatial: false,
            is_fulltext: false,
            predicate: None,
        }
    }

    /// Sets the index name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Makes the index spatial.
    #[must_use]
    pub fn spatial(mut self) -> Self {
        self.is_spatial = true;
        self
    }

    /// Makes the index full-text.
    #[must_use]
    pub fn fulltext(mut self) -> Self {
        self.is_fulltext = true;
        self
    }

    /// Sets the partial index predicate.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name, possibly namespace-qualified.
    pub referenced_table: String,
    /// Referenced column(s), aligned positionally with `columns`.
    pub referenced_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: Option<ReferentialAction>,
    /// Action on update.
    pub on_update: Option<ReferentialAction>,
    /// Deferrability clause, e.g. `INITIALLY DEFERRED`.
    pub deferrable: Option<String>,
}

impl ForeignKey {
    /// Creates an unnamed foreign key.
    #[must_use]
    pub fn new<I, J, S, T>(columns: I, referenced_table: impl Into<String>, referenced: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            name: String::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_table: referenced_table.into(),
            referenced_columns: referenced.into_iter().map(Into::into).collect(),
            on_delete: None,
            on_update: None,
            deferrable: None,
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Sets the deferrability clause.
    #[must_use]
    pub fn deferrable(mut self, clause: impl Into<String>) -> Self {
        self.deferrable = Some(clause.into());
        self
    }

    /// Checks that local and referenced columns line up.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(ReconcileError::InvalidDefinition(format!(
                "foreign key '{}' has no columns",
                self.name
            )));
        }
        if self.columns.len() != self.referenced_columns.len() {
            return Err(ReconcileError::InvalidDefinition(format!(
                "foreign key '{}' has {} columns but references {}",
                self.name,
                self.columns.len(),
                self.referenced_columns.len()
            )));
        }
        Ok(())
    }
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unique {
    /// Constraint name.
    pub name: String,
    /// Columns that form the unique constraint.
    pub columns: Vec<String>,
}

impl Unique {
    /// Creates an unnamed unique constraint.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: String::new(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Check {
    /// Constraint name.
    pub name: String,
    /// Columns the expression mentions, when known.
    pub columns: Vec<String>,
    /// Boolean SQL expression.
    pub expression: String,
}

impl Check {
    /// Creates an unnamed check constraint.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            columns: Vec::new(),
            expression: expression.into(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Records the columns the expression depends on.
    #[must_use]
    pub fn on_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// An exclusion constraint (`EXCLUDE USING ...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    /// Constraint name.
    pub name: String,
    /// Everything after `EXCLUDE`, e.g. `USING gist ("room" WITH =)`.
    pub expression: String,
}

impl Exclusion {
    /// Creates an unnamed exclusion constraint.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            expression: expression.into(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referential_action_from_catalog() {
        assert_eq!(
            ReferentialAction::from_catalog("SET NULL"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(
            ReferentialAction::from_catalog("c"),
            Some(ReferentialAction::Cascade)
        );
        assert_eq!(ReferentialAction::from_catalog("bogus"), None);
    }

    #[test]
    fn test_foreign_key_validate() {
        let ok = ForeignKey::new(["user_id"], "users", ["id"]);
        assert!(ok.validate().is_ok());

        let bad = ForeignKey::new(["a", "b"], "users", ["id"]).named("fk");
        let err = bad.validate().unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidDefinition(_)));
    }
}
