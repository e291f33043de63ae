//! Engine configuration.

use serde::{Deserialize, Serialize};

/// What `change_column` does when a column's type-level definition changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChangePolicy {
    /// Drop the column and add it again. Loses the column's data.
    #[default]
    Recreate,
    /// Alter the column type in place when only the length changed; recreate
    /// otherwise.
    AlterInPlace,
}

/// Settings shared by every operation of a [`crate::SchemaEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default Postgres schema for unqualified names.
    pub schema: Option<String>,
    /// Default MySQL database for unqualified names.
    pub database: Option<String>,
    /// Table that records view definitions.
    pub metadata_table: String,
    /// Column change behaviour.
    pub column_change_policy: ColumnChangePolicy,
    /// Wrap each operation in a transaction when the dialect can roll back DDL.
    pub atomic: bool,
    /// Longest identifier the naming strategy may produce.
    pub max_identifier_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: None,
            database: None,
            metadata_table: "oxide_metadata".to_string(),
            column_change_policy: ColumnChangePolicy::default(),
            atomic: false,
            max_identifier_length: 63,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default Postgres schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the default MySQL database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the view registry table.
    #[must_use]
    pub fn metadata_table(mut self, table: impl Into<String>) -> Self {
        self.metadata_table = table.into();
        self
    }

    /// Sets the column change policy.
    #[must_use]
    pub fn column_change_policy(mut self, policy: ColumnChangePolicy) -> Self {
        self.column_change_policy = policy;
        self
    }

    /// Enables per-operation transactions.
    #[must_use]
    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Sets the identifier length limit.
    #[must_use]
    pub fn max_identifier_length(mut self, length: usize) -> Self {
        self.max_identifier_length = length;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.metadata_table, "oxide_metadata");
        assert_eq!(config.column_change_policy, ColumnChangePolicy::Recreate);
        assert!(!config.atomic);
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"schema":"app","column_change_policy":"alter_in_place"}"#)
                .unwrap();
        assert_eq!(config.schema.as_deref(), Some("app"));
        assert_eq!(config.column_change_policy, ColumnChangePolicy::AlterInPlace);
        assert_eq!(config.max_identifier_length, 63);
    }
}
