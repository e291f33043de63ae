//! Error types for schema reconciliation.

use std::fmt;

use crate::statement::Scalar;

/// Boxed driver error carried by [`ReconcileError::QueryExecution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of schema object named in an [`ReconcileError::ObjectNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
    Column,
    Index,
    ForeignKey,
    UniqueConstraint,
    CheckConstraint,
    ExclusionConstraint,
    PrimaryKey,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Table => "Table",
            Self::View => "View",
            Self::Column => "Column",
            Self::Index => "Index",
            Self::ForeignKey => "Foreign key",
            Self::UniqueConstraint => "Unique constraint",
            Self::CheckConstraint => "Check constraint",
            Self::ExclusionConstraint => "Exclusion constraint",
            Self::PrimaryKey => "Primary key",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while reconciling a schema.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A referenced table, view, column, index or constraint does not exist.
    #[error("{kind} '{name}' was not found{}", in_table(.table))]
    ObjectNotFound {
        /// What was looked up.
        kind: ObjectKind,
        /// Name that was looked up.
        name: String,
        /// Owning table, when the object lives inside one.
        table: Option<String>,
    },

    /// The target dialect has no such object kind or statement.
    #[error("{dialect} does not support {operation}")]
    UnsupportedOperation {
        /// Dialect name.
        dialect: &'static str,
        /// Operation that was requested.
        operation: &'static str,
    },

    /// A statement failed on the server.
    #[error("Query failed: {source}\n  sql: {sql}")]
    QueryExecution {
        /// SQL text that was sent.
        sql: String,
        /// Positional parameters that were bound.
        params: Vec<Scalar>,
        /// Driver-level failure.
        #[source]
        source: BoxError,
    },

    /// An up sequence failed partway and compensating statements were run.
    #[error("Change failed after {applied} of {total} statements (compensated: {compensated}): {source}")]
    PartialApply {
        /// Number of up statements that succeeded before the failure.
        applied: usize,
        /// Number of up statements in the plan.
        total: usize,
        /// Whether every compensating statement succeeded.
        compensated: bool,
        /// The original failure.
        #[source]
        source: Box<ReconcileError>,
    },

    /// The object model handed to an operation is malformed.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// Connection-level database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Shorthand for a missing table.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            kind: ObjectKind::Table,
            name: name.into(),
            table: None,
        }
    }

    /// Shorthand for a missing object inside `table`.
    pub fn not_found_in(kind: ObjectKind, name: impl Into<String>, table: &str) -> Self {
        Self::ObjectNotFound {
            kind,
            name: name.into(),
            table: Some(table.to_string()),
        }
    }

    /// Returns the error that started a failure chain.
    ///
    /// For [`ReconcileError::PartialApply`] this is the statement failure that
    /// triggered compensation; every other variant is its own root.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::PartialApply { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the SQL text attached to the root failure, if any.
    #[must_use]
    pub fn failed_sql(&self) -> Option<&str> {
        match self.root() {
            Self::QueryExecution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

fn in_table(table: &Option<String>) -> String {
    table
        .as_ref()
        .map(|t| format!(" in table '{t}'"))
        .unwrap_or_default()
}
