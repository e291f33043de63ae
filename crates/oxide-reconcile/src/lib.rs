//! Dialect-aware, reversible schema reconciliation for PostgreSQL and MySQL.
//!
//! `oxide-reconcile` turns structural intents such as "rename this column" or
//! "drop that primary key" into ordered, paired up/down DDL statements for
//! the target database, executes them, and keeps an in-memory picture of the
//! schema in step with what actually ran:
//! - Every forward statement carries its inverse, so a failure partway
//!   through a change is compensated newest first
//! - Renames cascade into every constraint, index and enum type whose name
//!   was derived from the old name
//! - Operations a dialect cannot express fail before any round trip
//!
//! # Architecture
//!
//! - **Schema** - Object model: tables, columns, indices, constraints, views
//! - **Dialect** - SQL synthesis and capability flags per database
//! - **Catalog** - Reads the live schema back into the object model
//! - **Coordinator** - Runs plans with compensation, transactions, recording
//! - **Engine** - The change operations, with the schema cache
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_reconcile::prelude::*;
//!
//! let executor = PgExecutor::connect("postgres://localhost/app").await?;
//! let engine = SchemaEngine::new(PostgresDialect::default(), executor, EngineConfig::new());
//!
//! let users = Table::new("users")
//!     .column(Column::new("id", "integer").primary().generated(GenerationStrategy::Increment))
//!     .column(Column::new("email", "varchar").length(255).unique());
//! engine.create_table(&users, CreateTableOptions::default()).await?;
//!
//! // Renames "users_email" to "users_email_address" along with the column.
//! engine.rename_column("users".into(), "email", "email_address").await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the loaded definition of a table
//! oxide-reconcile -d postgres://localhost/app inspect users
//!
//! # Print the CREATE TABLE the dialect would emit
//! oxide-reconcile -d mysql://localhost/shop ddl orders
//!
//! # Drop everything in the current namespace
//! oxide-reconcile -d postgres://localhost/app clear --yes
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod executor;
pub mod naming;
pub mod schema;
pub mod statement;

pub use engine::{CreateTableOptions, DropTableOptions, SchemaEngine, TableRef};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cache::SchemaCache;
    pub use crate::catalog::CatalogReader;
    pub use crate::config::{ColumnChangePolicy, EngineConfig};
    pub use crate::dialect::{Dialect, DialectRules, MySqlDialect, PostgresDialect};
    pub use crate::engine::{CreateTableOptions, DropTableOptions, SchemaEngine, TableRef};
    pub use crate::error::{ObjectKind, ReconcileError, Result};
    pub use crate::executor::{
        DatabaseContext, MemoryExecutor, MySqlExecutor, PgExecutor, QueryExecutor,
    };
    pub use crate::naming::{DefaultNamingStrategy, NameKind, NamingStrategy};
    pub use crate::schema::{
        Check, Column, Exclusion, ForeignKey, GeneratedStorage, GenerationStrategy, Index,
        ReferentialAction, Table, Unique, View,
    };
    pub use crate::statement::{Plan, Scalar, Statement};
}
