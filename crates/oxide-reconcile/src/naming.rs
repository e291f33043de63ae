//! Deterministic names for constraints, indices and keys.
//!
//! Every object the engine creates without an explicit name is named through a
//! [`NamingStrategy`]. Because the derived name depends only on the table name,
//! the columns and (for expression-based constraints) the expression text, a
//! rename can tell whether an existing object still carries its derived name
//! and regenerate it for the new table or column name.

use sha2::{Digest, Sha256};

use crate::schema::split_qualified;

/// Kind of object a name is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Primary key constraint.
    PrimaryKey,
    /// Unique constraint, or the unique index standing in for one.
    Unique,
    /// Plain index.
    Index,
    /// Foreign key constraint.
    ForeignKey,
    /// Check constraint; `extra` carries the expression.
    Check,
    /// Exclusion constraint; `extra` carries the expression.
    Exclusion,
}

/// Pluggable name synthesis.
///
/// Implementations must be pure: the same inputs always give the same name.
pub trait NamingStrategy: Send + Sync {
    /// Returns the name for an object of `kind` on `table` over `columns`.
    ///
    /// `table` may be namespace-qualified. `extra` carries the expression for
    /// check and exclusion constraints.
    fn name_for(&self, kind: NameKind, table: &str, columns: &[String], extra: Option<&str>)
        -> String;
}

/// `{table}_{columns}_{suffix}` names, truncated with a hash suffix when they
/// exceed the server's identifier limit.
#[derive(Debug, Clone)]
pub struct DefaultNamingStrategy {
    max_length: usize,
}

impl DefaultNamingStrategy {
    /// Creates a strategy with the given identifier length limit.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for DefaultNamingStrategy {
    fn default() -> Self {
        Self::new(63)
    }
}

impl NamingStrategy for DefaultNamingStrategy {
    fn name_for(
        &self,
        kind: NameKind,
        table: &str,
        columns: &[String],
        extra: Option<&str>,
    ) -> String {
        let (_, table) = split_qualified(table);
        let joined = columns.join("_");
        let name = match kind {
            NameKind::PrimaryKey => format!("{table}_pkey"),
            NameKind::Unique => format!("{table}_{joined}"),
            NameKind::Index => format!("{table}_{joined}_idx"),
            NameKind::ForeignKey => format!("{table}_{joined}_fkey"),
            NameKind::Check => format!("{}_{}_check", table, short_hash(extra.unwrap_or(&joined))),
            NameKind::Exclusion => {
                format!("{}_{}_excl", table, short_hash(extra.unwrap_or(&joined)))
            }
        };
        truncate(name, self.max_length)
    }
}

/// First eight hex digits of the SHA-256 of `input`.
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

fn truncate(name: String, max_length: usize) -> String {
    if name.len() <= max_length || max_length <= 9 {
        return name;
    }
    let hash = short_hash(&name);
    let keep = max_length - hash.len() - 1;
    let cut = name
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|i| *i <= keep)
        .last()
        .unwrap_or(0);
    format!("{}_{}", &name[..cut], hash)
}
