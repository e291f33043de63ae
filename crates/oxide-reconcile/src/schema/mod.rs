//! Object model for tables, views and their constraints.
//!
//! These types are dialect-independent. The catalog loaders produce them from
//! a live server, the dialect rules render them to DDL, and the engine keeps
//! the last committed version of each in its cache.

mod column;
mod constraint;
mod table;
mod view;

pub use column::{Column, GeneratedStorage, GenerationStrategy};
pub use constraint::{Check, Exclusion, ForeignKey, Index, ReferentialAction, Unique};
pub use table::Table;
pub use view::View;

/// Splits `namespace.name` into its parts. Names without a dot have no
/// namespace.
#[must_use]
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((namespace, bare)) if !namespace.is_empty() => (Some(namespace), bare),
        Some((_, bare)) => (None, bare),
        None => (None, name),
    }
}

/// Joins a namespace and a bare name.
#[must_use]
pub fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("public.users"), (Some("public"), "users"));
        assert_eq!(split_qualified("users"), (None, "users"));
        assert_eq!(split_qualified(".users"), (None, "users"));
        assert_eq!(qualify(Some("app"), "users"), "app.users");
        assert_eq!(qualify(None, "users"), "users");
    }
}
