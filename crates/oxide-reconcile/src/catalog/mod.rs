//! Reading the live schema back into the object model.
//!
//! Each dialect answers catalog questions with its own system views. The
//! loaders batch every requested table into one query per object kind and
//! assemble the rows afterwards, so loading ten tables costs the same number
//! of round trips as loading one.

mod mysql;
mod postgres;

use async_trait::async_trait;

use crate::dialect::DialectRules;
use crate::error::Result;
use crate::executor::{DatabaseContext, QueryExecutor};
use crate::schema::{qualify, split_qualified, Column, Table, View};
use crate::statement::Row;

/// Catalog queries for one database system.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Loads the named tables that exist. Missing names are skipped.
    ///
    /// Names without a namespace resolve into the configured namespace, or
    /// the connection's current one. Loaded tables in the current namespace
    /// come back unqualified unless a namespace is configured.
    async fn load_tables(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        names: &[String],
    ) -> Result<Vec<Table>>;

    /// Loads the named views recorded in `metadata_table`. An empty `names`
    /// loads every recorded view; a missing registry table loads none.
    async fn load_views(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        names: &[String],
        metadata_table: &str,
    ) -> Result<Vec<View>>;

    /// Whether the table exists.
    async fn has_table(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        name: &str,
    ) -> Result<bool>;

    /// Whether the table has the column.
    async fn has_column(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        table: &str,
        column: &str,
    ) -> Result<bool>;

    /// Whether the namespace (schema or database) exists.
    async fn has_namespace(&self, executor: &dyn QueryExecutor, name: &str) -> Result<bool>;

    /// Qualified name of the enum type the column currently uses, as
    /// `schema.type`. `None` when the server reports no named type.
    async fn current_enum_type(
        &self,
        _executor: &dyn QueryExecutor,
        _context: &DatabaseContext,
        _table: &Table,
        _column: &Column,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    /// Whether the enum type derived for the column already exists.
    async fn enum_type_exists(
        &self,
        _executor: &dyn QueryExecutor,
        _context: &DatabaseContext,
        _table: &Table,
        _column: &Column,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Drops every view, table and named type in `namespace`.
    async fn drop_all_objects(&self, executor: &dyn QueryExecutor, namespace: &str) -> Result<()>;
}

/// A requested object resolved to `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub namespace: String,
    pub name: String,
}

/// Resolves requested names against the configured or current namespace.
pub(crate) fn resolve_targets(names: &[String], fallback: &str) -> Vec<Target> {
    names
        .iter()
        .map(|name| {
            let (namespace, bare) = split_qualified(name);
            Target {
                namespace: namespace.unwrap_or(fallback).to_string(),
                name: bare.to_string(),
            }
        })
        .collect()
}

/// `(ns = 'a' AND name = 'b') OR ...` over the targets.
pub(crate) fn target_condition<D>(
    dialect: &D,
    targets: &[Target],
    namespace_column: &str,
    name_column: &str,
) -> String
where
    D: DialectRules + ?Sized,
{
    targets
        .iter()
        .map(|t| {
            format!(
                "({} = {} AND {} = {})",
                namespace_column,
                dialect.escape_literal(&t.namespace),
                name_column,
                dialect.escape_literal(&t.name)
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Name a loaded object is reported under: unqualified when it lives in the
/// current namespace and no namespace is configured.
pub(crate) fn loaded_name(
    namespace: &str,
    name: &str,
    current: &str,
    configured: Option<&str>,
) -> String {
    if namespace == current && configured.is_none() {
        name.to_string()
    } else {
        qualify(Some(namespace), name)
    }
}

/// A registry row joined with the live view.
pub(crate) fn view_from_row(row: &Row, current: &str, configured: Option<&str>) -> View {
    View {
        name: loaded_name(
            row.text_or_empty("schema"),
            row.text_or_empty("name"),
            current,
            configured,
        ),
        expression: row.text_or_empty("value").to_string(),
        materialized: row.text("type") == Some("MATERIALIZED_VIEW"),
    }
}

/// Groups rows by the text of `column`, keeping first-seen order.
pub(crate) fn group_by<'a>(rows: &[&'a Row], column: &str) -> Vec<(&'a str, Vec<&'a Row>)> {
    let mut groups: Vec<(&'a str, Vec<&'a Row>)> = Vec::new();
    for &row in rows {
        let key = row.text_or_empty(column);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups
}

/// Rows belonging to `namespace.name`.
pub(crate) fn rows_for<'a>(
    rows: &'a [Row],
    namespace_column: &str,
    name_column: &str,
    namespace: &str,
    name: &str,
) -> Vec<&'a Row> {
    rows.iter()
        .filter(|r| r.text(namespace_column) == Some(namespace) && r.text(name_column) == Some(name))
        .collect()
}

/// Parses a catalog number that may arrive as integer or text.
pub(crate) fn catalog_u32(row: &Row, column: &str) -> Option<u32> {
    row.int(column).and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::statement::Scalar;

    #[test]
    fn test_resolve_and_condition() {
        let names = vec!["users".to_string(), "audit.log's".to_string()];
        let targets = resolve_targets(&names, "public");
        assert_eq!(targets[0].namespace, "public");
        assert_eq!(targets[1].namespace, "audit");

        let condition = target_condition(
            &PostgresDialect::default(),
            &targets,
            "\"table_schema\"",
            "\"table_name\"",
        );
        assert_eq!(
            condition,
            "(\"table_schema\" = 'public' AND \"table_name\" = 'users') OR (\"table_schema\" = 'audit' AND \"table_name\" = 'log''s')"
        );
        let condition = target_condition(
            &MySqlDialect::default(),
            &targets[..1],
            "`TABLE_SCHEMA`",
            "`TABLE_NAME`",
        );
        assert_eq!(condition, "(`TABLE_SCHEMA` = 'public' AND `TABLE_NAME` = 'users')");
    }

    #[test]
    fn test_loaded_name() {
        assert_eq!(loaded_name("public", "users", "public", None), "users");
        assert_eq!(loaded_name("public", "users", "public", Some("public")), "public.users");
        assert_eq!(loaded_name("audit", "log", "public", None), "audit.log");
    }

    #[test]
    fn test_view_from_row() {
        let row = Row::from_pairs([
            ("type", "MATERIALIZED_VIEW"),
            ("schema", "reporting"),
            ("name", "totals"),
            ("value", "SELECT 1"),
        ]);
        let view = view_from_row(&row, "public", None);
        assert_eq!(view.name, "reporting.totals");
        assert!(view.materialized);
        assert_eq!(view.expression, "SELECT 1");
    }

    #[test]
    fn test_group_by_keeps_order() {
        let rows = vec![
            Row::from_pairs([("name", "b"), ("col", "x")]),
            Row::from_pairs([("name", "a"), ("col", "y")]),
            Row::from_pairs([("name", "b"), ("col", "z")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let groups = group_by(&refs, "name");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "a");
    }

    #[test]
    fn test_catalog_u32() {
        let mut row = Row::new();
        row.insert("len", Scalar::Text("255".into()));
        row.insert("neg", Scalar::Int(-1));
        assert_eq!(catalog_u32(&row, "len"), Some(255));
        assert_eq!(catalog_u32(&row, "neg"), None);
        assert_eq!(catalog_u32(&row, "missing"), None);
    }
}
