//! Database dialect implementations.
//!
//! Each dialect renders object-model values to DDL for one database system.
//! Everything in [`DialectRules`] is a pure function of its arguments: the
//! engine decides which statements to run and in which order, derives object
//! names through the naming strategy, and asks the catalog for facts the
//! object model does not carry.

mod mysql;
mod postgres;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

use crate::catalog::CatalogReader;
use crate::naming::{NameKind, NamingStrategy};
use crate::schema::{split_qualified, Column, ForeignKey, Index, Table, Unique, View};
use crate::statement::{Scalar, Statement, StatementPair};

/// What a dialect can express as first-class objects and statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// `ADD CONSTRAINT .. UNIQUE`. Without it, uniques become unique indices.
    pub unique_constraints: bool,
    /// `ADD CONSTRAINT .. CHECK`.
    pub check_constraints: bool,
    /// `ADD CONSTRAINT .. EXCLUDE`.
    pub exclusion_constraints: bool,
    /// The primary key is a named constraint that can be renamed.
    pub named_primary_key: bool,
    /// Indices are declared inside `CREATE TABLE`.
    pub inline_indices: bool,
    /// `ADD COLUMN` may declare the primary key inline when the table has none.
    pub inline_primary_key_on_add: bool,
    /// DDL statements can be rolled back.
    pub transactional_ddl: bool,
    /// `CREATE MATERIALIZED VIEW`.
    pub materialized_views: bool,
}

/// Named enum types (Postgres `CREATE TYPE .. AS ENUM`).
pub trait EnumTypeSupport: Send + Sync {
    /// Bare type name for `column`; `old` selects the name used while the type
    /// is swapped out.
    fn enum_type_name(&self, table: &Table, column: &Column, old: bool) -> String;

    /// Quoted, possibly schema-qualified type path.
    fn enum_type_path(&self, table: &Table, column: &Column, old: bool) -> String;

    /// Creates the type at `path` with `values`.
    fn create_enum_type_sql(&self, path: &str, values: &[String]) -> String;

    /// Drops the type at `path`.
    fn drop_enum_type_sql(&self, path: &str) -> String;

    /// Renames the type at `path` to the bare name `new_name`.
    fn rename_enum_type_sql(&self, path: &str, new_name: &str) -> String;
}

/// Sequences owned by auto-increment columns (Postgres).
pub trait SequenceSupport: Send + Sync {
    /// Creates the column's sequence and makes it the column default.
    fn attach_sequence_sql(&self, table: &Table, column: &Column) -> Vec<StatementPair>;

    /// Removes the column default and drops its sequence.
    fn detach_sequence_sql(&self, table: &Table, column: &Column) -> Vec<StatementPair>;

    /// Renames the sequence that belongs to `old_column` of `old_table`.
    fn rename_sequence_sql(
        &self,
        old_table: &Table,
        old_column: &str,
        new_table: &Table,
        new_column: &str,
    ) -> StatementPair;
}

/// Trait for database-specific DDL generation.
///
/// Default methods produce ANSI SQL with double-quoted identifiers and
/// `$n` placeholders; dialects override what differs.
pub trait DialectRules: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the capability set.
    fn capabilities(&self) -> Capabilities;

    /// Namespace (schema or database) used for unqualified names.
    fn default_namespace(&self) -> Option<&str>;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{name}\"")
    }

    /// Quotes a possibly qualified name, qualifying unqualified names with
    /// the default namespace.
    fn escape_path(&self, name: &str) -> String {
        let (namespace, bare) = split_qualified(name);
        match namespace.or_else(|| self.default_namespace()) {
            Some(ns) => format!(
                "{}.{}",
                self.quote_identifier(ns),
                self.quote_identifier(bare)
            ),
            None => self.quote_identifier(bare),
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    /// Single-quoted string literal.
    fn escape_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Comma-separated quoted identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Type with its length, precision and array suffixes.
    fn full_type(&self, column: &Column) -> String;

    /// Column fragment used by `CREATE TABLE` and `ADD`.
    fn column_definition(&self, table: &Table, column: &Column, skip_primary: bool) -> String;

    /// `CREATE TABLE` for an already normalized table.
    fn create_table_sql(
        &self,
        table: &Table,
        primary_key_name: &str,
        create_foreign_keys: bool,
    ) -> String;

    /// Generates SQL for dropping a table.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.escape_path(table))
    }

    /// Generates SQL for renaming a table to the bare name `new_name`.
    fn rename_table_sql(&self, table: &str, new_name: &str) -> String;

    /// Generates SQL for deleting every row of a table.
    fn truncate_sql(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.escape_path(table))
    }

    /// Generates SQL for adding a column.
    fn add_column_sql(&self, table: &Table, column: &Column, skip_primary: bool) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.escape_path(&table.name),
            self.column_definition(table, column, skip_primary)
        )
    }

    /// Generates SQL for dropping a column.
    fn drop_column_sql(&self, table: &Table, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.escape_path(&table.name),
            self.quote_identifier(column)
        )
    }

    /// Renames `old` to `new.name`, keeping the rest of the old definition.
    fn rename_column_sql(&self, table: &Table, old: &Column, new: &Column) -> StatementPair;

    /// Statements that turn `old` into `new` when both share a name and no
    /// re-creation is needed. Key, uniqueness and generation changes are not
    /// covered here.
    fn alter_column_sql(&self, table: &Table, old: &Column, new: &Column) -> Vec<StatementPair>;

    /// In-place type change used by the `AlterInPlace` column policy.
    fn alter_column_type_sql(&self, table: &Table, old: &Column, new: &Column) -> StatementPair;

    /// Whether turning `old` into `new` needs a drop and re-add.
    fn requires_recreate(&self, old: &Column, new: &Column) -> bool {
        old.differs_structurally(new)
    }

    /// Standalone comment statement, for dialects that cannot inline it.
    fn column_comment_sql(
        &self,
        _table: &Table,
        _column: &str,
        _comment: Option<&str>,
    ) -> Option<String> {
        None
    }

    /// Generates SQL for adding a primary key.
    fn create_primary_key_sql(&self, table: &Table, name: &str, columns: &[String]) -> String;

    /// Generates SQL for dropping the primary key.
    fn drop_primary_key_sql(&self, table: &Table, name: &str) -> String;

    /// Generates SQL for renaming a named constraint.
    fn rename_constraint_sql(&self, table: &Table, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
            self.escape_path(&table.name),
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Generates SQL for dropping a named constraint.
    fn drop_constraint_sql(&self, table: &Table, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.escape_path(&table.name),
            self.quote_identifier(name)
        )
    }

    /// Generates SQL for adding a unique constraint.
    fn create_unique_sql(&self, table: &Table, unique: &Unique) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            self.escape_path(&table.name),
            self.quote_identifier(&unique.name),
            self.quote_list(&unique.columns)
        )
    }

    /// Generates SQL for adding a check constraint.
    fn create_check_sql(&self, table: &Table, name: &str, expression: &str) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            self.escape_path(&table.name),
            self.quote_identifier(name),
            expression
        )
    }

    /// Generates SQL for adding an exclusion constraint.
    fn create_exclusion_sql(&self, table: &Table, name: &str, expression: &str) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} EXCLUDE {}",
            self.escape_path(&table.name),
            self.quote_identifier(name),
            expression
        )
    }

    /// Generates SQL for creating an index.
    fn create_index_sql(&self, table: &Table, index: &Index) -> String;

    /// Generates SQL for dropping an index.
    fn drop_index_sql(&self, table: &Table, index: &Index) -> String;

    /// Generates SQL for renaming `index` to `new_name`.
    fn rename_index_sql(&self, table: &Table, index: &Index, new_name: &str) -> String;

    /// `FOREIGN KEY (..) REFERENCES ..` with its actions.
    fn foreign_key_clause(&self, fk: &ForeignKey, spaced: bool) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {}",
            self.quote_list(&fk.columns),
            self.escape_path(&fk.referenced_table)
        );
        if spaced {
            sql.push(' ');
        }
        sql.push('(');
        sql.push_str(
            &fk.referenced_columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(if spaced { ", " } else { "," }),
        );
        sql.push(')');
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.to_sql());
        }
        if let Some(action) = fk.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.to_sql());
        }
        if let Some(deferrable) = &fk.deferrable {
            sql.push_str(" DEFERRABLE ");
            sql.push_str(deferrable);
        }
        sql
    }

    /// Generates SQL for adding a foreign key.
    fn create_foreign_key_sql(&self, table: &Table, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.escape_path(&table.name),
            self.quote_identifier(&fk.name),
            self.foreign_key_clause(fk, false)
        )
    }

    /// Generates SQL for dropping a foreign key.
    fn drop_foreign_key_sql(&self, table: &Table, fk: &ForeignKey) -> String {
        self.drop_constraint_sql(table, &fk.name)
    }

    /// Generates SQL for renaming a foreign key.
    fn rename_foreign_key_sql(&self, table: &Table, fk: &ForeignKey, new_name: &str) -> String {
        self.rename_constraint_sql(table, &fk.name, new_name)
    }

    /// Generates SQL for creating a view.
    fn create_view_sql(&self, view: &View) -> String {
        format!(
            "CREATE {}VIEW {} AS {}",
            if view.materialized { "MATERIALIZED " } else { "" },
            self.escape_path(&view.name),
            view.expression
        )
    }

    /// Generates SQL for dropping a view.
    fn drop_view_sql(&self, view: &View) -> String {
        format!(
            "DROP {}VIEW {}",
            if view.materialized { "MATERIALIZED " } else { "" },
            self.escape_path(&view.name)
        )
    }

    /// Records a view definition in the registry table.
    fn insert_view_metadata_sql(
        &self,
        view: &View,
        metadata_table: &str,
        namespace: Option<&str>,
    ) -> Statement {
        let (_, name) = split_qualified(&view.name);
        Statement::with_params(
            format!(
                "INSERT INTO {} ({}, {}, {}, {}) VALUES ({}, {}, {}, {})",
                self.escape_path(metadata_table),
                self.quote_identifier("type"),
                self.quote_identifier("schema"),
                self.quote_identifier("name"),
                self.quote_identifier("value"),
                self.placeholder(1),
                self.placeholder(2),
                self.placeholder(3),
                self.placeholder(4)
            ),
            vec![
                Scalar::from(view.registry_type()),
                Scalar::from(namespace),
                Scalar::from(name),
                Scalar::from(view.expression.as_str()),
            ],
        )
    }

    /// Removes a view definition from the registry table.
    fn delete_view_metadata_sql(
        &self,
        view: &View,
        metadata_table: &str,
        namespace: Option<&str>,
    ) -> Statement {
        let (_, name) = split_qualified(&view.name);
        Statement::with_params(
            format!(
                "DELETE FROM {} WHERE {} = {} AND {} = {} AND {} = {}",
                self.escape_path(metadata_table),
                self.quote_identifier("type"),
                self.placeholder(1),
                self.quote_identifier("schema"),
                self.placeholder(2),
                self.quote_identifier("name"),
                self.placeholder(3)
            ),
            vec![
                Scalar::from(view.registry_type()),
                Scalar::from(namespace),
                Scalar::from(name),
            ],
        )
    }

    /// Creates the view registry table when it is missing.
    fn create_metadata_table_sql(&self, metadata_table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} varchar(255) NOT NULL, {} varchar(255) NULL, {} varchar(255) NULL, {} text NULL)",
            self.escape_path(metadata_table),
            self.quote_identifier("type"),
            self.quote_identifier("schema"),
            self.quote_identifier("name"),
            self.quote_identifier("value")
        )
    }

    /// Generates SQL for creating a namespace.
    fn create_namespace_sql(&self, name: &str, if_not_exists: bool) -> String;

    /// Generates SQL for dropping a namespace.
    fn drop_namespace_sql(&self, name: &str, if_exists: bool, cascade: bool) -> String;

    /// Opens a transaction.
    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
    }

    /// Commits the open transaction.
    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    /// Rolls back the open transaction.
    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Toggles foreign key enforcement for the session, where supported.
    fn foreign_key_checks_sql(&self, _enabled: bool) -> Option<String> {
        None
    }

    /// Statements that strip and restore the auto-increment attribute of
    /// `column` around a primary key change, as `(release, restore)`.
    fn auto_increment_release(&self, _table: &Table, _column: &Column) -> Option<StatementPair> {
        None
    }

    /// Named enum type support, if the dialect has it.
    fn enum_types(&self) -> Option<&dyn EnumTypeSupport> {
        None
    }

    /// Owned sequence support, if the dialect has it.
    fn sequences(&self) -> Option<&dyn SequenceSupport> {
        None
    }
}

/// A dialect together with its catalog queries; what the engine is generic
/// over.
pub trait Dialect: DialectRules + CatalogReader {}

impl<T: DialectRules + CatalogReader> Dialect for T {}

pub(crate) fn pair(up: impl Into<Statement>, down: impl Into<Statement>) -> StatementPair {
    (up.into(), down.into())
}

/// Fills in missing names and expands uniqueness flags into the objects the
/// dialect can express.
///
/// Single-column `is_unique` flags not already covered become uniques.
/// Without unique constraints, every unique becomes a unique index instead.
pub fn normalize_table(table: &mut Table, capabilities: &Capabilities, naming: &dyn NamingStrategy) {
    let table_name = table.name.clone();

    let flagged: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.is_unique && !c.is_primary)
        .map(|c| c.name.clone())
        .collect();
    for column in flagged {
        let columns = vec![column];
        let covered = table.uniques.iter().any(|u| u.columns == columns)
            || table
                .indices
                .iter()
                .any(|i| i.is_unique && i.columns == columns);
        if !covered {
            table.uniques.push(Unique::new(columns));
        }
    }

    for unique in &mut table.uniques {
        if unique.name.is_empty() {
            unique.name = naming.name_for(NameKind::Unique, &table_name, &unique.columns, None);
        }
    }

    if !capabilities.unique_constraints {
        for unique in std::mem::take(&mut table.uniques) {
            let exists = table
                .indices
                .iter()
                .any(|i| i.is_unique && i.columns == unique.columns);
            if !exists {
                table
                    .indices
                    .push(Index::new(unique.columns).named(unique.name).unique());
            }
        }
    }

    for index in &mut table.indices {
        if index.name.is_empty() {
            index.name = naming.name_for(
                NameKind::Index,
                &table_name,
                &index.columns,
                index.predicate.as_deref(),
            );
        }
    }
    for fk in &mut table.foreign_keys {
        if fk.name.is_empty() {
            fk.name = naming.name_for(NameKind::ForeignKey, &table_name, &fk.columns, None);
        }
    }
    for check in &mut table.checks {
        if check.name.is_empty() {
            check.name = naming.name_for(
                NameKind::Check,
                &table_name,
                &check.columns,
                Some(&check.expression),
            );
        }
    }
    for exclusion in &mut table.exclusions {
        if exclusion.name.is_empty() {
            exclusion.name =
                naming.name_for(NameKind::Exclusion, &table_name, &[], Some(&exclusion.expression));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::DefaultNamingStrategy;
    use crate::schema::{Check, GenerationStrategy};

    fn users() -> Table {
        Table::new("users")
            .column(
                Column::new("id", "integer")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(Column::new("email", "varchar").length(255).unique())
            .column(Column::new("org_id", "integer"))
            .index(Index::new(["org_id"]))
            .foreign_key(ForeignKey::new(["org_id"], "orgs", ["id"]))
            .check(Check::new("\"org_id\" > 0"))
    }

    #[test]
    fn test_normalize_with_unique_constraints() {
        let mut table = users();
        let caps = PostgresDialect::default().capabilities();
        normalize_table(&mut table, &caps, &DefaultNamingStrategy::default());

        assert_eq!(table.uniques.len(), 1);
        assert_eq!(table.uniques[0].name, "users_email");
        assert_eq!(table.indices[0].name, "users_org_id_idx");
        assert_eq!(table.foreign_keys[0].name, "users_org_id_fkey");
        assert!(table.checks[0].name.ends_with("_check"));
    }

    #[test]
    fn test_normalize_without_unique_constraints() {
        let mut table = users().unique(Unique::new(["org_id", "email"]));
        let caps = MySqlDialect::default().capabilities();
        normalize_table(&mut table, &caps, &DefaultNamingStrategy::default());

        assert!(table.uniques.is_empty());
        let names: Vec<&str> = table.indices.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["users_org_id_idx", "users_org_id_email", "users_email"]);
        assert!(table.indices[1].is_unique && table.indices[2].is_unique);
    }

    #[test]
    fn test_normalize_keeps_explicit_names() {
        let mut table = Table::new("t")
            .column(Column::new("a", "int").unique())
            .unique(Unique::new(["a"]).named("t_a_key"));
        let caps = PostgresDialect::default().capabilities();
        normalize_table(&mut table, &caps, &DefaultNamingStrategy::default());
        assert_eq!(table.uniques.len(), 1);
        assert_eq!(table.uniques[0].name, "t_a_key");
    }

    #[test]
    fn test_escape_path_uses_default_namespace() {
        let dialect = PostgresDialect::new(Some("app".to_string()));
        assert_eq!(dialect.escape_path("users"), "\"app\".\"users\"");
        assert_eq!(dialect.escape_path("audit.log"), "\"audit\".\"log\"");
        assert_eq!(PostgresDialect::default().escape_path("users"), "\"users\"");
    }

    #[test]
    fn test_view_metadata_statements() {
        let dialect = PostgresDialect::default();
        let view = View::new("public.active_users", "SELECT 1");
        let insert = dialect.insert_view_metadata_sql(&view, "oxide_metadata", Some("public"));
        assert_eq!(
            insert.sql,
            "INSERT INTO \"oxide_metadata\" (\"type\", \"schema\", \"name\", \"value\") VALUES ($1, $2, $3, $4)"
        );
        assert_eq!(
            insert.params,
            vec![
                Scalar::from("VIEW"),
                Scalar::from("public"),
                Scalar::from("active_users"),
                Scalar::from("SELECT 1"),
            ]
        );
        let delete = MySqlDialect::default().delete_view_metadata_sql(&view, "oxide_metadata", None);
        assert_eq!(
            delete.sql,
            "DELETE FROM `oxide_metadata` WHERE `type` = ? AND `schema` = ? AND `name` = ?"
        );
        assert_eq!(delete.params[1], Scalar::Null);
    }
}
