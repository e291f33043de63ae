//! MySQL / MariaDB dialect.
//!
//! MySQL has no unique, check or exclusion constraint objects, declares
//! indices inside `CREATE TABLE`, and rewrites a column with a single
//! `CHANGE` clause. Its DDL is not transactional.

use super::{pair, Capabilities, DialectRules};
use crate::schema::{
    qualify, split_qualified, Column, ForeignKey, GeneratedStorage, GenerationStrategy, Index, Table,
};
use crate::statement::StatementPair;

/// MySQL dialect.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect {
    database: Option<String>,
}

impl MySqlDialect {
    /// Creates a dialect; unqualified names resolve into `database` when set.
    #[must_use]
    pub fn new(database: Option<String>) -> Self {
        Self { database }
    }

    /// `ALTER TABLE .. CHANGE` that redefines column `from` as `column`.
    fn change_column(&self, table: &Table, from: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} CHANGE {} {}",
            self.escape_path(&table.name),
            self.quote_identifier(from),
            self.column_definition(table, column, true)
        )
    }

    fn index_kind(index: &Index) -> &'static str {
        if index.is_unique {
            "UNIQUE "
        } else if index.is_spatial {
            "SPATIAL "
        } else if index.is_fulltext {
            "FULLTEXT "
        } else {
            ""
        }
    }
}

impl DialectRules for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            unique_constraints: false,
            check_constraints: false,
            exclusion_constraints: false,
            named_primary_key: false,
            inline_indices: true,
            inline_primary_key_on_add: true,
            transactional_ddl: false,
            materialized_views: false,
        }
    }

    fn default_namespace(&self) -> Option<&str> {
        self.database.as_deref()
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{name}`")
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn full_type(&self, column: &Column) -> String {
        let data_type = if column.data_type == "simple-enum" {
            "enum"
        } else {
            column.data_type.as_str()
        };
        match (column.length, column.width, column.precision, column.scale) {
            (Some(length), _, _, _) => format!("{data_type}({length})"),
            (None, Some(width), _, _) => format!("{data_type}({width})"),
            (None, None, Some(p), Some(s)) => format!("{data_type}({p},{s})"),
            (None, None, Some(p), None) => format!("{data_type}({p})"),
            _ => data_type.to_string(),
        }
    }

    fn column_definition(&self, _table: &Table, column: &Column, skip_primary: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.full_type(column)
        );
        if let Some(expression) = &column.as_expression {
            sql.push_str(&format!(
                " AS ({}) {}",
                expression,
                column
                    .generated_type
                    .unwrap_or(GeneratedStorage::Virtual)
                    .to_sql()
            ));
        }
        if column.zerofill {
            sql.push_str(" ZEROFILL");
        } else if column.unsigned {
            sql.push_str(" UNSIGNED");
        }
        if column.is_enum() || column.data_type == "set" {
            let values: Vec<String> = column
                .enum_values
                .iter()
                .map(|v| self.escape_literal(v))
                .collect();
            sql.push_str(&format!(" ({})", values.join(", ")));
        }
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" CHARACTER SET \"{charset}\""));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE \"{collation}\""));
        }
        sql.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
        if column.is_primary && !skip_primary {
            sql.push_str(" PRIMARY KEY");
        }
        if column.is_increment() {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.escape_literal(comment));
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if let Some(on_update) = &column.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(on_update);
        }
        sql
    }

    fn create_table_sql(
        &self,
        table: &Table,
        _primary_key_name: &str,
        create_foreign_keys: bool,
    ) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(table, c, true))
            .collect();

        for index in &table.indices {
            definitions.push(format!(
                "{}INDEX {} ({})",
                Self::index_kind(index),
                self.quote_identifier(&index.name),
                self.quote_list(&index.columns)
            ));
        }
        if create_foreign_keys {
            for fk in &table.foreign_keys {
                definitions.push(format!(
                    "CONSTRAINT {} {}",
                    self.quote_identifier(&fk.name),
                    self.foreign_key_clause(fk, true)
                ));
            }
        }
        let primary = table.primary_column_names();
        if !primary.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", self.quote_list(&primary)));
        }

        format!(
            "CREATE TABLE {} ({}) ENGINE={}",
            self.escape_path(&table.name),
            definitions.join(", "),
            table.engine.as_deref().unwrap_or("InnoDB")
        )
    }

    fn rename_table_sql(&self, table: &str, new_name: &str) -> String {
        let (namespace, _) = split_qualified(table);
        format!(
            "RENAME TABLE {} TO {}",
            self.escape_path(table),
            self.escape_path(&qualify(namespace, new_name))
        )
    }

    fn rename_column_sql(&self, table: &Table, old: &Column, new: &Column) -> StatementPair {
        let mut renamed = old.clone();
        renamed.name = new.name.clone();
        pair(
            self.change_column(table, &old.name, &renamed),
            self.change_column(table, &new.name, old),
        )
    }

    fn alter_column_sql(&self, table: &Table, old: &Column, new: &Column) -> Vec<StatementPair> {
        if self.column_definition(table, old, true) == self.column_definition(table, new, true) {
            return Vec::new();
        }
        vec![self.alter_column_type_sql(table, old, new)]
    }

    fn alter_column_type_sql(&self, table: &Table, old: &Column, new: &Column) -> StatementPair {
        pair(
            self.change_column(table, &new.name, new),
            self.change_column(table, &new.name, old),
        )
    }

    fn requires_recreate(&self, old: &Column, new: &Column) -> bool {
        old.differs_structurally(new)
            || old.unsigned != new.unsigned
            || old.zerofill != new.zerofill
            || (old.is_generated != new.is_generated
                && new.generation_strategy != Some(GenerationStrategy::Uuid))
    }

    fn create_primary_key_sql(&self, table: &Table, _name: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.escape_path(&table.name),
            self.quote_list(columns)
        )
    }

    fn drop_primary_key_sql(&self, table: &Table, _name: &str) -> String {
        format!("ALTER TABLE {} DROP PRIMARY KEY", self.escape_path(&table.name))
    }

    fn create_index_sql(&self, table: &Table, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            Self::index_kind(index),
            self.quote_identifier(&index.name),
            self.escape_path(&table.name),
            self.quote_list(&index.columns)
        )
    }

    fn drop_index_sql(&self, table: &Table, index: &Index) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.name),
            self.escape_path(&table.name)
        )
    }

    fn rename_index_sql(&self, table: &Table, index: &Index, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {}, ADD {}INDEX {} ({})",
            self.escape_path(&table.name),
            self.quote_identifier(&index.name),
            Self::index_kind(index),
            self.quote_identifier(new_name),
            self.quote_list(&index.columns)
        )
    }

    fn drop_foreign_key_sql(&self, table: &Table, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.escape_path(&table.name),
            self.quote_identifier(&fk.name)
        )
    }

    fn rename_foreign_key_sql(&self, table: &Table, fk: &ForeignKey, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}, ADD CONSTRAINT {} {}",
            self.escape_path(&table.name),
            self.quote_identifier(&fk.name),
            self.quote_identifier(new_name),
            self.foreign_key_clause(fk, false)
        )
    }

    fn create_namespace_sql(&self, name: &str, if_not_exists: bool) -> String {
        format!(
            "CREATE DATABASE {}{}",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(name)
        )
    }

    fn drop_namespace_sql(&self, name: &str, if_exists: bool, _cascade: bool) -> String {
        format!(
            "DROP DATABASE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.quote_identifier(name)
        )
    }

    fn foreign_key_checks_sql(&self, enabled: bool) -> Option<String> {
        Some(format!("SET FOREIGN_KEY_CHECKS = {}", u8::from(enabled)))
    }

    fn auto_increment_release(&self, table: &Table, column: &Column) -> Option<StatementPair> {
        let mut released = column.clone();
        released.is_generated = false;
        released.generation_strategy = None;
        Some(pair(
            self.change_column(table, &column.name, &released),
            self.change_column(table, &column.name, column),
        ))
    }
}
