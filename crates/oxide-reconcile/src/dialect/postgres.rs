//! PostgreSQL dialect.
//!
//! Postgres has transactional DDL, named enum types and sequences owned by
//! serial columns, so several column changes expand into multi-statement
//! sequences here.

use super::{pair, Capabilities, DialectRules, EnumTypeSupport, SequenceSupport};
use crate::schema::{qualify, Column, GenerationStrategy, Index, Table};
use crate::statement::StatementPair;

/// PostgreSQL dialect.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect {
    schema: Option<String>,
}

impl PostgresDialect {
    /// Creates a dialect; unqualified names resolve into `schema` when set.
    #[must_use]
    pub fn new(schema: Option<String>) -> Self {
        Self { schema }
    }

    /// Quoted path of an object living in the table's schema.
    fn sibling_path(&self, table: &Table, name: &str) -> String {
        self.escape_path(&qualify(table.schema_and_name().0, name))
    }

    fn sequence_name(table: &Table, column: &str) -> String {
        format!("{}_{}_seq", table.bare_name(), column)
    }

    /// Unquoted sequence path, as `nextval` expects it.
    fn sequence_literal(&self, table: &Table, column: &str) -> String {
        qualify(
            table.schema_and_name().0.or(self.schema.as_deref()),
            &Self::sequence_name(table, column),
        )
    }

    fn alter_column(&self, table: &Table, column: &str, clause: &str) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.escape_path(&table.name),
            self.quote_identifier(column),
            clause
        )
    }

    fn serial_keyword(column: &Column) -> Option<&'static str> {
        if !column.is_increment() {
            return None;
        }
        match column.data_type.as_str() {
            "integer" | "int" | "int4" => Some("SERIAL"),
            "smallint" | "int2" => Some("SMALLSERIAL"),
            "bigint" | "int8" => Some("BIGSERIAL"),
            _ => None,
        }
    }

    fn enum_swap(&self, table: &Table, old: &Column, new: &Column) -> Vec<StatementPair> {
        let current = self.enum_type_path(table, new, false);
        let swapped = self.enum_type_path(table, new, true);
        let column = self.quote_identifier(&new.name);
        let array = if new.is_array { "[]" } else { "" };
        let mut pairs = vec![
            pair(
                self.rename_enum_type_sql(&current, &self.enum_type_name(table, new, true)),
                self.rename_enum_type_sql(&swapped, &self.enum_type_name(table, new, false)),
            ),
            pair(
                self.create_enum_type_sql(&current, &new.enum_values),
                self.drop_enum_type_sql(&current),
            ),
        ];
        if let Some(default) = &old.default {
            pairs.push(pair(
                self.alter_column(table, &new.name, "DROP DEFAULT"),
                self.alter_column(table, &new.name, &format!("SET DEFAULT {default}")),
            ));
        }
        pairs.push(pair(
            self.alter_column(
                table,
                &new.name,
                &format!("TYPE {current}{array} USING {column}::\"text\"::{current}{array}"),
            ),
            self.alter_column(
                table,
                &new.name,
                &format!("TYPE {swapped}{array} USING {column}::\"text\"::{swapped}{array}"),
            ),
        ));
        if let Some(default) = &new.default {
            pairs.push(pair(
                self.alter_column(table, &new.name, &format!("SET DEFAULT {default}")),
                self.alter_column(table, &new.name, "DROP DEFAULT"),
            ));
        }
        pairs.push(pair(
            self.drop_enum_type_sql(&swapped),
            self.create_enum_type_sql(&swapped, &old.enum_values),
        ));
        pairs
    }
}

impl DialectRules for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            unique_constraints: true,
            check_constraints: true,
            exclusion_constraints: true,
            named_primary_key: true,
            inline_indices: false,
            inline_primary_key_on_add: false,
            transactional_ddl: true,
            materialized_views: true,
        }
    }

    fn default_namespace(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn full_type(&self, column: &Column) -> String {
        let precision = match (column.precision, column.scale) {
            (Some(p), Some(s)) => format!("({p},{s})"),
            (Some(p), None) => format!("({p})"),
            _ => String::new(),
        };
        let mut sql = if let Some(feature) = &column.spatial_feature_type {
            match column.srid {
                Some(srid) => format!("{}({},{})", column.data_type, feature, srid),
                None => format!("{}({})", column.data_type, feature),
            }
        } else if let Some(length) = column.length {
            format!("{}({})", column.data_type, length)
        } else if let Some((base, zone)) = column
            .data_type
            .split_once(" with")
            .filter(|(base, _)| matches!(*base, "time" | "timestamp"))
        {
            format!("{base}{precision} with{zone}")
        } else {
            format!("{}{}", column.data_type, precision)
        };
        if column.is_array {
            sql.push_str("[]");
        }
        sql
    }

    fn column_definition(&self, table: &Table, column: &Column, _skip_primary: bool) -> String {
        let mut sql = self.quote_identifier(&column.name);
        if let Some(serial) = Self::serial_keyword(column) {
            sql.push(' ');
            sql.push_str(serial);
        } else if column.is_enum() {
            sql.push(' ');
            sql.push_str(&self.enum_type_path(table, column, false));
            if column.is_array {
                sql.push_str(" array");
            }
        } else {
            sql.push(' ');
            sql.push_str(&self.full_type(column));
        }
        if let Some(expression) = &column.as_expression {
            sql.push_str(&format!(" GENERATED ALWAYS AS ({expression}) STORED"));
        }
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" CHARACTER SET \"{charset}\""));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE \"{collation}\""));
        }
        if !column.is_nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        } else if column.is_generated
            && column.generation_strategy == Some(GenerationStrategy::Uuid)
        {
            sql.push_str(" DEFAULT uuid_generate_v4()");
        }
        sql
    }

    fn create_table_sql(
        &self,
        table: &Table,
        primary_key_name: &str,
        create_foreign_keys: bool,
    ) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(table, c, false))
            .collect();

        for unique in &table.uniques {
            definitions.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(&unique.name),
                self.quote_list(&unique.columns)
            ));
        }
        for check in &table.checks {
            definitions.push(format!(
                "CONSTRAINT {} CHECK ({})",
                self.quote_identifier(&check.name),
                check.expression
            ));
        }
        for exclusion in &table.exclusions {
            definitions.push(format!(
                "CONSTRAINT {} EXCLUDE {}",
                self.quote_identifier(&exclusion.name),
                exclusion.expression
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
            definitions.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote_identifier(primary_key_name),
                self.quote_list(&primary)
            ));
        }

        format!(
            "CREATE TABLE {} ({})",
            self.escape_path(&table.name),
            definitions.join(", ")
        )
    }

    fn rename_table_sql(&self, table: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.escape_path(table),
            self.quote_identifier(new_name)
        )
    }

    fn rename_column_sql(&self, table: &Table, old: &Column, new: &Column) -> StatementPair {
        let path = self.escape_path(&table.name);
        let rename = |from: &str, to: &str| {
            format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                path,
                self.quote_identifier(from),
                self.quote_identifier(to)
            )
        };
        pair(rename(&old.name, &new.name), rename(&new.name, &old.name))
    }

    fn alter_column_sql(&self, table: &Table, old: &Column, new: &Column) -> Vec<StatementPair> {
        let mut pairs = Vec::new();

        if old.precision != new.precision || old.scale != new.scale {
            pairs.push(self.alter_column_type_sql(table, old, new));
        }

        let swapped = old.is_enum() && new.is_enum() && old.enum_values != new.enum_values;
        if swapped {
            pairs.extend(self.enum_swap(table, old, new));
        }

        if old.is_nullable != new.is_nullable {
            let (up, down) = if new.is_nullable {
                ("DROP NOT NULL", "SET NOT NULL")
            } else {
                ("SET NOT NULL", "DROP NOT NULL")
            };
            pairs.push(pair(
                self.alter_column(table, &new.name, up),
                self.alter_column(table, &new.name, down),
            ));
        }

        if old.comment != new.comment {
            if let (Some(up), Some(down)) = (
                self.column_comment_sql(table, &new.name, new.comment.as_deref()),
                self.column_comment_sql(table, &new.name, old.comment.as_deref()),
            ) {
                pairs.push(pair(up, down));
            }
        }

        if !swapped && !new.is_increment() && old.default != new.default {
            let set_or_drop = |default: &Option<String>| match default {
                Some(value) => self.alter_column(table, &new.name, &format!("SET DEFAULT {value}")),
                None => self.alter_column(table, &new.name, "DROP DEFAULT"),
            };
            pairs.push(pair(set_or_drop(&new.default), set_or_drop(&old.default)));
        }

        if old.spatial_feature_type != new.spatial_feature_type || old.srid != new.srid {
            pairs.push(self.alter_column_type_sql(table, old, new));
        }

        pairs
    }

    fn alter_column_type_sql(&self, table: &Table, old: &Column, new: &Column) -> StatementPair {
        pair(
            self.alter_column(table, &new.name, &format!("TYPE {}", self.full_type(new))),
            self.alter_column(table, &new.name, &format!("TYPE {}", self.full_type(old))),
        )
    }

    fn column_comment_sql(
        &self,
        table: &Table,
        column: &str,
        comment: Option<&str>,
    ) -> Option<String> {
        Some(format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            self.escape_path(&table.name),
            self.quote_identifier(column),
            comment.map_or_else(|| "NULL".to_string(), |c| self.escape_literal(c))
        ))
    }

    fn create_primary_key_sql(&self, table: &Table, name: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            self.escape_path(&table.name),
            self.quote_identifier(name),
            self.quote_list(columns)
        )
    }

    fn drop_primary_key_sql(&self, table: &Table, name: &str) -> String {
        self.drop_constraint_sql(table, name)
    }

    fn create_index_sql(&self, table: &Table, index: &Index) -> String {
        let mut sql = String::from("CREATE ");
        if index.is_unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.escape_path(&table.name));
        sql.push(' ');
        if index.is_spatial {
            sql.push_str("USING GiST ");
        }
        sql.push('(');
        sql.push_str(&self.quote_list(&index.columns));
        sql.push(')');
        if let Some(predicate) = &index.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }

    fn drop_index_sql(&self, table: &Table, index: &Index) -> String {
        format!("DROP INDEX {}", self.sibling_path(table, &index.name))
    }

    fn rename_index_sql(&self, table: &Table, index: &Index, new_name: &str) -> String {
        format!(
            "ALTER INDEX {} RENAME TO {}",
            self.sibling_path(table, &index.name),
            self.quote_identifier(new_name)
        )
    }

    fn create_namespace_sql(&self, name: &str, if_not_exists: bool) -> String {
        format!(
            "CREATE SCHEMA {}{}",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(name)
        )
    }

    fn drop_namespace_sql(&self, name: &str, if_exists: bool, cascade: bool) -> String {
        format!(
            "DROP SCHEMA {}{}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.quote_identifier(name),
            if cascade { " CASCADE" } else { "" }
        )
    }

    fn enum_types(&self) -> Option<&dyn EnumTypeSupport> {
        Some(self)
    }

    fn sequences(&self) -> Option<&dyn SequenceSupport> {
        Some(self)
    }
}

impl EnumTypeSupport for PostgresDialect {
    fn enum_type_name(&self, table: &Table, column: &Column, old: bool) -> String {
        let name = column.enum_name.clone().unwrap_or_else(|| {
            format!("{}_{}_enum", table.bare_name(), column.name.to_lowercase())
        });
        if old {
            format!("{name}_old")
        } else {
            name
        }
    }

    fn enum_type_path(&self, table: &Table, column: &Column, old: bool) -> String {
        self.sibling_path(table, &self.enum_type_name(table, column, old))
    }

    fn create_enum_type_sql(&self, path: &str, values: &[String]) -> String {
        let values: Vec<String> = values.iter().map(|v| self.escape_literal(v)).collect();
        format!("CREATE TYPE {} AS ENUM({})", path, values.join(", "))
    }

    fn drop_enum_type_sql(&self, path: &str) -> String {
        format!("DROP TYPE {path}")
    }

    fn rename_enum_type_sql(&self, path: &str, new_name: &str) -> String {
        format!(
            "ALTER TYPE {} RENAME TO {}",
            path,
            self.quote_identifier(new_name)
        )
    }
}

impl SequenceSupport for PostgresDialect {
    fn attach_sequence_sql(&self, table: &Table, column: &Column) -> Vec<StatementPair> {
        let sequence = self.sibling_path(table, &Self::sequence_name(table, &column.name));
        let create = format!(
            "CREATE SEQUENCE {} OWNED BY {}.{}",
            sequence,
            self.escape_path(&table.name),
            self.quote_identifier(&column.name)
        );
        let set_default = self.alter_column(
            table,
            &column.name,
            &format!(
                "SET DEFAULT nextval('{}')",
                self.sequence_literal(table, &column.name)
            ),
        );
        vec![
            pair(create, format!("DROP SEQUENCE {sequence}")),
            pair(set_default, self.alter_column(table, &column.name, "DROP DEFAULT")),
        ]
    }

    fn detach_sequence_sql(&self, table: &Table, column: &Column) -> Vec<StatementPair> {
        self.attach_sequence_sql(table, column)
            .into_iter()
            .rev()
            .map(|(up, down)| (down, up))
            .collect()
    }

    fn rename_sequence_sql(
        &self,
        old_table: &Table,
        old_column: &str,
        new_table: &Table,
        new_column: &str,
    ) -> StatementPair {
        let old_name = Self::sequence_name(old_table, old_column);
        let new_name = Self::sequence_name(new_table, new_column);
        pair(
            format!(
                "ALTER SEQUENCE {} RENAME TO {}",
                self.sibling_path(old_table, &old_name),
                self.quote_identifier(&new_name)
            ),
            format!(
                "ALTER SEQUENCE {} RENAME TO {}",
                self.sibling_path(new_table, &new_name),
                self.quote_identifier(&old_name)
            ),
        )
    }
}
