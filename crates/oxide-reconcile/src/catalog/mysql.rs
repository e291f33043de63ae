//! MySQL catalog queries over `INFORMATION_SCHEMA`.

use async_trait::async_trait;
use tracing::debug;

use super::{
    catalog_u32, group_by, loaded_name, resolve_targets, rows_for, target_condition,
    view_from_row, CatalogReader,
};
use crate::dialect::{DialectRules, MySqlDialect};
use crate::error::Result;
use crate::executor::{DatabaseContext, QueryExecutor};
use crate::schema::{
    split_qualified, Column, ForeignKey, GeneratedStorage, GenerationStrategy, Index,
    ReferentialAction, Table, View,
};
use crate::statement::{Row, Scalar};

const LENGTH_TYPES: &[&str] = &["char", "varchar", "nchar", "nvarchar", "binary", "varbinary"];

/// Display widths MySQL reports for integer columns declared without one.
const DEFAULT_WIDTHS: &[(&str, u32)] = &[
    ("tinyint", 4),
    ("smallint", 6),
    ("mediumint", 9),
    ("int", 11),
    ("bigint", 20),
];

/// Raw rows of one `load_tables` call.
#[derive(Debug, Default)]
struct CatalogRows {
    tables: Vec<Row>,
    columns: Vec<Row>,
    primary_keys: Vec<Row>,
    schemata: Vec<Row>,
    indices: Vec<Row>,
    foreign_keys: Vec<Row>,
}

impl MySqlDialect {
    fn current_database(context: &DatabaseContext) -> &str {
        context.database.as_deref().unwrap_or_default()
    }

    fn lookup_database<'a>(&'a self, context: &'a DatabaseContext) -> &'a str {
        self.default_namespace()
            .unwrap_or_else(|| Self::current_database(context))
    }

    async fn exists(&self, executor: &dyn QueryExecutor, sql: &str, params: &[&str]) -> Result<bool> {
        let params: Vec<Scalar> = params.iter().copied().map(Scalar::from).collect();
        Ok(!executor.execute(sql, &params).await?.is_empty())
    }

    fn assemble_tables(&self, rows: &CatalogRows, current: &str) -> Vec<Table> {
        let configured = self.default_namespace();
        rows.tables
            .iter()
            .map(|db_table| {
                let database = db_table.text_or_empty("TABLE_SCHEMA");
                let name = db_table.text_or_empty("TABLE_NAME");
                let mut table = Table::new(loaded_name(database, name, current, configured));
                table.engine = db_table.text("ENGINE").map(str::to_string);

                let schema_defaults = rows
                    .schemata
                    .iter()
                    .find(|s| s.text("SCHEMA_NAME") == Some(database));
                let indices = rows_for(&rows.indices, "TABLE_SCHEMA", "TABLE_NAME", database, name);
                let primary: Vec<&str> =
                    rows_for(&rows.primary_keys, "TABLE_SCHEMA", "TABLE_NAME", database, name)
                        .into_iter()
                        .filter_map(|r| r.text("COLUMN_NAME"))
                        .collect();

                table.columns = rows_for(&rows.columns, "TABLE_SCHEMA", "TABLE_NAME", database, name)
                    .into_iter()
                    .map(|row| {
                        let mut column = self.assemble_column(row, schema_defaults);
                        column.is_primary = primary.contains(&column.name.as_str());
                        column.is_unique = is_single_unique(&indices, &column.name);
                        column
                    })
                    .collect();

                let foreign_keys =
                    rows_for(&rows.foreign_keys, "TABLE_SCHEMA", "TABLE_NAME", database, name);
                for (constraint_name, members) in group_by(&foreign_keys, "CONSTRAINT_NAME") {
                    let first = members[0];
                    let referenced = loaded_name(
                        first.text_or_empty("REFERENCED_TABLE_SCHEMA"),
                        first.text_or_empty("REFERENCED_TABLE_NAME"),
                        current,
                        configured,
                    );
                    let mut fk = ForeignKey::new(
                        texts(&members, "COLUMN_NAME"),
                        referenced,
                        texts(&members, "REFERENCED_COLUMN_NAME"),
                    )
                    .named(constraint_name);
                    fk.on_delete = first.text("ON_DELETE").and_then(ReferentialAction::from_catalog);
                    fk.on_update = first.text("ON_UPDATE").and_then(ReferentialAction::from_catalog);
                    table.foreign_keys.push(fk);
                }

                for (index_name, members) in group_by(&indices, "INDEX_NAME") {
                    let mut index = Index::new(texts(&members, "COLUMN_NAME")).named(index_name);
                    index.is_unique = members[0].int("NON_UNIQUE") == Some(0);
                    index.is_spatial = members[0].text("INDEX_TYPE") == Some("SPATIAL");
                    index.is_fulltext = members[0].text("INDEX_TYPE") == Some("FULLTEXT");
                    table.indices.push(index);
                }

                table
            })
            .collect()
    }

    fn assemble_column(&self, row: &Row, schema_defaults: Option<&Row>) -> Column {
        let column_type = row.text_or_empty("COLUMN_TYPE");
        let extra = row.text_or_empty("EXTRA");
        let mut column = Column::new(
            row.text_or_empty("COLUMN_NAME"),
            row.text_or_empty("DATA_TYPE").to_lowercase(),
        );
        let data_type = column.data_type.clone();

        if let Some((_, default_width)) = DEFAULT_WIDTHS.iter().find(|(t, _)| *t == data_type) {
            column.width = parenthesized(column_type)
                .and_then(|w| w.parse().ok())
                .filter(|w| w != default_width);
        }

        column.default = match row.text("COLUMN_DEFAULT") {
            None | Some("NULL") => None,
            Some(d) if d.to_ascii_uppercase().starts_with("CURRENT_TIMESTAMP") => Some(d.to_string()),
            Some(d) => Some(self.escape_literal(d)),
        };
        if let Some(position) = extra.find("on update ") {
            column.on_update = Some(extra[position + "on update ".len()..].to_string());
        }
        if let Some(expression) = row.text("GENERATION_EXPRESSION").filter(|e| !e.is_empty()) {
            column.as_expression = Some(expression.to_string());
            column.generated_type = Some(if extra.contains("VIRTUAL") {
                GeneratedStorage::Virtual
            } else {
                GeneratedStorage::Stored
            });
        }

        column.is_nullable = row.flag("IS_NULLABLE");
        column.zerofill = column_type.contains("zerofill");
        column.unsigned = column.zerofill || column_type.contains("unsigned");
        if extra.contains("auto_increment") {
            column.is_generated = true;
            column.generation_strategy = Some(GenerationStrategy::Increment);
        }
        column.comment = row
            .text("COLUMN_COMMENT")
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let default_charset = schema_defaults.and_then(|s| s.text("CHARSET"));
        let default_collation = schema_defaults.and_then(|s| s.text("COLLATION"));
        column.charset = row
            .text("CHARACTER_SET_NAME")
            .filter(|c| Some(*c) != default_charset)
            .map(str::to_string);
        column.collation = row
            .text("COLLATION_NAME")
            .filter(|c| Some(*c) != default_collation)
            .map(str::to_string);

        if LENGTH_TYPES.contains(&data_type.as_str()) {
            column.length = catalog_u32(row, "CHARACTER_MAXIMUM_LENGTH");
        }
        match data_type.as_str() {
            "decimal" => {
                column.precision = catalog_u32(row, "NUMERIC_PRECISION");
                column.scale = catalog_u32(row, "NUMERIC_SCALE");
            }
            "double" | "float" if column_type.contains('(') => {
                column.precision = catalog_u32(row, "NUMERIC_PRECISION");
                column.scale = catalog_u32(row, "NUMERIC_SCALE");
            }
            "enum" | "set" => column.enum_values = parse_enum_values(column_type),
            "datetime" | "time" | "timestamp" => {
                column.precision = catalog_u32(row, "DATETIME_PRECISION").filter(|p| *p != 0);
            }
            _ => {}
        }
        column
    }
}

/// Whether a unique index covers exactly this column.
fn is_single_unique(indices: &[&Row], column: &str) -> bool {
    let Some(unique) = indices
        .iter()
        .find(|i| i.text("COLUMN_NAME") == Some(column) && i.int("NON_UNIQUE") == Some(0))
    else {
        return false;
    };
    !indices.iter().any(|i| {
        i.text("INDEX_NAME") == unique.text("INDEX_NAME") && i.text("COLUMN_NAME") != Some(column)
    })
}

fn texts(rows: &[&Row], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.text(column))
        .map(str::to_string)
        .collect()
}

/// Text between the first `(` and the last `)`.
fn parenthesized(column_type: &str) -> Option<&str> {
    let start = column_type.find('(')?;
    let end = column_type.rfind(')')?;
    (start < end).then(|| &column_type[start + 1..end])
}

/// Values of `enum('a','b')` or `set(..)`, with `''` unescaped.
fn parse_enum_values(column_type: &str) -> Vec<String> {
    let Some(body) = parenthesized(column_type) else {
        return Vec::new();
    };
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            '\'' if in_quote => {
                values.push(std::mem::take(&mut current));
                in_quote = false;
            }
            '\'' => in_quote = true,
            _ if in_quote => current.push(c),
            _ => {}
        }
    }
    values
}

#[async_trait]
impl CatalogReader for MySqlDialect {
    async fn load_tables(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        names: &[String],
    ) -> Result<Vec<Table>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let current = Self::current_database(context);
        let targets = resolve_targets(names, self.lookup_database(context));
        let condition = target_condition(self, &targets, "`TABLE_SCHEMA`", "`TABLE_NAME`");
        let index_condition = target_condition(self, &targets, "`s`.`TABLE_SCHEMA`", "`s`.`TABLE_NAME`");
        let fk_condition = target_condition(self, &targets, "`kcu`.`TABLE_SCHEMA`", "`kcu`.`TABLE_NAME`");

        let tables_sql = format!(
            "SELECT `TABLE_SCHEMA` AS `TABLE_SCHEMA`, `TABLE_NAME` AS `TABLE_NAME`, `ENGINE` AS `ENGINE` \
             FROM `INFORMATION_SCHEMA`.`TABLES` WHERE {condition}"
        );
        let columns_sql = format!(
            "SELECT `TABLE_SCHEMA` AS `TABLE_SCHEMA`, `TABLE_NAME` AS `TABLE_NAME`, `COLUMN_NAME` AS `COLUMN_NAME`, \
             `DATA_TYPE` AS `DATA_TYPE`, `COLUMN_TYPE` AS `COLUMN_TYPE`, `COLUMN_DEFAULT` AS `COLUMN_DEFAULT`, \
             `IS_NULLABLE` AS `IS_NULLABLE`, `EXTRA` AS `EXTRA`, `GENERATION_EXPRESSION` AS `GENERATION_EXPRESSION`, \
             `COLUMN_COMMENT` AS `COLUMN_COMMENT`, `CHARACTER_SET_NAME` AS `CHARACTER_SET_NAME`, \
             `COLLATION_NAME` AS `COLLATION_NAME`, `CHARACTER_MAXIMUM_LENGTH` AS `CHARACTER_MAXIMUM_LENGTH`, \
             `NUMERIC_PRECISION` AS `NUMERIC_PRECISION`, `NUMERIC_SCALE` AS `NUMERIC_SCALE`, \
             `DATETIME_PRECISION` AS `DATETIME_PRECISION` \
             FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE {condition} ORDER BY `ORDINAL_POSITION`"
        );
        let primary_sql = format!(
            "SELECT `TABLE_SCHEMA` AS `TABLE_SCHEMA`, `TABLE_NAME` AS `TABLE_NAME`, `COLUMN_NAME` AS `COLUMN_NAME` \
             FROM `INFORMATION_SCHEMA`.`KEY_COLUMN_USAGE` WHERE `CONSTRAINT_NAME` = 'PRIMARY' AND ({condition}) \
             ORDER BY `ORDINAL_POSITION`"
        );
        let schemata_sql = "SELECT `SCHEMA_NAME` AS `SCHEMA_NAME`, `DEFAULT_CHARACTER_SET_NAME` AS `CHARSET`, \
                            `DEFAULT_COLLATION_NAME` AS `COLLATION` FROM `INFORMATION_SCHEMA`.`SCHEMATA`";
        let indices_sql = format!(
            "SELECT `s`.`TABLE_SCHEMA` AS `TABLE_SCHEMA`, `s`.`TABLE_NAME` AS `TABLE_NAME`, `s`.`INDEX_NAME` AS `INDEX_NAME`, \
             `s`.`COLUMN_NAME` AS `COLUMN_NAME`, `s`.`NON_UNIQUE` AS `NON_UNIQUE`, `s`.`INDEX_TYPE` AS `INDEX_TYPE` \
             FROM `INFORMATION_SCHEMA`.`STATISTICS` `s` \
             LEFT JOIN `INFORMATION_SCHEMA`.`REFERENTIAL_CONSTRAINTS` `rc` \
             ON `s`.`INDEX_NAME` = `rc`.`CONSTRAINT_NAME` AND `s`.`TABLE_SCHEMA` = `rc`.`CONSTRAINT_SCHEMA` \
             WHERE ({index_condition}) AND `s`.`INDEX_NAME` != 'PRIMARY' AND `rc`.`CONSTRAINT_NAME` IS NULL \
             ORDER BY `s`.`INDEX_NAME`, `s`.`SEQ_IN_INDEX`"
        );
        let foreign_keys_sql = format!(
            "SELECT `kcu`.`TABLE_SCHEMA` AS `TABLE_SCHEMA`, `kcu`.`TABLE_NAME` AS `TABLE_NAME`, \
             `kcu`.`CONSTRAINT_NAME` AS `CONSTRAINT_NAME`, `kcu`.`COLUMN_NAME` AS `COLUMN_NAME`, \
             `kcu`.`REFERENCED_TABLE_SCHEMA` AS `REFERENCED_TABLE_SCHEMA`, `kcu`.`REFERENCED_TABLE_NAME` AS `REFERENCED_TABLE_NAME`, \
             `kcu`.`REFERENCED_COLUMN_NAME` AS `REFERENCED_COLUMN_NAME`, `rc`.`DELETE_RULE` AS `ON_DELETE`, \
             `rc`.`UPDATE_RULE` AS `ON_UPDATE` \
             FROM `INFORMATION_SCHEMA`.`KEY_COLUMN_USAGE` `kcu` \
             INNER JOIN `INFORMATION_SCHEMA`.`REFERENTIAL_CONSTRAINTS` `rc` \
             ON `rc`.`CONSTRAINT_NAME` = `kcu`.`CONSTRAINT_NAME` AND `rc`.`CONSTRAINT_SCHEMA` = `kcu`.`CONSTRAINT_SCHEMA` \
             WHERE {fk_condition} ORDER BY `kcu`.`ORDINAL_POSITION`"
        );

        let (tables, columns, primary_keys, schemata, indices, foreign_keys) = futures::try_join!(
            executor.execute(&tables_sql, &[]),
            executor.execute(&columns_sql, &[]),
            executor.execute(&primary_sql, &[]),
            executor.execute(schemata_sql, &[]),
            executor.execute(&indices_sql, &[]),
            executor.execute(&foreign_keys_sql, &[]),
        )?;
        if tables.is_empty() {
            return Ok(Vec::new());
        }
        debug!(tables = tables.len(), columns = columns.len(), "Loaded catalog rows");

        let rows = CatalogRows {
            tables,
            columns,
            primary_keys,
            schemata,
            indices,
            foreign_keys,
        };
        Ok(self.assemble_tables(&rows, current))
    }

    async fn load_views(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        names: &[String],
        metadata_table: &str,
    ) -> Result<Vec<View>> {
        if !self.has_table(executor, context, metadata_table).await? {
            return Ok(Vec::new());
        }
        let mut sql = format!(
            "SELECT `t`.`type` AS `type`, `t`.`schema` AS `schema`, `t`.`name` AS `name`, `t`.`value` AS `value` \
             FROM {} `t` \
             INNER JOIN `INFORMATION_SCHEMA`.`VIEWS` `v` ON `v`.`TABLE_SCHEMA` = `t`.`schema` AND `v`.`TABLE_NAME` = `t`.`name` \
             WHERE `t`.`type` = 'VIEW'",
            self.escape_path(metadata_table)
        );
        if !names.is_empty() {
            let targets = resolve_targets(names, self.lookup_database(context));
            sql.push_str(&format!(
                " AND ({})",
                target_condition(self, &targets, "`t`.`schema`", "`t`.`name`")
            ));
        }
        let rows = executor.execute(&sql, &[]).await?;
        let current = Self::current_database(context);
        Ok(rows
            .iter()
            .map(|row| view_from_row(row, current, self.default_namespace()))
            .collect())
    }

    async fn has_table(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        name: &str,
    ) -> Result<bool> {
        let (database, table) = split_qualified(name);
        let database = database.unwrap_or_else(|| self.lookup_database(context));
        self.exists(
            executor,
            "SELECT 1 FROM `INFORMATION_SCHEMA`.`TABLES` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ?",
            &[database, table],
        )
        .await
    }

    async fn has_column(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let (database, table) = split_qualified(table);
        let database = database.unwrap_or_else(|| self.lookup_database(context));
        self.exists(
            executor,
            "SELECT 1 FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? AND `COLUMN_NAME` = ?",
            &[database, table, column],
        )
        .await
    }

    async fn has_namespace(&self, executor: &dyn QueryExecutor, name: &str) -> Result<bool> {
        self.exists(
            executor,
            "SELECT 1 FROM `INFORMATION_SCHEMA`.`SCHEMATA` WHERE `SCHEMA_NAME` = ?",
            &[name],
        )
        .await
    }

    async fn drop_all_objects(&self, executor: &dyn QueryExecutor, namespace: &str) -> Result<()> {
        let database = self.escape_literal(namespace);
        let selects = [
            format!(
                "SELECT concat('DROP VIEW IF EXISTS `', `TABLE_SCHEMA`, '`.`', `TABLE_NAME`, '`') AS `query` \
                 FROM `INFORMATION_SCHEMA`.`VIEWS` WHERE `TABLE_SCHEMA` = {database}"
            ),
            format!(
                "SELECT concat('DROP TABLE IF EXISTS `', `TABLE_SCHEMA`, '`.`', `TABLE_NAME`, '`') AS `query` \
                 FROM `INFORMATION_SCHEMA`.`TABLES` WHERE `TABLE_SCHEMA` = {database} AND `TABLE_TYPE` = 'BASE TABLE'"
            ),
        ];
        for select in &selects {
            for row in executor.execute(select, &[]).await? {
                if let Some(drop) = row.text("query") {
                    executor.execute(drop, &[]).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MemoryExecutor;

    fn row(pairs: &[(&str, Scalar)]) -> Row {
        let mut row = Row::new();
        for (k, v) in pairs {
            row.insert(*k, v.clone());
        }
        row
    }

    fn text(value: &str) -> Scalar {
        Scalar::from(value)
    }

    fn column_row(name: &str, data_type: &str, column_type: &str, extra: &[(&str, Scalar)]) -> Row {
        let mut r = row(&[
            ("TABLE_SCHEMA", text("shop")),
            ("TABLE_NAME", text("orders")),
            ("COLUMN_NAME", text(name)),
            ("DATA_TYPE", text(data_type)),
            ("COLUMN_TYPE", text(column_type)),
            ("IS_NULLABLE", text("NO")),
            ("EXTRA", text("")),
            ("COLUMN_COMMENT", text("")),
        ]);
        for (k, v) in extra {
            r.insert(*k, v.clone());
        }
        r
    }

    fn index_row(name: &str, column: &str, non_unique: i64) -> Row {
        row(&[
            ("TABLE_SCHEMA", text("shop")),
            ("TABLE_NAME", text("orders")),
            ("INDEX_NAME", text(name)),
            ("COLUMN_NAME", text(column)),
            ("NON_UNIQUE", Scalar::from(non_unique)),
            ("INDEX_TYPE", text("BTREE")),
        ])
    }

    fn catalog() -> CatalogRows {
        CatalogRows {
            tables: vec![row(&[
                ("TABLE_SCHEMA", text("shop")),
                ("TABLE_NAME", text("orders")),
                ("ENGINE", text("InnoDB")),
            ])],
            columns: vec![
                column_row("id", "int", "int(10) unsigned", &[("EXTRA", text("auto_increment"))]),
                column_row(
                    "code",
                    "varchar",
                    "varchar(32)",
                    &[
                        ("CHARACTER_MAXIMUM_LENGTH", Scalar::from(32_i64)),
                        ("CHARACTER_SET_NAME", text("utf8mb4")),
                        ("COLLATION_NAME", text("utf8mb4_bin")),
                    ],
                ),
                column_row(
                    "status",
                    "enum",
                    "enum('new','it''s done')",
                    &[("COLUMN_DEFAULT", text("new"))],
                ),
                column_row(
                    "updated_at",
                    "timestamp",
                    "timestamp(3)",
                    &[
                        ("COLUMN_DEFAULT", text("CURRENT_TIMESTAMP(3)")),
                        ("EXTRA", text("on update CURRENT_TIMESTAMP(3)")),
                        ("DATETIME_PRECISION", Scalar::from(3_i64)),
                    ],
                ),
                column_row(
                    "total",
                    "decimal",
                    "decimal(10,2)",
                    &[
                        ("NUMERIC_PRECISION", Scalar::from(10_i64)),
                        ("NUMERIC_SCALE", Scalar::from(2_i64)),
                        ("COLUMN_COMMENT", text("gross")),
                    ],
                ),
                column_row("customer_id", "int", "int(11)", &[("IS_NULLABLE", text("YES"))]),
            ],
            primary_keys: vec![row(&[
                ("TABLE_SCHEMA", text("shop")),
                ("TABLE_NAME", text("orders")),
                ("COLUMN_NAME", text("id")),
            ])],
            schemata: vec![row(&[
                ("SCHEMA_NAME", text("shop")),
                ("CHARSET", text("utf8mb4")),
                ("COLLATION", text("utf8mb4_0900_ai_ci")),
            ])],
            indices: vec![
                index_row("orders_code", "code", 0),
                index_row("orders_status_total", "status", 1),
                index_row("orders_status_total", "total", 1),
            ],
            foreign_keys: vec![row(&[
                ("TABLE_SCHEMA", text("shop")),
                ("TABLE_NAME", text("orders")),
                ("CONSTRAINT_NAME", text("orders_customer_id_fkey")),
                ("COLUMN_NAME", text("customer_id")),
                ("REFERENCED_TABLE_SCHEMA", text("billing")),
                ("REFERENCED_TABLE_NAME", text("customers")),
                ("REFERENCED_COLUMN_NAME", text("id")),
                ("ON_DELETE", text("SET NULL")),
                ("ON_UPDATE", text("RESTRICT")),
            ])],
        }
    }

    #[test]
    fn test_assemble_columns() {
        let tables = MySqlDialect::default().assemble_tables(&catalog(), "shop");
        let table = &tables[0];
        assert_eq!(table.name, "orders");
        assert_eq!(table.engine.as_deref(), Some("InnoDB"));

        let id = table.find_column("id").unwrap();
        assert!(id.is_primary && id.unsigned && id.is_increment());
        assert_eq!(id.width, Some(10));

        let code = table.find_column("code").unwrap();
        assert_eq!(code.length, Some(32));
        assert!(code.is_unique);
        assert!(code.charset.is_none());
        assert_eq!(code.collation.as_deref(), Some("utf8mb4_bin"));

        let status = table.find_column("status").unwrap();
        assert_eq!(status.enum_values, vec!["new", "it's done"]);
        assert_eq!(status.default.as_deref(), Some("'new'"));
        assert!(!status.is_unique);

        let updated = table.find_column("updated_at").unwrap();
        assert_eq!(updated.default.as_deref(), Some("CURRENT_TIMESTAMP(3)"));
        assert_eq!(updated.on_update.as_deref(), Some("CURRENT_TIMESTAMP(3)"));
        assert_eq!(updated.precision, Some(3));

        let total = table.find_column("total").unwrap();
        assert_eq!((total.precision, total.scale), (Some(10), Some(2)));
        assert_eq!(total.comment.as_deref(), Some("gross"));

        let customer = table.find_column("customer_id").unwrap();
        assert!(customer.width.is_none());
        assert!(customer.is_nullable);
    }

    #[test]
    fn test_assemble_indices_and_foreign_keys() {
        let tables = MySqlDialect::default().assemble_tables(&catalog(), "shop");
        let table = &tables[0];

        assert_eq!(table.indices.len(), 2);
        assert!(table.indices[0].is_unique);
        assert_eq!(table.indices[1].columns, vec!["status", "total"]);
        assert!(!table.indices[1].is_unique);

        let fk = &table.foreign_keys[0];
        assert_eq!(fk.referenced_table, "billing.customers");
        assert_eq!(fk.on_delete, Some(ReferentialAction::SetNull));
        assert_eq!(fk.on_update, Some(ReferentialAction::Restrict));
    }

    #[test]
    fn test_parse_enum_values() {
        assert_eq!(parse_enum_values("enum('a','b,c')"), vec!["a", "b,c"]);
        assert_eq!(parse_enum_values("set('x')"), vec!["x"]);
        assert!(parse_enum_values("int").is_empty());
    }

    #[tokio::test]
    async fn test_has_column_uses_current_database() {
        let executor = MemoryExecutor::new();
        let context = DatabaseContext::new(Some("shop".into()), None);
        let found = MySqlDialect::default()
            .has_column(&executor, &context, "orders", "id")
            .await
            .unwrap();
        assert!(!found);
        assert_eq!(
            executor.statements()[0].params,
            vec![Scalar::from("shop"), Scalar::from("orders"), Scalar::from("id")]
        );
    }

    #[tokio::test]
    async fn test_load_views_without_registry() {
        let executor = MemoryExecutor::new();
        let views = MySqlDialect::default()
            .load_views(&executor, &DatabaseContext::default(), &[], "oxide_metadata")
            .await
            .unwrap();
        assert!(views.is_empty());
        assert_eq!(executor.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_load_tables_is_idempotent() {
        let mut rows = catalog();
        rows.columns.push(column_row(
            "note",
            "text",
            "text",
            &[
                ("CHARACTER_SET_NAME", text("utf8mb4")),
                ("COLLATION_NAME", text("utf8mb4_0900_ai_ci")),
            ],
        ));
        let executor = MemoryExecutor::new().with_context(DatabaseContext::new(Some("shop".into()), None));
        executor.respond("FROM `INFORMATION_SCHEMA`.`TABLES` WHERE", rows.tables);
        executor.respond("FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE", rows.columns);
        executor.respond("`CONSTRAINT_NAME` = 'PRIMARY'", rows.primary_keys);
        executor.respond("FROM `INFORMATION_SCHEMA`.`SCHEMATA`", rows.schemata);
        executor.respond("FROM `INFORMATION_SCHEMA`.`STATISTICS`", rows.indices);
        executor.respond("`KEY_COLUMN_USAGE` `kcu`", rows.foreign_keys);
        let engine = crate::SchemaEngine::new(
            MySqlDialect::default(),
            executor,
            crate::config::EngineConfig::default(),
        );
        let names = ["orders".to_string()];

        let first = engine.load_tables(&names).await.unwrap();
        let second = engine.load_tables(&names).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        let note = second[0].find_column("note").unwrap();
        assert!(note.charset.is_none());
        assert!(note.collation.is_none());
        let code = second[0].find_column("code").unwrap();
        assert_eq!(code.collation.as_deref(), Some("utf8mb4_bin"));
        assert_eq!(engine.cache().table("shop.orders"), Some(second[0].clone()));
    }
}
