//! Postgres catalog queries.
//!
//! Every query casts `name` and domain-typed catalog columns to `text` or
//! `int` so the driver can decode them without knowing Postgres internals.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{
    catalog_u32, group_by, loaded_name, resolve_targets, rows_for, target_condition,
    view_from_row, CatalogReader, Target,
};
use crate::dialect::{DialectRules, EnumTypeSupport, PostgresDialect};
use crate::error::Result;
use crate::executor::{DatabaseContext, QueryExecutor};
use crate::schema::{
    split_qualified, Check, Column, Exclusion, ForeignKey, GeneratedStorage, GenerationStrategy,
    Index, ReferentialAction, Table, Unique, View,
};
use crate::statement::{Row, Scalar};

static CAST_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("::.*").expect("cast suffix pattern is valid"));

static UUID_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(gen_random_uuid|uuid_generate_v\d)\(\)").expect("uuid default pattern is valid")
});

const LENGTH_TYPES: &[&str] = &[
    "character varying",
    "varchar",
    "character",
    "char",
    "bit",
    "bit varying",
    "varbit",
];

const TIME_TYPES: &[&str] = &[
    "interval",
    "time without time zone",
    "time with time zone",
    "timestamp without time zone",
    "timestamp with time zone",
];

const SPATIAL_TYPES: &[&str] = &["geometry", "geography"];

/// Precision Postgres reports for time types declared without one.
const DEFAULT_TIME_PRECISION: u32 = 6;

/// Raw rows of one `load_tables` call.
#[derive(Debug, Default)]
struct CatalogRows {
    tables: Vec<Row>,
    columns: Vec<Row>,
    constraints: Vec<Row>,
    indices: Vec<Row>,
    foreign_keys: Vec<Row>,
    enum_values: Vec<Row>,
    spatial: Vec<Row>,
}

impl PostgresDialect {
    fn current_schema(context: &DatabaseContext) -> &str {
        context.schema.as_deref().unwrap_or("public")
    }

    /// Schema unqualified names resolve into.
    fn lookup_schema<'a>(&'a self, context: &'a DatabaseContext) -> &'a str {
        self.default_namespace()
            .unwrap_or_else(|| Self::current_schema(context))
    }

    fn split_name<'a>(&'a self, context: &'a DatabaseContext, name: &'a str) -> (&'a str, &'a str) {
        let (schema, bare) = split_qualified(name);
        (schema.unwrap_or_else(|| self.lookup_schema(context)), bare)
    }

    async fn exists(&self, executor: &dyn QueryExecutor, sql: &str, params: Vec<String>) -> Result<bool> {
        let params: Vec<Scalar> = params.into_iter().map(Scalar::from).collect();
        Ok(!executor.execute(sql, &params).await?.is_empty())
    }

    async fn load_enum_values(&self, executor: &dyn QueryExecutor, columns: &[Row]) -> Result<Vec<Row>> {
        let mut types: Vec<Target> = Vec::new();
        for target in columns.iter().filter_map(udt_target) {
            if !types.contains(&target) {
                types.push(target);
            }
        }
        if types.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT \"n\".\"nspname\"::text AS \"schema\", \"t\".\"typname\"::text AS \"name\", \"e\".\"enumlabel\"::text AS \"value\" \
             FROM \"pg_enum\" \"e\" \
             INNER JOIN \"pg_type\" \"t\" ON \"t\".\"oid\" = \"e\".\"enumtypid\" \
             INNER JOIN \"pg_namespace\" \"n\" ON \"n\".\"oid\" = \"t\".\"typnamespace\" \
             WHERE {} ORDER BY \"e\".\"enumsortorder\"",
            target_condition(self, &types, "\"n\".\"nspname\"", "\"t\".\"typname\"")
        );
        executor.execute(&sql, &[]).await
    }

    async fn load_spatial(
        &self,
        executor: &dyn QueryExecutor,
        targets: &[Target],
        columns: &[Row],
    ) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for (registry, column) in [
            ("geometry_columns", "f_geometry_column"),
            ("geography_columns", "f_geography_column"),
        ] {
            let kind = registry.trim_end_matches("_columns");
            if !columns.iter().any(|c| c.text("regtype") == Some(kind)) {
                continue;
            }
            let sql = format!(
                "SELECT \"f_table_schema\"::text AS \"table_schema\", \"f_table_name\"::text AS \"table_name\", \
                 \"{}\"::text AS \"column_name\", \"srid\"::int AS \"srid\", \"type\"::text AS \"type\" \
                 FROM \"{}\" WHERE {}",
                column,
                registry,
                target_condition(self, targets, "\"f_table_schema\"", "\"f_table_name\"")
            );
            rows.extend(executor.execute(&sql, &[]).await?);
        }
        Ok(rows)
    }

    fn assemble_tables(&self, rows: &CatalogRows, current: &str) -> Vec<Table> {
        let configured = self.default_namespace();
        rows.tables
            .iter()
            .map(|db_table| {
                let schema = db_table.text_or_empty("table_schema");
                let name = db_table.text_or_empty("table_name");
                let mut table = Table::new(loaded_name(schema, name, current, configured));

                let constraints = rows_for(&rows.constraints, "table_schema", "table_name", schema, name);
                table.columns = rows_for(&rows.columns, "table_schema", "table_name", schema, name)
                    .into_iter()
                    .map(|row| self.assemble_column(&table, row, &constraints, rows))
                    .collect();

                for (constraint_name, members) in group_by(&constraints, "constraint_name") {
                    let columns = column_names(&members, "column_name");
                    let expression = members[0].text_or_empty("expression");
                    match members[0].text("constraint_type") {
                        Some("UNIQUE") => table.uniques.push(Unique::new(columns).named(constraint_name)),
                        Some("CHECK") => table.checks.push(
                            Check::new(check_expression(expression))
                                .named(constraint_name)
                                .on_columns(columns),
                        ),
                        Some("EXCLUDE") => table.exclusions.push(
                            Exclusion::new(expression.strip_prefix("EXCLUDE ").unwrap_or(expression))
                                .named(constraint_name),
                        ),
                        _ => {}
                    }
                }

                let foreign_keys = rows_for(&rows.foreign_keys, "table_schema", "table_name", schema, name);
                for (constraint_name, members) in group_by(&foreign_keys, "constraint_name") {
                    let first = members[0];
                    let referenced = loaded_name(
                        first.text_or_empty("referenced_table_schema"),
                        first.text_or_empty("referenced_table_name"),
                        current,
                        configured,
                    );
                    let mut fk = ForeignKey::new(
                        column_names(&members, "column_name"),
                        referenced,
                        column_names(&members, "referenced_column_name"),
                    )
                    .named(constraint_name);
                    fk.on_delete = first.text("on_delete").and_then(ReferentialAction::from_catalog);
                    fk.on_update = first.text("on_update").and_then(ReferentialAction::from_catalog);
                    if first.flag("deferrable") {
                        fk.deferrable = first.text("deferred").map(str::to_string);
                    }
                    table.foreign_keys.push(fk);
                }

                let indices = rows_for(&rows.indices, "table_schema", "table_name", schema, name);
                for (index_name, members) in group_by(&indices, "constraint_name") {
                    let mut index = Index::new(column_names(&members, "column_name")).named(index_name);
                    index.is_unique = members[0].flag("is_unique");
                    index.predicate = members[0].text("condition").map(str::to_string);
                    index.is_spatial = members
                        .iter()
                        .all(|m| SPATIAL_TYPES.contains(&m.text_or_empty("type_name")));
                    table.indices.push(index);
                }

                table
            })
            .collect()
    }

    fn assemble_column(&self, table: &Table, row: &Row, constraints: &[&Row], rows: &CatalogRows) -> Column {
        let name = row.text_or_empty("column_name");
        let mut column = Column::new(name, row.text_or_empty("regtype").to_lowercase());

        if row.text("data_type") == Some("ARRAY") {
            column.is_array = true;
            column.data_type = column.data_type.trim_end_matches("[]").to_string();
        }

        if let Some(udt) = udt_target(row) {
            let values: Vec<String> = rows
                .enum_values
                .iter()
                .filter(|v| v.text("schema") == Some(udt.namespace.as_str()) && v.text("name") == Some(udt.name.as_str()))
                .map(|v| v.text_or_empty("value").to_string())
                .collect();
            if !values.is_empty() {
                column.data_type = "enum".to_string();
                column.enum_values = values;
                if udt.name != self.enum_type_name(table, &column, false) {
                    column.enum_name = Some(udt.name);
                }
            }
        }

        let data_type = column.data_type.as_str();
        if matches!(data_type, "numeric" | "decimal") {
            column.precision = catalog_u32(row, "numeric_precision");
            column.scale = catalog_u32(row, "numeric_scale");
        }
        if TIME_TYPES.contains(&data_type) {
            column.precision =
                catalog_u32(row, "datetime_precision").filter(|p| *p != DEFAULT_TIME_PRECISION);
        }
        if LENGTH_TYPES.contains(&data_type) {
            column.length = catalog_u32(row, "character_maximum_length");
        }
        if SPATIAL_TYPES.contains(&data_type) {
            if let Some(spatial) = rows.spatial.iter().find(|s| {
                s.text("table_schema") == row.text("table_schema")
                    && s.text("table_name") == row.text("table_name")
                    && s.text("column_name") == Some(name)
            }) {
                column.spatial_feature_type = spatial.text("type").map(str::to_string);
                column.srid = catalog_u32(spatial, "srid");
            }
        }

        column.is_nullable = row.flag("is_nullable");
        let own: Vec<&Row> = constraints
            .iter()
            .copied()
            .filter(|c| c.text("column_name") == Some(name))
            .collect();
        column.is_primary = own.iter().any(|c| c.text("constraint_type") == Some("PRIMARY"));
        column.is_unique = own
            .iter()
            .find(|c| c.text("constraint_type") == Some("UNIQUE"))
            .is_some_and(|unique| {
                !constraints.iter().any(|c| {
                    c.text("constraint_name") == unique.text("constraint_name")
                        && c.text("column_name") != Some(name)
                })
            });

        if row.text("is_generated") == Some("ALWAYS") {
            column.as_expression = row.text("generation_expression").map(str::to_string);
            column.generated_type = Some(GeneratedStorage::Stored);
        } else if let Some(default) = row.text("column_default") {
            let sequence = format!("{}_{}_seq", table.bare_name(), name);
            if default.starts_with("nextval(") && default.replace('"', "").contains(&sequence) {
                column.is_generated = true;
                column.generation_strategy = Some(GenerationStrategy::Increment);
            } else if UUID_DEFAULT.is_match(default) {
                column.is_generated = true;
                column.generation_strategy = Some(GenerationStrategy::Uuid);
            } else if default.starts_with("nextval(") {
                column.default = Some(default.to_string());
            } else {
                column.default = Some(CAST_SUFFIX.replace(default, "").into_owned());
            }
        }

        column.comment = row.text("comment").map(str::to_string);
        column.charset = row.text("character_set_name").map(str::to_string);
        column.collation = row.text("collation_name").map(str::to_string);
        column
    }
}

/// Named type a column uses, for user-defined types and arrays of them.
fn udt_target(row: &Row) -> Option<Target> {
    let schema = row.text("udt_schema")?;
    let name = row.text("udt_name")?;
    match row.text("data_type") {
        Some("USER-DEFINED") => Some(Target {
            namespace: schema.to_string(),
            name: name.to_string(),
        }),
        Some("ARRAY") if schema != "pg_catalog" => Some(Target {
            namespace: schema.to_string(),
            name: name.strip_prefix('_').unwrap_or(name).to_string(),
        }),
        _ => None,
    }
}

fn column_names(rows: &[&Row], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.text(column))
        .map(str::to_string)
        .collect()
}

/// `CHECK ((expr))` as reported by `pg_get_constraintdef`, reduced to `expr`.
fn check_expression(definition: &str) -> String {
    let body = definition.strip_prefix("CHECK ").unwrap_or(definition).trim();
    body.strip_prefix('(')
        .and_then(|b| b.strip_suffix(')'))
        .unwrap_or(body)
        .to_string()
}

#[async_trait]
impl CatalogReader for PostgresDialect {
    async fn load_tables(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        names: &[String],
    ) -> Result<Vec<Table>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let current = Self::current_schema(context);
        let targets = resolve_targets(names, self.lookup_schema(context));
        let tables_condition = target_condition(self, &targets, "\"table_schema\"", "\"table_name\"");
        let relation_condition = target_condition(self, &targets, "\"ns\".\"nspname\"", "\"t\".\"relname\"");
        let fk_condition = target_condition(self, &targets, "\"ns\".\"nspname\"", "\"cl\".\"relname\"");

        let tables_sql = format!(
            "SELECT \"table_schema\"::text AS \"table_schema\", \"table_name\"::text AS \"table_name\" \
             FROM \"information_schema\".\"tables\" WHERE {tables_condition}"
        );
        let columns_sql = format!(
            "SELECT \"table_schema\"::text AS \"table_schema\", \"table_name\"::text AS \"table_name\", \
             \"column_name\"::text AS \"column_name\", \"data_type\"::text AS \"data_type\", \
             \"udt_schema\"::text AS \"udt_schema\", \"udt_name\"::text AS \"udt_name\", \
             \"is_nullable\"::text AS \"is_nullable\", \"column_default\"::text AS \"column_default\", \
             \"character_maximum_length\"::int AS \"character_maximum_length\", \
             \"numeric_precision\"::int AS \"numeric_precision\", \"numeric_scale\"::int AS \"numeric_scale\", \
             \"datetime_precision\"::int AS \"datetime_precision\", \
             \"character_set_name\"::text AS \"character_set_name\", \"collation_name\"::text AS \"collation_name\", \
             \"is_generated\"::text AS \"is_generated\", \"generation_expression\"::text AS \"generation_expression\", \
             ('\"' || \"udt_schema\" || '\".\"' || \"udt_name\" || '\"')::regtype::text AS \"regtype\", \
             col_description(('\"' || \"table_schema\" || '\".\"' || \"table_name\" || '\"')::regclass, \"ordinal_position\"::int)::text AS \"comment\" \
             FROM \"information_schema\".\"columns\" WHERE {tables_condition} ORDER BY \"ordinal_position\""
        );
        let constraints_sql = format!(
            "SELECT \"ns\".\"nspname\"::text AS \"table_schema\", \"t\".\"relname\"::text AS \"table_name\", \
             \"cnst\".\"conname\"::text AS \"constraint_name\", pg_get_constraintdef(\"cnst\".\"oid\", true)::text AS \"expression\", \
             CASE \"cnst\".\"contype\" WHEN 'p' THEN 'PRIMARY' WHEN 'u' THEN 'UNIQUE' WHEN 'c' THEN 'CHECK' WHEN 'x' THEN 'EXCLUDE' END AS \"constraint_type\", \
             \"a\".\"attname\"::text AS \"column_name\" \
             FROM \"pg_constraint\" \"cnst\" \
             INNER JOIN \"pg_class\" \"t\" ON \"t\".\"oid\" = \"cnst\".\"conrelid\" \
             INNER JOIN \"pg_namespace\" \"ns\" ON \"ns\".\"oid\" = \"cnst\".\"connamespace\" \
             LEFT JOIN \"pg_attribute\" \"a\" ON \"a\".\"attrelid\" = \"cnst\".\"conrelid\" AND \"a\".\"attnum\" = ANY (\"cnst\".\"conkey\") \
             WHERE \"t\".\"relkind\" IN ('r', 'p') AND \"cnst\".\"contype\" IN ('p', 'u', 'c', 'x') AND ({relation_condition})"
        );
        let indices_sql = format!(
            "SELECT \"ns\".\"nspname\"::text AS \"table_schema\", \"t\".\"relname\"::text AS \"table_name\", \
             \"i\".\"relname\"::text AS \"constraint_name\", \"a\".\"attname\"::text AS \"column_name\", \
             \"ix\".\"indisunique\" AS \"is_unique\", pg_get_expr(\"ix\".\"indpred\", \"ix\".\"indrelid\")::text AS \"condition\", \
             \"types\".\"typname\"::text AS \"type_name\" \
             FROM \"pg_class\" \"t\" \
             INNER JOIN \"pg_index\" \"ix\" ON \"ix\".\"indrelid\" = \"t\".\"oid\" \
             INNER JOIN \"pg_attribute\" \"a\" ON \"a\".\"attrelid\" = \"t\".\"oid\" AND \"a\".\"attnum\" = ANY (\"ix\".\"indkey\") \
             INNER JOIN \"pg_namespace\" \"ns\" ON \"ns\".\"oid\" = \"t\".\"relnamespace\" \
             INNER JOIN \"pg_class\" \"i\" ON \"i\".\"oid\" = \"ix\".\"indexrelid\" \
             INNER JOIN \"pg_type\" \"types\" ON \"types\".\"oid\" = \"a\".\"atttypid\" \
             LEFT JOIN \"pg_constraint\" \"cnst\" ON \"cnst\".\"conname\" = \"i\".\"relname\" \
             WHERE \"t\".\"relkind\" IN ('r', 'p') AND \"cnst\".\"contype\" IS NULL AND ({relation_condition}) \
             ORDER BY \"i\".\"relname\", array_position(\"ix\".\"indkey\"::int2[], \"a\".\"attnum\")"
        );
        let foreign_keys_sql = format!(
            "SELECT \"con\".\"conname\"::text AS \"constraint_name\", \"con\".\"nspname\"::text AS \"table_schema\", \
             \"con\".\"relname\"::text AS \"table_name\", \"att2\".\"attname\"::text AS \"column_name\", \
             \"ns\".\"nspname\"::text AS \"referenced_table_schema\", \"cl\".\"relname\"::text AS \"referenced_table_name\", \
             \"att\".\"attname\"::text AS \"referenced_column_name\", \"con\".\"confdeltype\" AS \"on_delete\", \
             \"con\".\"confupdtype\" AS \"on_update\", \"con\".\"condeferrable\" AS \"deferrable\", \"con\".\"condeferred\" AS \"deferred\" \
             FROM ( \
             SELECT UNNEST (\"con1\".\"conkey\") AS \"parent\", UNNEST (\"con1\".\"confkey\") AS \"child\", \"con1\".\"confrelid\", \
             \"con1\".\"conrelid\", \"con1\".\"conname\", \"ns\".\"nspname\", \"cl\".\"relname\", \"con1\".\"condeferrable\", \
             CASE WHEN \"con1\".\"condeferred\" THEN 'INITIALLY DEFERRED' ELSE 'INITIALLY IMMEDIATE' END AS \"condeferred\", \
             CASE \"con1\".\"confdeltype\" WHEN 'a' THEN 'NO ACTION' WHEN 'r' THEN 'RESTRICT' WHEN 'c' THEN 'CASCADE' WHEN 'n' THEN 'SET NULL' WHEN 'd' THEN 'SET DEFAULT' END AS \"confdeltype\", \
             CASE \"con1\".\"confupdtype\" WHEN 'a' THEN 'NO ACTION' WHEN 'r' THEN 'RESTRICT' WHEN 'c' THEN 'CASCADE' WHEN 'n' THEN 'SET NULL' WHEN 'd' THEN 'SET DEFAULT' END AS \"confupdtype\" \
             FROM \"pg_class\" \"cl\" \
             INNER JOIN \"pg_namespace\" \"ns\" ON \"cl\".\"relnamespace\" = \"ns\".\"oid\" \
             INNER JOIN \"pg_constraint\" \"con1\" ON \"con1\".\"conrelid\" = \"cl\".\"oid\" \
             WHERE \"con1\".\"contype\" = 'f' AND ({fk_condition}) \
             ) \"con\" \
             INNER JOIN \"pg_attribute\" \"att\" ON \"att\".\"attrelid\" = \"con\".\"confrelid\" AND \"att\".\"attnum\" = \"con\".\"child\" \
             INNER JOIN \"pg_class\" \"cl\" ON \"cl\".\"oid\" = \"con\".\"confrelid\" \
             INNER JOIN \"pg_namespace\" \"ns\" ON \"cl\".\"relnamespace\" = \"ns\".\"oid\" \
             INNER JOIN \"pg_attribute\" \"att2\" ON \"att2\".\"attrelid\" = \"con\".\"conrelid\" AND \"att2\".\"attnum\" = \"con\".\"parent\""
        );

        let (tables, columns, constraints, indices, foreign_keys) = futures::try_join!(
            executor.execute(&tables_sql, &[]),
            executor.execute(&columns_sql, &[]),
            executor.execute(&constraints_sql, &[]),
            executor.execute(&indices_sql, &[]),
            executor.execute(&foreign_keys_sql, &[]),
        )?;
        if tables.is_empty() {
            return Ok(Vec::new());
        }
        let enum_values = self.load_enum_values(executor, &columns).await?;
        let spatial = self.load_spatial(executor, &targets, &columns).await?;
        debug!(tables = tables.len(), columns = columns.len(), "Loaded catalog rows");

        let rows = CatalogRows {
            tables,
            columns,
            constraints,
            indices,
            foreign_keys,
            enum_values,
            spatial,
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
            "SELECT \"t\".\"type\" AS \"type\", \"t\".\"schema\" AS \"schema\", \"t\".\"name\" AS \"name\", \"t\".\"value\" AS \"value\" \
             FROM {} \"t\" \
             INNER JOIN \"pg_class\" \"c\" ON \"c\".\"relname\" = \"t\".\"name\" \
             INNER JOIN \"pg_namespace\" \"n\" ON \"n\".\"oid\" = \"c\".\"relnamespace\" AND \"n\".\"nspname\" = \"t\".\"schema\" \
             WHERE \"t\".\"type\" IN ('VIEW', 'MATERIALIZED_VIEW') AND \"c\".\"relkind\" IN ('v', 'm')",
            self.escape_path(metadata_table)
        );
        if !names.is_empty() {
            let targets = resolve_targets(names, self.lookup_schema(context));
            sql.push_str(&format!(
                " AND ({})",
                target_condition(self, &targets, "\"t\".\"schema\"", "\"t\".\"name\"")
            ));
        }
        let rows = executor.execute(&sql, &[]).await?;
        let current = Self::current_schema(context);
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
        let (schema, table) = self.split_name(context, name);
        self.exists(
            executor,
            "SELECT 1 FROM \"information_schema\".\"tables\" WHERE \"table_schema\" = $1 AND \"table_name\" = $2",
            vec![schema.to_string(), table.to_string()],
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
        let (schema, table) = self.split_name(context, table);
        self.exists(
            executor,
            "SELECT 1 FROM \"information_schema\".\"columns\" WHERE \"table_schema\" = $1 AND \"table_name\" = $2 AND \"column_name\" = $3",
            vec![schema.to_string(), table.to_string(), column.to_string()],
        )
        .await
    }

    async fn has_namespace(&self, executor: &dyn QueryExecutor, name: &str) -> Result<bool> {
        self.exists(
            executor,
            "SELECT 1 FROM \"information_schema\".\"schemata\" WHERE \"schema_name\" = $1",
            vec![name.to_string()],
        )
        .await
    }

    async fn current_enum_type(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        table: &Table,
        column: &Column,
    ) -> Result<Option<String>> {
        let (schema, name) = self.split_name(context, &table.name);
        let rows = executor
            .execute(
                "SELECT \"udt_schema\"::text AS \"udt_schema\", \"udt_name\"::text AS \"udt_name\", \"data_type\"::text AS \"data_type\" \
                 FROM \"information_schema\".\"columns\" \
                 WHERE \"table_schema\" = $1 AND \"table_name\" = $2 AND \"column_name\" = $3",
                &[
                    Scalar::from(schema),
                    Scalar::from(name),
                    Scalar::from(column.name.as_str()),
                ],
            )
            .await?;
        Ok(rows
            .first()
            .and_then(udt_target)
            .map(|t| format!("{}.{}", t.namespace, t.name)))
    }

    async fn enum_type_exists(
        &self,
        executor: &dyn QueryExecutor,
        context: &DatabaseContext,
        table: &Table,
        column: &Column,
    ) -> Result<bool> {
        let (schema, _) = self.split_name(context, &table.name);
        self.exists(
            executor,
            "SELECT 1 FROM \"pg_type\" \"t\" INNER JOIN \"pg_namespace\" \"n\" ON \"n\".\"oid\" = \"t\".\"typnamespace\" \
             WHERE \"n\".\"nspname\" = $1 AND \"t\".\"typname\" = $2",
            vec![schema.to_string(), self.enum_type_name(table, column, false)],
        )
        .await
    }

    async fn drop_all_objects(&self, executor: &dyn QueryExecutor, namespace: &str) -> Result<()> {
        let schema = self.escape_literal(namespace);
        let selects = [
            format!(
                "SELECT 'DROP VIEW IF EXISTS \"' || \"schemaname\" || '\".\"' || \"viewname\" || '\" CASCADE' AS \"query\" \
                 FROM \"pg_views\" WHERE \"schemaname\" = {schema} \
                 AND \"viewname\" NOT IN ('geography_columns', 'geometry_columns', 'raster_columns', 'raster_overviews')"
            ),
            format!(
                "SELECT 'DROP MATERIALIZED VIEW IF EXISTS \"' || \"schemaname\" || '\".\"' || \"matviewname\" || '\" CASCADE' AS \"query\" \
                 FROM \"pg_matviews\" WHERE \"schemaname\" = {schema}"
            ),
            format!(
                "SELECT 'DROP TABLE IF EXISTS \"' || \"schemaname\" || '\".\"' || \"tablename\" || '\" CASCADE' AS \"query\" \
                 FROM \"pg_tables\" WHERE \"schemaname\" = {schema} AND \"tablename\" NOT IN ('spatial_ref_sys')"
            ),
            format!(
                "SELECT 'DROP TYPE IF EXISTS \"' || \"n\".\"nspname\" || '\".\"' || \"t\".\"typname\" || '\" CASCADE' AS \"query\" \
                 FROM \"pg_type\" \"t\" \
                 INNER JOIN \"pg_enum\" \"e\" ON \"e\".\"enumtypid\" = \"t\".\"oid\" \
                 INNER JOIN \"pg_namespace\" \"n\" ON \"n\".\"oid\" = \"t\".\"typnamespace\" \
                 WHERE \"n\".\"nspname\" = {schema} GROUP BY \"n\".\"nspname\", \"t\".\"typname\""
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

    fn column_row(name: &str, data_type: &str, regtype: &str, extra: &[(&str, Scalar)]) -> Row {
        let mut r = row(&[
            ("table_schema", text("public")),
            ("table_name", text("users")),
            ("column_name", text(name)),
            ("data_type", text(data_type)),
            ("udt_schema", text("pg_catalog")),
            ("udt_name", text(regtype)),
            ("regtype", text(regtype)),
            ("is_nullable", text("NO")),
            ("is_generated", text("NEVER")),
        ]);
        for (k, v) in extra {
            r.insert(*k, v.clone());
        }
        r
    }

    fn constraint(name: &str, kind: &str, column: &str, expression: &str) -> Row {
        row(&[
            ("table_schema", text("public")),
            ("table_name", text("users")),
            ("constraint_name", text(name)),
            ("constraint_type", text(kind)),
            ("column_name", text(column)),
            ("expression", text(expression)),
        ])
    }

    fn catalog() -> CatalogRows {
        CatalogRows {
            tables: vec![row(&[("table_schema", text("public")), ("table_name", text("users"))])],
            columns: vec![
                column_row(
                    "id",
                    "integer",
                    "integer",
                    &[("column_default", text("nextval('users_id_seq'::regclass)"))],
                ),
                column_row(
                    "email",
                    "character varying",
                    "character varying",
                    &[
                        ("character_maximum_length", Scalar::from(255_i64)),
                        ("comment", text("login")),
                    ],
                ),
                column_row(
                    "role",
                    "USER-DEFINED",
                    "users_role_enum",
                    &[
                        ("udt_schema", text("public")),
                        ("column_default", text("'member'::users_role_enum")),
                    ],
                ),
                column_row(
                    "tags",
                    "ARRAY",
                    "text[]",
                    &[("udt_name", text("_text")), ("is_nullable", text("YES"))],
                ),
                column_row(
                    "balance",
                    "numeric",
                    "numeric",
                    &[
                        ("numeric_precision", Scalar::from(10_i64)),
                        ("numeric_scale", Scalar::from(2_i64)),
                    ],
                ),
                column_row(
                    "created_at",
                    "timestamp without time zone",
                    "timestamp without time zone",
                    &[("datetime_precision", Scalar::from(6_i64))],
                ),
                column_row("org_id", "uuid", "uuid", &[]),
            ],
            constraints: vec![
                constraint("users_pkey", "PRIMARY", "id", "PRIMARY KEY (id)"),
                constraint("users_email", "UNIQUE", "email", "UNIQUE (email)"),
                constraint("users_balance_check", "CHECK", "balance", "CHECK ((balance >= 0))"),
            ],
            indices: vec![row(&[
                ("table_schema", text("public")),
                ("table_name", text("users")),
                ("constraint_name", text("users_created_at_idx")),
                ("column_name", text("created_at")),
                ("is_unique", Scalar::Bool(false)),
                ("type_name", text("timestamp")),
            ])],
            foreign_keys: vec![row(&[
                ("table_schema", text("public")),
                ("table_name", text("users")),
                ("constraint_name", text("users_org_id_fkey")),
                ("column_name", text("org_id")),
                ("referenced_table_schema", text("public")),
                ("referenced_table_name", text("orgs")),
                ("referenced_column_name", text("id")),
                ("on_delete", text("CASCADE")),
                ("on_update", text("NO ACTION")),
                ("deferrable", Scalar::Bool(true)),
                ("deferred", text("INITIALLY DEFERRED")),
            ])],
            enum_values: vec![
                row(&[("schema", text("public")), ("name", text("users_role_enum")), ("value", text("admin"))]),
                row(&[("schema", text("public")), ("name", text("users_role_enum")), ("value", text("member"))]),
            ],
            spatial: Vec::new(),
        }
    }

    #[test]
    fn test_assemble_columns() {
        let tables = PostgresDialect::default().assemble_tables(&catalog(), "public");
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.name, "users");

        let id = table.find_column("id").unwrap();
        assert!(id.is_primary);
        assert_eq!(id.generation_strategy, Some(GenerationStrategy::Increment));
        assert!(id.default.is_none());

        let email = table.find_column("email").unwrap();
        assert_eq!(email.length, Some(255));
        assert!(email.is_unique);
        assert!(!email.is_nullable);
        assert_eq!(email.comment.as_deref(), Some("login"));

        let role = table.find_column("role").unwrap();
        assert_eq!(role.data_type, "enum");
        assert_eq!(role.enum_values, vec!["admin", "member"]);
        assert!(role.enum_name.is_none());
        assert_eq!(role.default.as_deref(), Some("'member'"));

        let tags = table.find_column("tags").unwrap();
        assert!(tags.is_array);
        assert_eq!(tags.data_type, "text");
        assert!(tags.is_nullable);

        let balance = table.find_column("balance").unwrap();
        assert_eq!((balance.precision, balance.scale), (Some(10), Some(2)));

        let created = table.find_column("created_at").unwrap();
        assert!(created.precision.is_none());
    }

    #[test]
    fn test_assemble_constraints() {
        let tables = PostgresDialect::default().assemble_tables(&catalog(), "public");
        let table = &tables[0];

        assert_eq!(table.uniques, vec![Unique::new(["email"]).named("users_email")]);
        assert_eq!(table.checks.len(), 1);
        assert_eq!(table.checks[0].expression, "(balance >= 0)");
        assert_eq!(table.checks[0].columns, vec!["balance"]);

        assert_eq!(table.indices.len(), 1);
        assert_eq!(table.indices[0].name, "users_created_at_idx");
        assert!(!table.indices[0].is_unique);
        assert!(!table.indices[0].is_spatial);

        let fk = &table.foreign_keys[0];
        assert_eq!(fk.referenced_table, "orgs");
        assert_eq!(fk.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(fk.deferrable.as_deref(), Some("INITIALLY DEFERRED"));
    }

    #[test]
    fn test_configured_schema_qualifies_names() {
        let dialect = PostgresDialect::new(Some("public".to_string()));
        let tables = dialect.assemble_tables(&catalog(), "public");
        assert_eq!(tables[0].name, "public.users");
        assert_eq!(tables[0].foreign_keys[0].referenced_table, "public.orgs");
    }

    #[test]
    fn test_check_expression() {
        assert_eq!(check_expression("CHECK ((age > 0))"), "(age > 0)");
        assert_eq!(check_expression("CHECK (age > 0)"), "age > 0");
    }

    #[tokio::test]
    async fn test_load_tables_skips_missing() {
        let executor = MemoryExecutor::new();
        let context = DatabaseContext::new(Some("app".into()), Some("public".into()));
        let tables = PostgresDialect::default()
            .load_tables(&executor, &context, &["users".to_string()])
            .await
            .unwrap();
        assert!(tables.is_empty());
        assert_eq!(executor.statements().len(), 5);
        assert!(executor.executed_sql()[0].contains("\"table_schema\" = 'public' AND \"table_name\" = 'users'"));
    }

    #[tokio::test]
    async fn test_has_table_binds_parameters() {
        let executor = MemoryExecutor::new();
        executor.respond("information_schema\".\"tables\"", vec![row(&[("?column?", Scalar::from(1_i64))])]);
        let context = DatabaseContext::new(None, Some("public".into()));
        assert!(PostgresDialect::default()
            .has_table(&executor, &context, "audit.log")
            .await
            .unwrap());
        assert_eq!(
            executor.statements()[0].params,
            vec![Scalar::from("audit"), Scalar::from("log")]
        );
    }

    #[tokio::test]
    async fn test_drop_all_objects_runs_generated_drops() {
        let executor = MemoryExecutor::new();
        executor.respond(
            "FROM \"pg_tables\"",
            vec![row(&[("query", text("DROP TABLE IF EXISTS \"public\".\"users\" CASCADE"))])],
        );
        PostgresDialect::default()
            .drop_all_objects(&executor, "public")
            .await
            .unwrap();
        let sql = executor.executed_sql();
        assert_eq!(sql.len(), 5);
        assert_eq!(sql[3], "DROP TABLE IF EXISTS \"public\".\"users\" CASCADE");
    }

    fn scripted_executor() -> MemoryExecutor {
        let rows = catalog();
        let executor = MemoryExecutor::new().with_context(DatabaseContext::new(
            Some("app".to_string()),
            Some("public".to_string()),
        ));
        executor.respond("FROM \"information_schema\".\"tables\" WHERE", rows.tables);
        executor.respond("FROM \"information_schema\".\"columns\" WHERE", rows.columns);
        executor.respond("FROM \"pg_constraint\" \"cnst\"", rows.constraints);
        executor.respond("\"ix\".\"indisunique\"", rows.indices);
        executor.respond("UNNEST (\"con1\".\"conkey\")", rows.foreign_keys);
        executor.respond("FROM \"pg_enum\" \"e\"", rows.enum_values);
        executor
    }

    #[tokio::test]
    async fn test_load_tables_is_idempotent() {
        let engine = crate::SchemaEngine::new(
            PostgresDialect::default(),
            scripted_executor(),
            crate::config::EngineConfig::default(),
        );
        let names = ["users".to_string()];

        let first = engine.load_tables(&names).await.unwrap();
        let second = engine.load_tables(&names).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].find_column("role").unwrap().enum_values, vec!["admin", "member"]);
        assert_eq!(engine.cache().table("public.users"), Some(second[0].clone()));
        // Both reads issue the same catalog queries.
        let sql = engine.executor().executed_sql();
        assert_eq!(sql.len() % 2, 0);
        let (a, b) = sql.split_at(sql.len() / 2);
        assert_eq!(a, b);
    }
}
