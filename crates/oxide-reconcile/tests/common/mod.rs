#![allow(dead_code)]

use oxide_reconcile::prelude::*;

pub fn postgres() -> SchemaEngine<PostgresDialect, MemoryExecutor> {
    SchemaEngine::new(
        PostgresDialect::default(),
        MemoryExecutor::new().with_context(DatabaseContext::new(
            Some("app".to_string()),
            Some("public".to_string()),
        )),
        EngineConfig::default(),
    )
}

pub fn mysql() -> SchemaEngine<MySqlDialect, MemoryExecutor> {
    SchemaEngine::new(
        MySqlDialect::default(),
        MemoryExecutor::new().with_context(DatabaseContext::new(Some("shop".to_string()), None)),
        EngineConfig::default(),
    )
}

/// `users(id serial pk, email unique, org_id)`.
pub fn users() -> Table {
    Table::new("users")
        .column(
            Column::new("id", "integer")
                .primary()
                .generated(GenerationStrategy::Increment),
        )
        .column(Column::new("email", "varchar").length(255).unique())
        .column(Column::new("org_id", "integer"))
}

/// `orders(id pk, user_id)` with an index, a foreign key and a unique
/// constraint on `user_id`, all unnamed.
pub fn orders() -> Table {
    Table::new("orders")
        .column(Column::new("id", "integer").primary())
        .column(Column::new("user_id", "integer"))
        .index(Index::new(["user_id"]))
        .foreign_key(ForeignKey::new(["user_id"], "users", ["id"]))
        .unique(Unique::new(["user_id"]))
}

/// SQL text of every statement, sorted.
pub fn sorted(statements: Vec<&Statement>) -> Vec<String> {
    let mut sql: Vec<String> = statements.into_iter().map(|s| s.sql.clone()).collect();
    sql.sort();
    sql
}

/// Statements the executor saw, catalog probes excluded.
pub fn writes(executor: &MemoryExecutor) -> Vec<String> {
    executor
        .executed_sql()
        .into_iter()
        .filter(|s| !s.starts_with("SELECT"))
        .collect()
}

/// Asserts that `backward` undoes `forward` statement for statement.
pub fn assert_inverse(forward: &Plan, backward: &Plan) {
    assert_eq!(sorted(forward.up_statements()), sorted(backward.down_statements()));
    assert_eq!(sorted(forward.down_statements()), sorted(backward.up_statements()));
}
