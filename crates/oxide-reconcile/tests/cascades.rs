//! Renames reach every object named after the renamed column or table.

mod common;

use common::{mysql, orders, postgres, writes};
use oxide_reconcile::prelude::*;

#[tokio::test]
async fn test_column_rename_cascades_on_postgres() {
    let engine = postgres();
    let table = engine
        .rename_column(TableRef::Table(&orders()), "user_id", "customer_id")
        .await
        .unwrap();

    assert_eq!(
        writes(engine.executor()),
        vec![
            "ALTER TABLE \"orders\" RENAME COLUMN \"user_id\" TO \"customer_id\"",
            "ALTER TABLE \"orders\" RENAME CONSTRAINT \"orders_user_id\" TO \"orders_customer_id\"",
            "ALTER INDEX \"orders_user_id_idx\" RENAME TO \"orders_customer_id_idx\"",
            "ALTER TABLE \"orders\" RENAME CONSTRAINT \"orders_user_id_fkey\" TO \"orders_customer_id_fkey\"",
        ]
    );
    assert_eq!(table.uniques[0].name, "orders_customer_id");
    assert_eq!(table.uniques[0].columns, vec!["customer_id"]);
    assert_eq!(table.indices[0].name, "orders_customer_id_idx");
    assert_eq!(table.foreign_keys[0].name, "orders_customer_id_fkey");
    assert_eq!(table.foreign_keys[0].columns, vec!["customer_id"]);
}

#[tokio::test]
async fn test_column_rename_cascades_on_mysql() {
    let engine = mysql();
    let table = engine
        .rename_column(TableRef::Table(&orders()), "user_id", "customer_id")
        .await
        .unwrap();

    let sql = writes(engine.executor());
    assert_eq!(sql.len(), 4);
    assert!(sql[0].starts_with("ALTER TABLE `orders` CHANGE `user_id` `customer_id` "));
    assert!(sql.contains(
        &"ALTER TABLE `orders` DROP INDEX `orders_user_id_idx`, ADD INDEX `orders_customer_id_idx` (`customer_id`)"
            .to_string()
    ));
    assert!(sql.contains(
        &"ALTER TABLE `orders` DROP INDEX `orders_user_id`, ADD UNIQUE INDEX `orders_customer_id` (`customer_id`)"
            .to_string()
    ));
    assert!(sql[3].starts_with(
        "ALTER TABLE `orders` DROP FOREIGN KEY `orders_user_id_fkey`, ADD CONSTRAINT `orders_customer_id_fkey`"
    ));
    assert!(table.uniques.is_empty());
    assert_eq!(table.indices.len(), 2);
}

#[tokio::test]
async fn test_explicit_names_survive_table_rename() {
    let engine = postgres();
    let table = Table::new("orders")
        .column(Column::new("id", "integer").primary())
        .column(Column::new("user_id", "integer"))
        .index(Index::new(["user_id"]).named("orders_by_user"))
        .foreign_key(ForeignKey::new(["user_id"], "users", ["id"]).named("fk_owner"));

    let renamed = engine
        .rename_table(TableRef::Table(&table), "purchases")
        .await
        .unwrap();
    assert_eq!(
        writes(engine.executor()),
        vec![
            "ALTER TABLE \"orders\" RENAME TO \"purchases\"",
            "ALTER TABLE \"purchases\" RENAME CONSTRAINT \"orders_pkey\" TO \"purchases_pkey\"",
        ]
    );
    assert_eq!(renamed.indices[0].name, "orders_by_user");
    assert_eq!(renamed.foreign_keys[0].name, "fk_owner");
    assert!(engine.cache().table("public.purchases").is_some());
}
