//! Operations a dialect cannot express fail before any round trip.

mod common;

use common::{mysql, users};
use oxide_reconcile::prelude::*;

fn is_unsupported<T: std::fmt::Debug>(result: Result<T>) -> bool {
    matches!(result, Err(ReconcileError::UnsupportedOperation { .. }))
}

#[tokio::test]
async fn test_mysql_rejects_constraint_objects_without_io() {
    let engine = mysql();

    assert!(is_unsupported(
        engine
            .create_unique_constraint("users".into(), &Unique::new(["email"]))
            .await
    ));
    assert!(is_unsupported(
        engine
            .create_unique_constraints("users".into(), &[Unique::new(["email"])])
            .await
    ));
    assert!(is_unsupported(
        engine.drop_unique_constraints("users".into(), &["users_email"]).await
    ));
    assert!(is_unsupported(
        engine
            .create_check_constraint("users".into(), &Check::new("`id` > 0"))
            .await
    ));
    assert!(is_unsupported(
        engine.drop_check_constraints("users".into(), &["c"]).await
    ));
    assert!(is_unsupported(
        engine
            .create_exclusion_constraints(
                "users".into(),
                &[Exclusion::new("USING gist (`id` WITH =)")]
            )
            .await
    ));
    assert!(is_unsupported(
        engine.drop_exclusion_constraint("users".into(), "e").await
    ));
    assert!(is_unsupported(
        engine
            .create_view(&View::new("totals", "SELECT 1").materialized())
            .await
    ));
    assert!(is_unsupported(
        engine
            .create_table(
                &users().exclusion(Exclusion::new("USING gist (`id` WITH =)")),
                CreateTableOptions::default(),
            )
            .await
    ));

    assert!(engine.executor().statements().is_empty());
}

#[test]
fn test_capability_matrix() {
    let postgres = PostgresDialect::default().capabilities();
    let mysql = MySqlDialect::default().capabilities();

    assert!(postgres.unique_constraints && postgres.check_constraints);
    assert!(postgres.exclusion_constraints && postgres.materialized_views);
    assert!(postgres.transactional_ddl);

    assert!(!mysql.unique_constraints && !mysql.check_constraints);
    assert!(!mysql.exclusion_constraints && !mysql.materialized_views);
    assert!(mysql.inline_indices);
}
