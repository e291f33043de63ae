//! Plan execution with compensation.
//!
//! Forward statements run in order. When one fails, the inverses of the
//! steps that already ran are executed newest first. A failing inverse is
//! logged and skipped so the original error always reaches the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::dialect::DialectRules;
use crate::error::{ReconcileError, Result};
use crate::executor::QueryExecutor;
use crate::statement::{Plan, Statement};

/// Runs plans and tracks session state shared by every operation.
#[derive(Debug, Default)]
pub struct Coordinator {
    transaction_active: AtomicBool,
    memory: Mutex<Option<Plan>>,
}

impl Coordinator {
    /// Creates a coordinator with no open transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn memory(&self) -> MutexGuard<'_, Option<Plan>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a caller-opened transaction is active.
    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.transaction_active.load(Ordering::SeqCst)
    }

    /// Opens a transaction on the connection.
    pub async fn start_transaction<D, E>(&self, dialect: &D, executor: &E) -> Result<()>
    where
        D: DialectRules + ?Sized,
        E: QueryExecutor + ?Sized,
    {
        executor.execute(dialect.begin_sql(), &[]).await?;
        self.transaction_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Commits the open transaction.
    pub async fn commit_transaction<D, E>(&self, dialect: &D, executor: &E) -> Result<()>
    where
        D: DialectRules + ?Sized,
        E: QueryExecutor + ?Sized,
    {
        executor.execute(dialect.commit_sql(), &[]).await?;
        self.transaction_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Rolls back the open transaction.
    pub async fn rollback_transaction<D, E>(&self, dialect: &D, executor: &E) -> Result<()>
    where
        D: DialectRules + ?Sized,
        E: QueryExecutor + ?Sized,
    {
        self.transaction_active.store(false, Ordering::SeqCst);
        executor.execute(dialect.rollback_sql(), &[]).await?;
        Ok(())
    }

    /// Starts recording plans instead of executing them.
    pub fn enable_sql_memory(&self) {
        let mut memory = self.memory();
        if memory.is_none() {
            *memory = Some(Plan::new());
        }
    }

    /// Stops recording and discards what was recorded.
    pub fn disable_sql_memory(&self) {
        *self.memory() = None;
    }

    /// Whether plans are being recorded.
    #[must_use]
    pub fn is_sql_memory_enabled(&self) -> bool {
        self.memory().is_some()
    }

    /// Returns everything recorded so far and starts a fresh recording.
    pub fn take_sql_memory(&self) -> Plan {
        self.memory()
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Executes `plan`.
    ///
    /// With `atomic` set, a dialect with transactional DDL and no open
    /// caller transaction runs the plan inside its own transaction and rolls
    /// back on failure. Otherwise the applied prefix is compensated.
    pub async fn apply<D, E>(
        &self,
        dialect: &D,
        executor: &E,
        plan: &Plan,
        atomic: bool,
    ) -> Result<()>
    where
        D: DialectRules + ?Sized,
        E: QueryExecutor + ?Sized,
    {
        if plan.is_empty() {
            return Ok(());
        }
        if let Some(recorded) = self.memory().as_mut() {
            recorded.extend(plan.clone());
            return Ok(());
        }

        if atomic && dialect.capabilities().transactional_ddl && !self.is_transaction_active() {
            executor.execute(dialect.begin_sql(), &[]).await?;
            if let Err(err) = run_all(executor, plan.up_statements()).await {
                if let Err(rollback) = executor.execute(dialect.rollback_sql(), &[]).await {
                    warn!(error = %rollback, "Rollback failed");
                }
                return Err(err);
            }
            executor.execute(dialect.commit_sql(), &[]).await?;
            return Ok(());
        }

        for (applied, step) in plan.steps().iter().enumerate() {
            if let Err(err) = run(executor, &step.up).await {
                if applied == 0 {
                    return Err(err);
                }
                let compensated = compensate(executor, plan, applied).await;
                return Err(ReconcileError::PartialApply {
                    applied,
                    total: plan.len(),
                    compensated,
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }
}

async fn run<E: QueryExecutor + ?Sized>(executor: &E, statement: &Statement) -> Result<()> {
    debug!(sql = %statement.sql, "Executing SQL");
    executor.execute(&statement.sql, &statement.params).await?;
    Ok(())
}

async fn run_all<E: QueryExecutor + ?Sized>(
    executor: &E,
    statements: Vec<&Statement>,
) -> Result<()> {
    for statement in statements {
        run(executor, statement).await?;
    }
    Ok(())
}

/// Runs the inverses of the first `applied` steps; returns whether all of
/// them succeeded.
async fn compensate<E: QueryExecutor + ?Sized>(executor: &E, plan: &Plan, applied: usize) -> bool {
    let mut compensated = true;
    for statement in plan.compensation_for(applied) {
        if let Err(err) = run(executor, statement).await {
            warn!(sql = %statement.sql, error = %err, "Compensating statement failed");
            compensated = false;
        }
    }
    compensated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::executor::MemoryExecutor;

    fn plan() -> Plan {
        let mut plan = Plan::new();
        plan.push("UP 1", "DOWN 1");
        plan.push("UP 2", "DOWN 2");
        plan.push("UP 3", "DOWN 3");
        plan
    }

    #[tokio::test]
    async fn test_apply_runs_every_step() {
        let executor = MemoryExecutor::new();
        Coordinator::new()
            .apply(&MySqlDialect::default(), &executor, &plan(), false)
            .await
            .unwrap();
        assert_eq!(executor.executed_sql(), vec!["UP 1", "UP 2", "UP 3"]);
    }

    #[tokio::test]
    async fn test_first_failure_returns_original_error() {
        let executor = MemoryExecutor::new();
        executor.fail_on("UP 1");
        let err = Coordinator::new()
            .apply(&MySqlDialect::default(), &executor, &plan(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::QueryExecution { .. }));
        assert_eq!(executor.executed_sql(), vec!["UP 1"]);
    }

    #[tokio::test]
    async fn test_partial_failure_compensates_in_reverse() {
        let executor = MemoryExecutor::new();
        executor.fail_on("UP 3");
        let err = Coordinator::new()
            .apply(&MySqlDialect::default(), &executor, &plan(), false)
            .await
            .unwrap_err();
        match &err {
            ReconcileError::PartialApply {
                applied,
                total,
                compensated,
                ..
            } => {
                assert_eq!((*applied, *total, *compensated), (2, 3, true));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.failed_sql(), Some("UP 3"));
        assert_eq!(
            executor.executed_sql(),
            vec!["UP 1", "UP 2", "UP 3", "DOWN 2", "DOWN 1"]
        );
    }

    #[tokio::test]
    async fn test_failed_compensation_keeps_original_error() {
        let executor = MemoryExecutor::new();
        executor.fail_on("UP 3");
        executor.fail_on("DOWN 2");
        let err = Coordinator::new()
            .apply(&MySqlDialect::default(), &executor, &plan(), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::PartialApply {
                compensated: false,
                ..
            }
        ));
        assert_eq!(err.failed_sql(), Some("UP 3"));
        assert_eq!(executor.executed_sql().last().map(String::as_str), Some("DOWN 1"));
    }

    #[tokio::test]
    async fn test_atomic_apply_rolls_back() {
        let executor = MemoryExecutor::new();
        executor.fail_on("UP 2");
        let err = Coordinator::new()
            .apply(&PostgresDialect::default(), &executor, &plan(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::QueryExecution { .. }));
        assert_eq!(
            executor.executed_sql(),
            vec!["START TRANSACTION", "UP 1", "UP 2", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn test_sql_memory_records_instead_of_executing() {
        let executor = MemoryExecutor::new();
        let coordinator = Coordinator::new();
        coordinator.enable_sql_memory();
        coordinator
            .apply(&PostgresDialect::default(), &executor, &plan(), false)
            .await
            .unwrap();
        assert!(executor.statements().is_empty());

        let recorded = coordinator.take_sql_memory();
        assert_eq!(recorded.len(), 3);
        assert!(coordinator.take_sql_memory().is_empty());
        coordinator.disable_sql_memory();
        assert!(!coordinator.is_sql_memory_enabled());
    }
}
