//! # Intent Executor
//!
//! Lowers an ordered intent list into statements and runs them as ordered,
//! fixed-size batches inside one store transaction.
//!
//! ## Guarantees
//!
//! - `None` entries are skipped; everything else runs in input order.
//! - Unbounded updates and removes are rejected before any statement runs.
//! - A batch never splits a dependency unit (see `Statement::continues`).
//! - Any batch failure fails the whole call. With an executor-owned
//!   transaction it is rolled back here; with a caller transaction the caller
//!   must roll back. Nothing is retried.

use crate::config::ExecutorConfig;
use crate::domain::{ExecutorError, Statement, StorageIntent};
use crate::ports::outbound::StatementStore;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a successful executor call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub statements: usize,
    pub batches: usize,
    pub rows_affected: u64,
}

pub struct IntentExecutor<S: StatementStore> {
    store: Arc<S>,
    config: ExecutorConfig,
}

impl<S: StatementStore> IntentExecutor<S> {
    pub fn new(store: Arc<S>, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `intents` as one logical unit.
    ///
    /// With `tx = None` the executor opens, commits or rolls back its own
    /// transaction.
    pub async fn execute(
        &self,
        intents: Vec<Option<StorageIntent>>,
        tx: Option<&mut S::Tx>,
    ) -> Result<ExecutionReport, ExecutorError> {
        let statements = plan(intents)?;
        if statements.is_empty() {
            return Ok(ExecutionReport::default());
        }

        match tx {
            Some(tx) => self.run(tx, &statements).await,
            None => {
                let mut tx = self.store.begin().await?;
                match self.run(&mut tx, &statements).await {
                    Ok(report) => {
                        self.store.commit(tx).await?;
                        Ok(report)
                    }
                    Err(error) => {
                        if let Err(rollback) = self.store.rollback(tx).await {
                            warn!(%rollback, "rollback after failed batch also failed");
                        }
                        Err(error)
                    }
                }
            }
        }
    }

    async fn run(
        &self,
        tx: &mut S::Tx,
        statements: &[Statement],
    ) -> Result<ExecutionReport, ExecutorError> {
        let batches = batch_ranges(statements, self.config.batch_size);
        let mut report = ExecutionReport {
            statements: statements.len(),
            batches: batches.len(),
            rows_affected: 0,
        };

        for (batch, range) in batches.into_iter().enumerate() {
            let chunk = &statements[range];
            debug!(batch, statements = chunk.len(), "executing statement batch");
            report.rows_affected += self
                .store
                .execute_batch(tx, chunk)
                .await
                .map_err(|source| ExecutorError::Batch { batch, source })?;
        }

        Ok(report)
    }
}

/// Validate and lower intents. Pure; performs no I/O.
pub fn plan(intents: Vec<Option<StorageIntent>>) -> Result<Vec<Statement>, ExecutorError> {
    let mut statements = Vec::with_capacity(intents.len());
    for (index, intent) in intents.into_iter().enumerate() {
        let Some(intent) = intent else { continue };
        let kind = intent.kind();
        let statement = intent.into_statement();
        if statement.predicate().is_some_and(|p| !p.is_bounded()) {
            let collection = statement.collection();
            warn!(index, kind, %collection, "rejecting unbounded predicate");
            return Err(ExecutorError::UnboundedPredicate {
                index,
                kind,
                collection,
            });
        }
        statements.push(statement);
    }
    Ok(statements)
}

/// Split `statements` into consecutive batches of whole dependency units,
/// each at most `batch_size` statements unless a single unit is larger.
pub fn batch_ranges(statements: &[Statement], batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);

    let mut units: Vec<Range<usize>> = Vec::new();
    for (i, statement) in statements.iter().enumerate() {
        match units.last_mut() {
            Some(unit) if statement.continues(&statements[i - 1]) => unit.end = i + 1,
            _ => units.push(i..i + 1),
        }
    }

    let mut batches: Vec<Range<usize>> = Vec::new();
    for unit in units {
        match batches.last_mut() {
            Some(batch) if unit.end - batch.start <= batch_size => batch.end = unit.end,
            _ => batches.push(unit),
        }
    }
    batches
}
