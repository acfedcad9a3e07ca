//! # In-Memory Statement Store
//!
//! Transactional store for tests and tooling. A transaction works on a copy of
//! the committed tables and holds the writer lock until commit or rollback,
//! so write transactions never interleave.

use crate::domain::{
    Assignment, Assignments, Collection, Predicate, Row, Statement, StoreError, Value,
};
use crate::ports::outbound::{RowSource, StatementStore};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

type Tables = BTreeMap<Collection, Vec<Row>>;

/// Open transaction on an `InMemoryStatementStore`.
pub struct MemoryTx {
    working: Tables,
    statements: usize,
    _writer: OwnedMutexGuard<()>,
}

impl MemoryTx {
    /// Rows of `collection` as seen inside this transaction.
    pub fn rows(&self, collection: Collection) -> Vec<Row> {
        self.working.get(&collection).cloned().unwrap_or_default()
    }

    /// Statements executed so far.
    pub fn statements(&self) -> usize {
        self.statements
    }
}

#[derive(Default)]
pub struct InMemoryStatementStore {
    committed: RwLock<Tables>,
    writer: Arc<tokio::sync::Mutex<()>>,
    /// Collection whose statements fail, for failure-path tests.
    fail_on: Mutex<Option<Collection>>,
}

impl InMemoryStatementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every statement touching `collection` fail until cleared.
    pub fn fail_on(&self, collection: Option<Collection>) {
        *self.fail_on.lock() = collection;
    }

    /// Committed rows of `collection`, in insertion order.
    pub fn rows(&self, collection: Collection) -> Vec<Row> {
        self.committed
            .read()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed committed rows directly, bypassing statements.
    pub fn seed(&self, collection: Collection, rows: Vec<Row>) {
        let defaults = collection.defaults();
        let mut committed = self.committed.write();
        let table = committed.entry(collection).or_default();
        for row in rows {
            table.push(with_defaults(&defaults, row));
        }
    }

    fn apply(&self, tables: &mut Tables, statement: &Statement) -> Result<u64, StoreError> {
        let collection = statement.collection();
        if *self.fail_on.lock() == Some(collection) {
            return Err(StoreError::Backend(format!(
                "injected failure on {collection}"
            )));
        }
        let table = tables.entry(collection).or_default();
        match statement {
            Statement::Insert { row, .. } => {
                insert(collection, table, row.clone())?;
                Ok(1)
            }
            Statement::InsertMany { rows, .. } => {
                for row in rows {
                    insert(collection, table, row.clone())?;
                }
                Ok(rows.len() as u64)
            }
            Statement::Update {
                predicate,
                assignments,
                ..
            } => update(collection, table, predicate, assignments),
            Statement::Delete { predicate, .. } => {
                let before = table.len();
                table.retain(|row| !predicate.matches(row));
                Ok((before - table.len()) as u64)
            }
            Statement::Upsert {
                row, on_conflict, ..
            } => {
                let key = primary_key_predicate(collection, row)?;
                if table.iter().any(|existing| key.matches(existing)) {
                    update(collection, table, &key, on_conflict)
                } else {
                    insert(collection, table, row.clone())?;
                    Ok(1)
                }
            }
        }
    }
}

fn with_defaults(defaults: &Row, row: Row) -> Row {
    let mut filled = defaults.clone();
    filled.extend(row);
    filled
}

fn primary_key_predicate(collection: Collection, row: &Row) -> Result<Predicate, StoreError> {
    let keys = collection.primary_key();
    if keys.is_empty() {
        return Err(StoreError::NoPrimaryKey { collection });
    }
    let terms = keys
        .iter()
        .map(|&column| {
            row.get(column)
                .filter(|v| !v.is_null())
                .map(|v| Predicate::Eq(column.to_string(), v.clone()))
                .ok_or(StoreError::MissingPrimaryKey { collection, column })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Predicate::And(terms))
}

fn insert(collection: Collection, table: &mut Vec<Row>, row: Row) -> Result<(), StoreError> {
    if !collection.primary_key().is_empty() {
        let key = primary_key_predicate(collection, &row)?;
        if table.iter().any(|existing| key.matches(existing)) {
            return Err(StoreError::DuplicateKey {
                collection,
                key: key.to_sql(),
            });
        }
    }
    table.push(with_defaults(&collection.defaults(), row));
    Ok(())
}

fn update(
    collection: Collection,
    table: &mut [Row],
    predicate: &Predicate,
    assignments: &Assignments,
) -> Result<u64, StoreError> {
    let mut affected = 0;
    for row in table.iter_mut().filter(|row| predicate.matches(row)) {
        for (column, assignment) in assignments {
            let value = match assignment {
                Assignment::Set(value) => value.clone(),
                Assignment::Increment(delta) => {
                    let current = match row.get(column) {
                        None | Some(Value::Null) => 0,
                        Some(Value::Int(v)) => *v,
                        Some(_) => {
                            return Err(StoreError::InvalidIncrement {
                                collection,
                                column: column.clone(),
                                reason: "not an integer column",
                            })
                        }
                    };
                    Value::Int(current.checked_add(*delta).ok_or_else(|| {
                        StoreError::InvalidIncrement {
                            collection,
                            column: column.clone(),
                            reason: "integer overflow",
                        }
                    })?)
                }
            };
            row.insert(column.clone(), value);
        }
        affected += 1;
    }
    Ok(affected)
}

#[async_trait]
impl StatementStore for InMemoryStatementStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let writer = self.writer.clone().lock_owned().await;
        Ok(MemoryTx {
            working: self.committed.read().clone(),
            statements: 0,
            _writer: writer,
        })
    }

    async fn execute_batch(
        &self,
        tx: &mut MemoryTx,
        batch: &[Statement],
    ) -> Result<u64, StoreError> {
        let mut affected = 0;
        for statement in batch {
            affected += self.apply(&mut tx.working, statement)?;
            tx.statements += 1;
        }
        Ok(affected)
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), StoreError> {
        *self.committed.write() = tx.working;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl RowSource for InMemoryStatementStore {
    async fn select(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<Vec<Row>, StoreError> {
        Ok(self
            .committed
            .read()
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| predicate.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}
