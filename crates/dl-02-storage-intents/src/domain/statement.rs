//! # Store-Native Statements
//!
//! The executor lowers each storage intent into exactly one `Statement`.
//! Statements render to SQL for diagnostics; the in-memory store interprets
//! them directly.

use crate::domain::predicate::{Assignments, Predicate};
use crate::domain::schema::Collection;
use crate::domain::values::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    Insert {
        collection: Collection,
        row: Row,
    },
    InsertMany {
        collection: Collection,
        rows: Vec<Row>,
    },
    Update {
        collection: Collection,
        predicate: Predicate,
        assignments: Assignments,
    },
    Delete {
        collection: Collection,
        predicate: Predicate,
    },
    /// Insert `row`, or apply `on_conflict` to the row sharing its primary key.
    Upsert {
        collection: Collection,
        row: Row,
        on_conflict: Assignments,
    },
}

impl Statement {
    pub fn collection(&self) -> Collection {
        match self {
            Statement::Insert { collection, .. }
            | Statement::InsertMany { collection, .. }
            | Statement::Update { collection, .. }
            | Statement::Delete { collection, .. }
            | Statement::Upsert { collection, .. } => *collection,
        }
    }

    /// Predicate of a conditional statement.
    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            Statement::Update { predicate, .. } | Statement::Delete { predicate, .. } => {
                Some(predicate)
            }
            _ => None,
        }
    }

    /// True when `self` must run in the same batch as `previous`, which
    /// immediately precedes it: a delete followed by the inserts that replace
    /// it, or an upsert followed by the update of the row it guarantees.
    pub fn continues(&self, previous: &Statement) -> bool {
        if self.collection() != previous.collection() {
            return false;
        }
        matches!(
            (previous, self),
            (
                Statement::Delete { .. },
                Statement::Insert { .. } | Statement::InsertMany { .. }
            ) | (Statement::Upsert { .. }, Statement::Update { .. })
        )
    }

    pub fn to_sql(&self) -> String {
        match self {
            Statement::Insert { collection, row } => {
                insert_sql(*collection, std::slice::from_ref(row))
            }
            Statement::InsertMany { collection, rows } => insert_sql(*collection, rows),
            Statement::Update {
                collection,
                predicate,
                assignments,
            } if assignments.is_empty() => {
                format!("-- no-op UPDATE \"{collection}\" WHERE {}", predicate.to_sql())
            }
            Statement::Update {
                collection,
                predicate,
                assignments,
            } => format!(
                "UPDATE \"{collection}\" SET {} WHERE {}",
                set_sql(assignments),
                predicate.to_sql()
            ),
            Statement::Delete {
                collection,
                predicate,
            } => format!("DELETE FROM \"{collection}\" WHERE {}", predicate.to_sql()),
            Statement::Upsert {
                collection,
                row,
                on_conflict,
            } => {
                let keys: Vec<String> = collection
                    .primary_key()
                    .iter()
                    .map(|k| format!("\"{k}\""))
                    .collect();
                let action = if on_conflict.is_empty() {
                    "DO NOTHING".to_string()
                } else {
                    format!("DO UPDATE SET {}", set_sql(on_conflict))
                };
                format!(
                    "{} ON CONFLICT ({}) {action}",
                    insert_sql(*collection, std::slice::from_ref(row)),
                    keys.join(", ")
                )
            }
        }
    }
}

fn set_sql(assignments: &Assignments) -> String {
    let parts: Vec<String> = assignments
        .iter()
        .map(|(column, assignment)| assignment.to_sql(column))
        .collect();
    parts.join(", ")
}

// Rows may carry different column sets; absent columns render as DEFAULT.
fn insert_sql(collection: Collection, rows: &[Row]) -> String {
    let columns: BTreeSet<&String> = rows.iter().flat_map(|r| r.keys()).collect();
    let header: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let tuples: Vec<String> = rows
        .iter()
        .map(|r| {
            let values: Vec<String> = columns
                .iter()
                .map(|c| r.get(*c).map_or_else(|| "DEFAULT".to_string(), |v| v.to_sql_literal()))
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO \"{collection}\" ({}) VALUES {}",
        header.join(", "),
        tuples.join(", ")
    )
}
