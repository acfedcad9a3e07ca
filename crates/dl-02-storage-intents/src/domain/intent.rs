//! # Storage Intents
//!
//! Declarative descriptions of one persistent mutation each. A list of
//! intents is the unit the executor applies atomically.

use crate::domain::predicate::{Assignment, Assignments, Predicate};
use crate::domain::schema::Collection;
use crate::domain::statement::Statement;
use crate::domain::values::{Row, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageIntent {
    Create {
        collection: Collection,
        values: Row,
    },
    Update {
        collection: Collection,
        predicate: Predicate,
        assignments: Assignments,
    },
    Remove {
        collection: Collection,
        predicate: Predicate,
    },
    /// Insert-or-update by primary key.
    Upsert {
        collection: Collection,
        values: Row,
        on_conflict: Assignments,
    },
    BulkCreate {
        collection: Collection,
        rows: Vec<Row>,
    },
    /// Pre-built statement passed through unchanged.
    Custom {
        collection: Collection,
        statement: Statement,
    },
}

impl StorageIntent {
    pub fn collection(&self) -> Collection {
        match self {
            StorageIntent::Create { collection, .. }
            | StorageIntent::Update { collection, .. }
            | StorageIntent::Remove { collection, .. }
            | StorageIntent::Upsert { collection, .. }
            | StorageIntent::BulkCreate { collection, .. }
            | StorageIntent::Custom { collection, .. } => *collection,
        }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageIntent::Create { .. } => "create",
            StorageIntent::Update { .. } => "update",
            StorageIntent::Remove { .. } => "remove",
            StorageIntent::Upsert { .. } => "upsert",
            StorageIntent::BulkCreate { .. } => "bulk_create",
            StorageIntent::Custom { .. } => "custom",
        }
    }

    /// Update whose assignments are all increments.
    pub fn increment<I>(collection: Collection, predicate: Predicate, deltas: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, i64)>,
    {
        StorageIntent::Update {
            collection,
            predicate,
            assignments: deltas
                .into_iter()
                .map(|(column, delta)| (column.to_string(), Assignment::Increment(delta)))
                .collect(),
        }
    }

    /// Update whose assignments are all plain sets.
    pub fn set<I>(collection: Collection, predicate: Predicate, values: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        StorageIntent::Update {
            collection,
            predicate,
            assignments: values
                .into_iter()
                .map(|(column, value)| (column.to_string(), Assignment::Set(value)))
                .collect(),
        }
    }

    /// True for an update that assigns nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self, StorageIntent::Update { assignments, .. } if assignments.is_empty())
    }

    /// Lower into the single statement that executes this intent.
    pub fn into_statement(self) -> Statement {
        match self {
            StorageIntent::Create { collection, values } => Statement::Insert {
                collection,
                row: values,
            },
            StorageIntent::Update {
                collection,
                predicate,
                assignments,
            } => Statement::Update {
                collection,
                predicate,
                assignments,
            },
            StorageIntent::Remove {
                collection,
                predicate,
            } => Statement::Delete {
                collection,
                predicate,
            },
            StorageIntent::Upsert {
                collection,
                values,
                on_conflict,
            } => Statement::Upsert {
                collection,
                row: values,
                on_conflict,
            },
            StorageIntent::BulkCreate { collection, rows } => {
                Statement::InsertMany { collection, rows }
            }
            StorageIntent::Custom { statement, .. } => statement,
        }
    }
}
