//! Row predicates and column assignments.

use crate::domain::values::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row filter for conditional updates and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
    Gt(String, Value),
    /// Conjunction. An empty conjunction matches every row and is unbounded.
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn one_of<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gt(column.into(), value.into())
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        let mut terms = match self {
            Predicate::And(terms) => terms,
            single => vec![single],
        };
        match other {
            Predicate::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        Predicate::And(terms)
    }

    /// False when the predicate would select every row.
    pub fn is_bounded(&self) -> bool {
        match self {
            Predicate::Eq(..) | Predicate::In(..) | Predicate::Gt(..) => true,
            Predicate::And(terms) => !terms.is_empty() && terms.iter().any(Predicate::is_bounded),
        }
    }

    /// Missing columns read as `Null`. `Gt` only compares integers.
    pub fn matches(&self, row: &Row) -> bool {
        let column = |name: &str| row.get(name).unwrap_or(&Value::Null);
        match self {
            Predicate::Eq(name, value) => column(name) == value,
            Predicate::In(name, values) => values.contains(column(name)),
            Predicate::Gt(name, value) => match (column(name), value) {
                (Value::Int(actual), Value::Int(bound)) => actual > bound,
                _ => false,
            },
            Predicate::And(terms) => terms.iter().all(|t| t.matches(row)),
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            Predicate::Eq(name, Value::Null) => format!("\"{name}\" IS NULL"),
            Predicate::Eq(name, value) => format!("\"{name}\" = {}", value.to_sql_literal()),
            Predicate::In(_, values) if values.is_empty() => "FALSE".to_string(),
            Predicate::In(name, values) => {
                let list: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
                format!("\"{name}\" IN ({})", list.join(", "))
            }
            Predicate::Gt(name, value) => format!("\"{name}\" > {}", value.to_sql_literal()),
            Predicate::And(terms) if terms.is_empty() => "TRUE".to_string(),
            Predicate::And(terms) => {
                let parts: Vec<String> =
                    terms.iter().map(|t| format!("({})", t.to_sql())).collect();
                parts.join(" AND ")
            }
        }
    }
}

/// How an update changes one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assignment {
    /// `column = value`
    Set(Value),
    /// `column = column + delta`
    Increment(i64),
}

impl Assignment {
    pub fn to_sql(&self, column: &str) -> String {
        match self {
            Assignment::Set(value) => format!("\"{column}\" = {}", value.to_sql_literal()),
            Assignment::Increment(delta) if *delta < 0 => {
                format!("\"{column}\" = \"{column}\" - {}", delta.unsigned_abs())
            }
            Assignment::Increment(delta) => format!("\"{column}\" = \"{column}\" + {delta}"),
        }
    }
}

/// Column assignments of one update, ordered by column name.
pub type Assignments = BTreeMap<String, Assignment>;
