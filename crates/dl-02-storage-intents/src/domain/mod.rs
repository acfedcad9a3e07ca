//! Storage intent domain: values, collections, predicates, intents and the
//! statements they lower into.

pub mod errors;
pub mod intent;
pub mod predicate;
pub mod schema;
pub mod statement;
pub mod values;

pub use errors::{ExecutorError, StoreError};
pub use intent::StorageIntent;
pub use predicate::{Assignment, Assignments, Predicate};
pub use schema::Collection;
pub use statement::Statement;
pub use values::{row, Row, Value};
