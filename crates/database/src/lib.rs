//! Database access for sqlclaw.
//!
//! The agent never talks to a driver directly: every tool goes through the
//! [`SqlEngine`] trait. [`SqliteEngine`] is the production implementation,
//! exposing one main database plus any number of attached files, each as
//! its own schema so queries read `schema.table`.

pub mod compare;
pub mod engine;
pub mod result;
pub mod sqlite;

pub use compare::{CompareError, DEFAULT_EPSILON, loosely_compare};
pub use engine::{ColumnInfo, ColumnMatch, SqlEngine, search_columns};
pub use result::{CellValue, QueryResult};
pub use sqlite::SqliteEngine;
