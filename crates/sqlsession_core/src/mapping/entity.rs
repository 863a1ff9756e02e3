use rusqlite::types::{FromSql, Value};
use rusqlite::{Row, ToSql};
use std::fmt::Debug;

/// A persistable type with one identity column.
///
/// `COLUMNS` lists the non-identity columns; `values()` must return them in
/// the same order. Entities whose identity is generated by the database
/// return `None` from `id()` until `assign_generated_id` is called.
pub trait Entity: Clone + Send + 'static {
    type Id: ToSql + FromSql + Clone + Debug + Send + 'static;

    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<Self::Id>;

    /// Stores the rowid generated by an insert.
    fn assign_generated_id(&mut self, rowid: i64);

    fn values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}
