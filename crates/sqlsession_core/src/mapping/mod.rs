//! Entity mapping contracts.
//!
//! # Responsibility
//! - Describe how an entity type maps onto one table (`Entity`).
//! - Provide schema-validated field selectors (`Field<T>`).
//! - Group mappings into named catalogs selected by configuration.
//!
//! # Invariants
//! - Every identifier quoted into SQL comes from a mapping, never from
//!   unchecked caller input.

mod catalog;
mod entity;
mod field;

pub use catalog::{EntityMapping, MappingCatalog};
pub use entity::Entity;
pub use field::Field;

use crate::error::{PersistError, PersistResult};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;

/// Converts any bindable value into an owned SQLite value.
pub(crate) fn sql_value(value: &dyn ToSql) -> PersistResult<Value> {
    match value.to_sql()? {
        ToSqlOutput::Borrowed(borrowed) => Ok(borrowed.into()),
        ToSqlOutput::Owned(owned) => Ok(owned),
        #[allow(unreachable_patterns)]
        _ => Err(PersistError::InvalidData(
            "unsupported parameter representation".to_string(),
        )),
    }
}

/// Human-readable rendering of an identifier value.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}

/// Double-quotes a mapped SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}
