//! Error taxonomy shared by sessions, managers and repositories.
//!
//! # Responsibility
//! - Give callers a typed reason for every failed precondition.
//! - Keep engine failures wrapped instead of flattened to strings.
//!
//! # Invariants
//! - Only `Engine` carries a lower-level `rusqlite` error as its source.
//! - `Configuration` errors are fatal for the component that raised them.

use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PersistResult<T> = Result<T, PersistError>;

/// Failure raised by the data-access layer.
#[derive(Debug)]
pub enum PersistError {
    /// Required configuration is absent or malformed.
    Configuration(ConfigError),
    /// No usable session could be produced or bound to the unit of work.
    Session(String),
    /// A write was attempted without an open session.
    SessionClosed,
    /// A write was attempted without an obtainable transaction.
    NoTransaction,
    /// Operation requires an identity map (stateful sessions only).
    UnsupportedOperation(&'static str),
    /// A single-result lookup matched more than one row.
    NonUniqueResult { entity: &'static str, count: u64 },
    /// Identifier did not resolve to a persisted entity.
    NotFound { entity: &'static str, id: String },
    /// Field name is not part of the entity schema.
    UnknownField { entity: &'static str, field: String },
    /// Entity type is not part of the configured mapping catalog.
    UnmappedEntity(&'static str),
    /// Persisted or requested data cannot be represented.
    InvalidData(String),
    /// Underlying SQLite failure.
    Engine(rusqlite::Error),
}

impl PersistError {
    /// Returns whether this error originated in the database engine.
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {err}"),
            Self::Session(message) => write!(f, "session error: {message}"),
            Self::SessionClosed => write!(f, "session must be open before writing"),
            Self::NoTransaction => write!(f, "writes must be done within a transaction"),
            Self::UnsupportedOperation(op) => {
                write!(f, "`{op}` does not apply to stateless sessions")
            }
            Self::NonUniqueResult { entity, count } => {
                write!(f, "expected one `{entity}` row, query matched {count}")
            }
            Self::NotFound { entity, id } => write!(f, "`{entity}` not found: {id}"),
            Self::UnknownField { entity, field } => {
                write!(f, "`{field}` is not a mapped field of `{entity}`")
            }
            Self::UnmappedEntity(entity) => {
                write!(f, "`{entity}` is not part of the configured mapping catalog")
            }
            Self::InvalidData(message) => write!(f, "invalid data: {message}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for PersistError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Engine(value)
    }
}
