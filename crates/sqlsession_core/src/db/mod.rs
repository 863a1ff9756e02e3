//! SQLite connection sources.
//!
//! # Responsibility
//! - Describe where sessions connect to (file or shared in-memory database).
//! - Open connections configured the way every session expects them.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - A shared in-memory database lives as long as one connection to it is open.

use std::path::PathBuf;

mod open;

pub use open::open_connection;

/// Location of the database backing every session of a factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// SQLite database file.
    File(PathBuf),
    /// Named in-memory database shared between connections of this process.
    Memory(String),
}

impl DataSource {
    /// Shared in-memory database with a unique name.
    pub fn unique_memory() -> Self {
        Self::Memory(format!("sqlsession-{}", uuid::Uuid::new_v4()))
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory(_) => "memory",
        }
    }

    pub(crate) fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }
}
