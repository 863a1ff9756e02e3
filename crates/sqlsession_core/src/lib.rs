//! Session-per-unit-of-work data access over SQLite.
//! Sessions, transactions and repositories are bound to the unit of work
//! that opened them and released when it ends.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod mapping;
pub mod query;
pub mod repo;
pub mod session;

pub use rusqlite;

pub use config::{Config, ConfigError, TransactionScope, CONFIG_SECTION_NAME};
pub use context::{CallScope, ContextStore, RequestItems, WorkContext};
pub use db::DataSource;
pub use error::{PersistError, PersistResult};
pub use lifecycle::{RequestLifecycle, UnitOfWorkHooks};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use mapping::{Entity, EntityMapping, Field, MappingCatalog};
pub use query::{Criteria, Order, Sort, SortDirection, SortList};
pub use repo::{EntityRepository, Page, Repository, StatelessRepository};
pub use session::{
    lock_session, Interceptor, Manager, ManagerCell, PersistenceSession, Session, SessionFactory,
    SessionManager, SharedSession, StatelessSession, StatelessSessionManager, TransactionHandle,
    TransactionState,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
