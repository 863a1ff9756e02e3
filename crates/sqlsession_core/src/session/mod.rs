//! Sessions, transactions and their per-unit-of-work management.
//!
//! # Responsibility
//! - Open sessions from one shared `SessionFactory`.
//! - Bind at most one session and one transaction to each unit of work.
//! - Apply commit/rollback policy exactly once per transaction.
//!
//! # Invariants
//! - A session belongs to exactly one unit of work.
//! - A rolled-back or failed transaction always leaves its session closed.
//! - Writes only reach the engine through an open session.

mod factory;
mod interceptor;
mod manager;
pub(crate) mod sql;
mod stateful;
mod stateless;
mod transaction;

pub use factory::SessionFactory;
pub use interceptor::Interceptor;
pub use manager::{
    lock_session, Manager, ManagerCell, SessionManager, SharedSession, StatelessSessionManager,
};
pub use stateful::Session;
pub use stateless::StatelessSession;
pub use transaction::{TransactionHandle, TransactionState};

use crate::error::PersistResult;
use crate::mapping::Entity;
use crate::query::Criteria;
use rusqlite::types::Value;
use uuid::Uuid;

/// Behaviour shared by stateful and stateless sessions.
///
/// Operations that need an identity map default to
/// `PersistError::UnsupportedOperation`.
pub trait PersistenceSession: Send + Sized + 'static {
    /// `"stateful"` or `"stateless"`, used in logs and errors.
    const KIND: &'static str;
    /// Context slot holding the session.
    const SESSION_KEY: &'static str;
    /// Context slot holding the transaction handle.
    const TRANSACTION_KEY: &'static str;
    /// Whether the session keeps an identity map and accepts interceptors.
    const STATEFUL: bool;

    fn open(
        factory: &SessionFactory,
        interceptor: Option<Box<dyn Interceptor>>,
    ) -> PersistResult<Self>;

    fn id(&self) -> Uuid;
    fn is_open(&self) -> bool;
    /// Whether the connection is inside an engine transaction.
    fn in_transaction(&self) -> bool;

    fn begin(&mut self) -> PersistResult<()>;
    fn commit(&mut self) -> PersistResult<()>;
    fn rollback(&mut self) -> PersistResult<()>;
    /// Executes queued writes.
    fn flush(&mut self) -> PersistResult<()>;
    /// Flushes, then releases the connection. The session stays unusable.
    fn close(&mut self) -> PersistResult<()>;

    fn get<T: Entity>(&mut self, id: &T::Id) -> PersistResult<Option<T>>;
    fn list<T: Entity>(&mut self, criteria: &Criteria<T>) -> PersistResult<Vec<T>>;
    fn count<T: Entity>(&mut self, criteria: &Criteria<T>) -> PersistResult<u64>;
    /// Runs a projection query and returns raw rows.
    fn query_values(&mut self, sql: &str, params: &[Value]) -> PersistResult<Vec<Vec<Value>>>;

    fn insert<T: Entity>(&mut self, entity: &mut T) -> PersistResult<()>;
    fn update<T: Entity>(&mut self, entity: &T) -> PersistResult<()>;
    fn delete<T: Entity>(&mut self, entity: &T) -> PersistResult<()>;

    fn save_or_update<T: Entity>(&mut self, _entity: &mut T) -> PersistResult<()> {
        Err(crate::error::PersistError::UnsupportedOperation("save_or_update"))
    }

    fn merge<T: Entity>(&mut self, _entity: &mut T) -> PersistResult<()> {
        Err(crate::error::PersistError::UnsupportedOperation("merge"))
    }

    fn evict<T: Entity>(&mut self, _entity: &T) -> PersistResult<()> {
        Err(crate::error::PersistError::UnsupportedOperation("evict"))
    }
}
