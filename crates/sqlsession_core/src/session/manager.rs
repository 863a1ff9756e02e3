//! Per-unit-of-work session and transaction management.
//!
//! # Responsibility
//! - Bind one session and at most one transaction handle to each unit of work.
//! - Apply the commit and rollback policy for that transaction.
//!
//! # Invariants
//! - A replaced session never leaves an active handle behind.
//! - A failed commit rolls back and closes the session.
//! - Rollback always clears the handle and closes the session.

use super::{
    Interceptor, PersistenceSession, Session, SessionFactory, StatelessSession, TransactionHandle,
    TransactionState,
};
use crate::config::{Config, ConfigError, TransactionScope};
use crate::context::ContextStore;
use crate::db::DataSource;
use crate::error::{PersistError, PersistResult};
use crate::mapping::MappingCatalog;
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Session bound to one unit of work.
pub type SharedSession<S> = Arc<Mutex<S>>;

/// Manager of change-tracking sessions.
pub type SessionManager = Manager<Session>;
/// Manager of stateless sessions.
pub type StatelessSessionManager = Manager<StatelessSession>;

/// Locks a shared session, recovering the guard from a poisoned mutex.
pub fn lock_session<S>(session: &SharedSession<S>) -> MutexGuard<'_, S> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Binds sessions and transactions of kind `S` to units of work.
///
/// The manager is stateless apart from the factory: every session and
/// transaction handle lives in the context store of the unit of work that
/// opened it, so one manager can serve any number of concurrent units.
pub struct Manager<S: PersistenceSession> {
    factory: Arc<SessionFactory>,
    _session: PhantomData<fn() -> S>,
}

impl<S: PersistenceSession> Manager<S> {
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        info!(
            "event=manager_init module=session status=ok kind={} catalog={} scope={}",
            S::KIND,
            factory.catalog().name(),
            factory.config().transaction_scope.as_str()
        );
        Self {
            factory,
            _session: PhantomData,
        }
    }

    /// Builds the session factory and a manager over it.
    pub fn init(
        config: Config,
        data_source: DataSource,
        catalogs: impl IntoIterator<Item = MappingCatalog>,
    ) -> PersistResult<Self> {
        let factory = SessionFactory::build(config, data_source, catalogs)?;
        Ok(Self::new(Arc::new(factory)))
    }

    pub fn config(&self) -> &Config {
        self.factory.config()
    }

    pub fn transaction_scope(&self) -> TransactionScope {
        self.factory.config().transaction_scope
    }

    pub fn factory(&self) -> &Arc<SessionFactory> {
        &self.factory
    }

    /// Returns the unit's open session, opening one when none is bound or
    /// the bound one was closed.
    ///
    /// # Errors
    /// - `Session` when no connection can be opened.
    pub fn get_session(&self, ctx: &impl ContextStore) -> PersistResult<SharedSession<S>> {
        self.bind_session(ctx, None)
    }

    /// Returns the session bound to the unit, open or not, without opening one.
    pub fn current_session(&self, ctx: &impl ContextStore) -> Option<SharedSession<S>> {
        ctx.get::<SharedSession<S>>(S::SESSION_KEY)
    }

    /// Opens the unit's session with `interceptor` attached.
    ///
    /// # Errors
    /// - `Session` when the unit already has an open session.
    /// - `UnsupportedOperation` for stateless sessions.
    pub fn register_interceptor(
        &self,
        ctx: &impl ContextStore,
        interceptor: Box<dyn Interceptor>,
    ) -> PersistResult<()> {
        if !S::STATEFUL {
            return Err(PersistError::UnsupportedOperation("register_interceptor"));
        }
        if let Some(session) = self.current_session(ctx) {
            let open = lock_session(&session).is_open();
            if open {
                warn!(
                    "event=interceptor_register module=session status=error unit={} reason=session_open",
                    ctx.unit_id()
                );
                return Err(PersistError::Session(
                    "cannot register an interceptor once a session has already been opened"
                        .to_string(),
                ));
            }
        }
        self.bind_session(ctx, Some(interceptor)).map(|_| ())
    }

    fn bind_session(
        &self,
        ctx: &impl ContextStore,
        interceptor: Option<Box<dyn Interceptor>>,
    ) -> PersistResult<SharedSession<S>> {
        if let Some(existing) = self.current_session(ctx) {
            let open = lock_session(&existing).is_open();
            if open {
                return Ok(existing);
            }
        }
        self.discard_stale_transaction(ctx);

        let session = S::open(&self.factory, interceptor).map_err(|err| {
            error!(
                "event=session_open module=session status=error kind={} unit={} error={}",
                S::KIND,
                ctx.unit_id(),
                err
            );
            err
        })?;
        debug!(
            "event=session_open module=session status=ok kind={} unit={} session={}",
            S::KIND,
            ctx.unit_id(),
            session.id()
        );

        let shared = Arc::new(Mutex::new(session));
        ctx.set(S::SESSION_KEY, Some(Arc::clone(&shared)));
        Ok(shared)
    }

    /// Drops a handle left behind by a session that was closed outside the
    /// manager. Its engine transaction went with the connection.
    fn discard_stale_transaction(&self, ctx: &impl ContextStore) {
        let Some(handle) = self.transaction(ctx) else {
            return;
        };
        if handle.is_active() {
            warn!(
                "event=transaction_discard module=session status=error kind={} unit={} transaction={} reason=session_replaced",
                S::KIND,
                ctx.unit_id(),
                handle.id()
            );
            handle.finish(TransactionState::RolledBack);
        }
        ctx.set::<TransactionHandle>(S::TRANSACTION_KEY, None);
    }

    /// Closes the unit's session and always clears its slot.
    ///
    /// A transaction handle still active at this point is marked rolled back,
    /// since closing the connection discards the engine transaction.
    pub fn close_session(&self, ctx: &impl ContextStore) -> PersistResult<()> {
        let result = match self.current_session(ctx) {
            Some(shared) => {
                let mut session = lock_session(&shared);
                if session.is_open() {
                    session.close()
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        };
        ctx.set::<SharedSession<S>>(S::SESSION_KEY, None);

        if let Some(handle) = self.transaction(ctx) {
            if handle.is_active() {
                warn!(
                    "event=session_close module=session status=error unit={} reason=transaction_active transaction={}",
                    ctx.unit_id(),
                    handle.id()
                );
                handle.finish(TransactionState::RolledBack);
            }
            ctx.set::<TransactionHandle>(S::TRANSACTION_KEY, None);
        }

        match &result {
            Ok(()) => debug!(
                "event=session_close module=session status=ok kind={} unit={}",
                S::KIND,
                ctx.unit_id()
            ),
            Err(err) => error!(
                "event=session_close module=session status=error kind={} unit={} error={}",
                S::KIND,
                ctx.unit_id(),
                err
            ),
        }
        result
    }

    /// Starts a transaction on the unit's session unless one is already active.
    pub fn begin_transaction(&self, ctx: &impl ContextStore) -> PersistResult<()> {
        if self.has_open_transaction(ctx) {
            return Ok(());
        }

        let shared = self.get_session(ctx)?;
        lock_session(&shared).begin()?;
        let handle = TransactionHandle::begin();
        debug!(
            "event=transaction_begin module=session status=ok kind={} unit={} transaction={}",
            S::KIND,
            ctx.unit_id(),
            handle.id()
        );
        ctx.set(S::TRANSACTION_KEY, Some(handle));
        Ok(())
    }

    /// Commits the unit's active transaction.
    ///
    /// A failed commit rolls back, closes the session and returns the commit
    /// error. A successful commit keeps the session open.
    pub fn commit_transaction(&self, ctx: &impl ContextStore) -> PersistResult<()> {
        let Some(handle) = self.transaction(ctx).filter(TransactionHandle::is_active) else {
            return Ok(());
        };

        let committed = match self.current_session(ctx) {
            Some(shared) => {
                let mut session = lock_session(&shared);
                if session.is_open() {
                    session.commit()
                } else {
                    Err(PersistError::SessionClosed)
                }
            }
            None => Err(PersistError::SessionClosed),
        };

        match committed {
            Ok(()) => {
                handle.finish(TransactionState::Committed);
                ctx.set::<TransactionHandle>(S::TRANSACTION_KEY, None);
                debug!(
                    "event=transaction_commit module=session status=ok kind={} unit={} transaction={}",
                    S::KIND,
                    ctx.unit_id(),
                    handle.id()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=transaction_commit module=session status=error kind={} unit={} transaction={} error={}",
                    S::KIND,
                    ctx.unit_id(),
                    handle.id(),
                    err
                );
                if let Err(rollback_err) = self.rollback_transaction(ctx) {
                    warn!(
                        "event=transaction_rollback module=session status=error unit={} error={}",
                        ctx.unit_id(),
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Rolls back the unit's transaction, then always clears the handle and
    /// closes the session.
    pub fn rollback_transaction(&self, ctx: &impl ContextStore) -> PersistResult<()> {
        let handle = self.transaction(ctx);

        let rolled_back = match (&handle, self.current_session(ctx)) {
            (Some(handle), Some(shared)) if handle.is_active() => {
                let mut session = lock_session(&shared);
                if session.is_open() {
                    session.rollback()
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        };

        if let Some(handle) = &handle {
            if handle.is_active() {
                handle.finish(TransactionState::RolledBack);
            }
            ctx.set::<TransactionHandle>(S::TRANSACTION_KEY, None);
            debug!(
                "event=transaction_rollback module=session status={} kind={} unit={} transaction={}",
                if rolled_back.is_ok() { "ok" } else { "error" },
                S::KIND,
                ctx.unit_id(),
                handle.id()
            );
        }

        let closed = self.close_session(ctx);
        rolled_back.and(closed)
    }

    /// Whether the unit holds an active transaction.
    pub fn has_open_transaction(&self, ctx: &impl ContextStore) -> bool {
        self.transaction(ctx)
            .is_some_and(|handle| handle.is_active())
    }

    /// The unit's current transaction handle, if any.
    pub fn transaction(&self, ctx: &impl ContextStore) -> Option<TransactionHandle> {
        ctx.get::<TransactionHandle>(S::TRANSACTION_KEY)
    }

    /// Closes the factory. Sessions already bound keep working until closed.
    pub fn shutdown(&self) {
        self.factory.close();
    }
}

impl<S: PersistenceSession> Debug for Manager<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("kind", &S::KIND)
            .field("factory", &self.factory)
            .finish()
    }
}

/// Lazily initialized process-wide manager.
///
/// Initialization runs at most once. A failure is cached and reported to
/// every later caller as a configuration error.
pub struct ManagerCell<S: PersistenceSession> {
    cell: OnceCell<Result<Arc<Manager<S>>, String>>,
}

impl<S: PersistenceSession> ManagerCell<S> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the manager, running `init` on first use.
    pub fn get_or_init(
        &self,
        init: impl FnOnce() -> PersistResult<Manager<S>>,
    ) -> PersistResult<Arc<Manager<S>>> {
        let outcome = self.cell.get_or_init(|| match init() {
            Ok(manager) => Ok(Arc::new(manager)),
            Err(err) => {
                error!(
                    "event=manager_init module=session status=error kind={} error={}",
                    S::KIND,
                    err
                );
                Err(err.to_string())
            }
        });

        match outcome {
            Ok(manager) => Ok(Arc::clone(manager)),
            Err(message) => Err(PersistError::Configuration(
                ConfigError::InitializationFailed(message.clone()),
            )),
        }
    }

    /// The manager if initialization already succeeded.
    pub fn get(&self) -> Option<Arc<Manager<S>>> {
        self.cell.get().and_then(|outcome| outcome.as_ref().ok().cloned())
    }
}

impl<S: PersistenceSession> Default for ManagerCell<S> {
    fn default() -> Self {
        Self::new()
    }
}
