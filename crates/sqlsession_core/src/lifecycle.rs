//! Unit-of-work boundaries for request-driven hosts.
//!
//! # Responsibility
//! - Open the session (and, in request scope, the transaction) when a unit
//!   of work starts.
//! - Commit in request scope and always release the session when it ends.
//!
//! # Invariants
//! - A unit of work never ends with its session still bound.
//! - A failed handler rolls back; it is never committed.

use crate::context::{ContextStore, WorkContext};
use crate::error::{PersistError, PersistResult};
use crate::session::{Manager, PersistenceSession};
use log::{debug, warn};
use std::sync::Arc;

/// Hooks a host invokes at the boundaries of each unit of work.
pub trait UnitOfWorkHooks {
    fn on_begin(&self, ctx: WorkContext<'_>) -> PersistResult<()>;

    fn on_end(&self, ctx: WorkContext<'_>) -> PersistResult<()>;
}

/// Request lifecycle adapter over one manager.
#[derive(Debug)]
pub struct RequestLifecycle<S: PersistenceSession> {
    manager: Arc<Manager<S>>,
}

impl<S: PersistenceSession> Clone for RequestLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<S: PersistenceSession> RequestLifecycle<S> {
    pub fn new(manager: Arc<Manager<S>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<Manager<S>> {
        &self.manager
    }

    /// Binds a session and, in request scope, starts the transaction.
    ///
    /// When the transaction cannot be started the session is closed again
    /// before the error is returned.
    pub fn begin_request(&self, ctx: WorkContext<'_>) -> PersistResult<()> {
        self.manager.get_session(&ctx)?;
        if self.manager.transaction_scope().is_unit_of_work() {
            if let Err(err) = self.manager.begin_transaction(&ctx) {
                warn!(
                    "event=request_begin module=lifecycle status=error unit={} error={}",
                    ctx.unit_id(),
                    err
                );
                if let Err(close_err) = self.manager.close_session(&ctx) {
                    warn!(
                        "event=session_close module=lifecycle status=error unit={} error={}",
                        ctx.unit_id(),
                        close_err
                    );
                }
                return Err(err);
            }
        }
        debug!(
            "event=request_begin module=lifecycle status=ok unit={} context={} scope={}",
            ctx.unit_id(),
            ctx.kind(),
            self.manager.transaction_scope().as_str()
        );
        Ok(())
    }

    /// Commits in request scope, then always closes the session.
    ///
    /// A failed commit has already rolled back; its error is returned after
    /// the session is closed.
    pub fn end_request(&self, ctx: WorkContext<'_>) -> PersistResult<()> {
        let committed = if self.manager.transaction_scope().is_unit_of_work() {
            self.manager.commit_transaction(&ctx)
        } else {
            Ok(())
        };
        let closed = self.manager.close_session(&ctx);

        debug!(
            "event=request_end module=lifecycle status={} unit={}",
            if committed.is_ok() && closed.is_ok() {
                "ok"
            } else {
                "error"
            },
            ctx.unit_id()
        );
        committed.and(closed)
    }

    /// Runs `handler` as one unit of work.
    ///
    /// On handler failure the transaction is rolled back, the session is
    /// closed and the handler's error is returned unchanged.
    pub fn run<'a, R, E>(
        &self,
        ctx: WorkContext<'a>,
        handler: impl FnOnce(WorkContext<'a>) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<PersistError>,
    {
        self.begin_request(ctx)?;
        match handler(ctx) {
            Ok(value) => {
                self.end_request(ctx)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.manager.rollback_transaction(&ctx) {
                    warn!(
                        "event=request_abort module=lifecycle status=error unit={} error={}",
                        ctx.unit_id(),
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

impl<S: PersistenceSession> UnitOfWorkHooks for RequestLifecycle<S> {
    fn on_begin(&self, ctx: WorkContext<'_>) -> PersistResult<()> {
        self.begin_request(ctx)
    }

    fn on_end(&self, ctx: WorkContext<'_>) -> PersistResult<()> {
        self.end_request(ctx)
    }
}

