//! Change-tracking session.
//!
//! # Responsibility
//! - Cache loaded entities per session in an identity map.
//! - Queue updates, deletes and merges until the next flush.
//!
//! # Invariants
//! - An identifier maps to at most one cached instance per table.
//! - Queries and commit flush queued writes first.
//! - After a failed flush inside a transaction, commit is refused until
//!   the session rolls back.

use super::sql::{self, WriteStatement};
use super::{Interceptor, PersistenceSession, SessionFactory};
use crate::error::{PersistError, PersistResult};
use crate::mapping::{display_value, sql_value, Entity};
use crate::query::Criteria;
use log::debug;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdentityKey {
    table: &'static str,
    id: String,
}

impl IdentityKey {
    fn new(table: &'static str, id: &Value) -> Self {
        Self {
            table,
            id: display_value(id),
        }
    }
}

#[derive(Debug)]
struct PendingWrite {
    key: IdentityKey,
    statement: WriteStatement,
    /// Fail the flush when the statement touches no row.
    expect_row: bool,
}

/// Change-tracking session.
///
/// Loaded entities are cached in an identity map. Inserts run immediately so
/// generated identifiers are known; updates, deletes and merges are queued
/// and executed on flush. Queries and commit flush first.
pub struct Session {
    id: Uuid,
    conn: Option<Connection>,
    interceptor: Option<Box<dyn Interceptor>>,
    identity_map: HashMap<IdentityKey, Box<dyn Any + Send>>,
    deleted: HashSet<IdentityKey>,
    pending: Vec<PendingWrite>,
    /// Set when a flush fails inside a transaction; blocks commit.
    failed_flush: Option<String>,
}

impl Session {
    fn conn(&self) -> PersistResult<&Connection> {
        self.conn.as_ref().ok_or(PersistError::SessionClosed)
    }

    fn notify(&self, hook: impl FnOnce(&dyn Interceptor)) {
        if let Some(interceptor) = &self.interceptor {
            hook(interceptor.as_ref());
        }
    }

    fn cached<T: Entity>(&self, key: &IdentityKey) -> Option<T> {
        self.identity_map
            .get(key)
            .and_then(|entity| entity.downcast_ref::<T>())
            .cloned()
    }

    fn track<T: Entity>(&mut self, key: IdentityKey, entity: &T) {
        self.deleted.remove(&key);
        self.identity_map.insert(key, Box::new(entity.clone()));
    }

    /// Number of queued writes not yet flushed.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Whether an entity with this identifier is cached.
    pub fn contains<T: Entity>(&self, id: &T::Id) -> bool {
        sql_value(id)
            .map(|id| self.identity_map.contains_key(&IdentityKey::new(T::TABLE, &id)))
            .unwrap_or(false)
    }

    fn apply(&self, pending: &[PendingWrite]) -> PersistResult<()> {
        let conn = self.conn()?;
        for write in pending {
            let changed = sql::execute(conn, &write.statement)?;
            if write.expect_row && changed == 0 {
                return Err(PersistError::NotFound {
                    entity: write.key.table,
                    id: write.key.id.clone(),
                });
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.identity_map.clear();
        self.deleted.clear();
        self.pending.clear();
        self.failed_flush = None;
    }
}

impl PersistenceSession for Session {
    const KIND: &'static str = "stateful";
    const SESSION_KEY: &'static str = "sqlsession.session";
    const TRANSACTION_KEY: &'static str = "sqlsession.transaction";
    const STATEFUL: bool = true;

    fn open(
        factory: &SessionFactory,
        interceptor: Option<Box<dyn Interceptor>>,
    ) -> PersistResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            conn: Some(factory.open_connection()?),
            interceptor,
            identity_map: HashMap::new(),
            deleted: HashSet::new(),
            pending: Vec::new(),
            failed_flush: None,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| !conn.is_autocommit())
    }

    fn begin(&mut self) -> PersistResult<()> {
        sql::begin(self.conn()?)
    }

    fn commit(&mut self) -> PersistResult<()> {
        if let Some(reason) = &self.failed_flush {
            return Err(PersistError::Session(format!(
                "cannot commit after a failed flush: {reason}"
            )));
        }
        self.flush()?;
        sql::commit(self.conn()?)
    }

    fn rollback(&mut self) -> PersistResult<()> {
        self.clear();
        match &self.conn {
            Some(conn) => sql::rollback(conn),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> PersistResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        self.notify(|interceptor| interceptor.on_flush(pending.len()));
        let result = self.apply(&pending);
        self.deleted.clear();
        if let Err(err) = &result {
            if self.in_transaction() {
                self.failed_flush = Some(err.to_string());
            }
        }

        debug!(
            "event=session_flush module=session status={} session={} writes={}",
            if result.is_ok() { "ok" } else { "error" },
            self.id,
            pending.len()
        );
        result
    }

    fn close(&mut self) -> PersistResult<()> {
        let flushed = if self.conn.is_some() {
            self.flush()
        } else {
            Ok(())
        };
        self.clear();
        let closed = sql::close(self.conn.take());
        flushed.and(closed)
    }

    fn get<T: Entity>(&mut self, id: &T::Id) -> PersistResult<Option<T>> {
        let id = sql_value(id)?;
        let key = IdentityKey::new(T::TABLE, &id);
        if self.deleted.contains(&key) {
            return Ok(None);
        }
        if let Some(entity) = self.cached::<T>(&key) {
            return Ok(Some(entity));
        }

        let loaded = sql::find_by_id::<T>(self.conn()?, id)?;
        if let Some(entity) = &loaded {
            self.notify(|interceptor| interceptor.on_load(T::TABLE, &key.id));
            self.track(key, entity);
        }
        Ok(loaded)
    }

    fn list<T: Entity>(&mut self, criteria: &Criteria<T>) -> PersistResult<Vec<T>> {
        self.flush()?;
        let rows = sql::list(self.conn()?, criteria)?;

        let mut entities = Vec::with_capacity(rows.len());
        for entity in rows {
            let Some(id) = sql::id_value(&entity)? else {
                entities.push(entity);
                continue;
            };
            let key = IdentityKey::new(T::TABLE, &id);
            if let Some(cached) = self.cached::<T>(&key) {
                entities.push(cached);
                continue;
            }
            self.notify(|interceptor| interceptor.on_load(T::TABLE, &key.id));
            self.track(key, &entity);
            entities.push(entity);
        }
        Ok(entities)
    }

    fn count<T: Entity>(&mut self, criteria: &Criteria<T>) -> PersistResult<u64> {
        self.flush()?;
        sql::count(self.conn()?, criteria)
    }

    fn query_values(&mut self, sql: &str, params: &[Value]) -> PersistResult<Vec<Vec<Value>>> {
        self.flush()?;
        sql::query_values(self.conn()?, sql, params)
    }

    fn insert<T: Entity>(&mut self, entity: &mut T) -> PersistResult<()> {
        self.flush()?;
        let id = sql::insert(self.conn()?, entity)?;
        let key = IdentityKey::new(T::TABLE, &id);
        self.notify(|interceptor| interceptor.on_save(T::TABLE, &key.id));
        self.track(key, entity);
        Ok(())
    }

    fn update<T: Entity>(&mut self, entity: &T) -> PersistResult<()> {
        self.conn()?;
        let id = sql::require_id(entity)?;
        let statement = sql::update_statement(entity, &id)?;
        let key = IdentityKey::new(T::TABLE, &id);

        self.notify(|interceptor| interceptor.on_update(T::TABLE, &key.id));
        self.pending.push(PendingWrite {
            key: key.clone(),
            statement,
            expect_row: true,
        });
        self.track(key, entity);
        Ok(())
    }

    fn delete<T: Entity>(&mut self, entity: &T) -> PersistResult<()> {
        self.conn()?;
        let id = sql::require_id(entity)?;
        let key = IdentityKey::new(T::TABLE, &id);

        self.notify(|interceptor| interceptor.on_delete(T::TABLE, &key.id));
        self.pending.push(PendingWrite {
            key: key.clone(),
            statement: sql::delete_statement::<T>(&id),
            expect_row: true,
        });
        self.identity_map.remove(&key);
        self.deleted.insert(key);
        Ok(())
    }

    fn save_or_update<T: Entity>(&mut self, entity: &mut T) -> PersistResult<()> {
        if entity.id().is_some() {
            self.update(&*entity)
        } else {
            self.insert(entity)
        }
    }

    fn merge<T: Entity>(&mut self, entity: &mut T) -> PersistResult<()> {
        let Some(id) = sql::id_value(&*entity)? else {
            return self.insert(entity);
        };
        self.conn()?;
        let statement = sql::upsert_statement(&*entity, &id)?;
        let key = IdentityKey::new(T::TABLE, &id);

        self.notify(|interceptor| interceptor.on_update(T::TABLE, &key.id));
        self.pending.push(PendingWrite {
            key: key.clone(),
            statement,
            expect_row: false,
        });
        self.track(key, &*entity);
        Ok(())
    }

    fn evict<T: Entity>(&mut self, entity: &T) -> PersistResult<()> {
        self.conn()?;
        let id = sql::require_id(entity)?;
        let key = IdentityKey::new(T::TABLE, &id);
        self.identity_map.remove(&key);
        self.deleted.remove(&key);
        self.pending.retain(|write| write.key != key);
        Ok(())
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("tracked", &self.identity_map.len())
            .field("pending", &self.pending.len())
            .field("intercepted", &self.interceptor.is_some())
            .finish()
    }
}
