use super::sql;
use super::{Interceptor, PersistenceSession, SessionFactory};
use crate::error::{PersistError, PersistResult};
use crate::mapping::{sql_value, Entity};
use crate::query::Criteria;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use uuid::Uuid;

/// Session without identity map or write queue.
///
/// Every write reaches the engine immediately and nothing is cached, so
/// flushing is a no-op and identity-map operations are unsupported.
pub struct StatelessSession {
    id: Uuid,
    conn: Option<Connection>,
}

impl StatelessSession {
    fn conn(&self) -> PersistResult<&Connection> {
        self.conn.as_ref().ok_or(PersistError::SessionClosed)
    }
}

impl PersistenceSession for StatelessSession {
    const KIND: &'static str = "stateless";
    const SESSION_KEY: &'static str = "sqlsession.stateless_session";
    const TRANSACTION_KEY: &'static str = "sqlsession.stateless_transaction";
    const STATEFUL: bool = false;

    fn open(
        factory: &SessionFactory,
        interceptor: Option<Box<dyn Interceptor>>,
    ) -> PersistResult<Self> {
        if interceptor.is_some() {
            return Err(PersistError::UnsupportedOperation("register_interceptor"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            conn: Some(factory.open_connection()?),
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
        sql::commit(self.conn()?)
    }

    fn rollback(&mut self) -> PersistResult<()> {
        match &self.conn {
            Some(conn) => sql::rollback(conn),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }

    fn close(&mut self) -> PersistResult<()> {
        sql::close(self.conn.take())
    }

    fn get<T: Entity>(&mut self, id: &T::Id) -> PersistResult<Option<T>> {
        let id = sql_value(id)?;
        sql::find_by_id(self.conn()?, id)
    }

    fn list<T: Entity>(&mut self, criteria: &Criteria<T>) -> PersistResult<Vec<T>> {
        sql::list(self.conn()?, criteria)
    }

    fn count<T: Entity>(&mut self, criteria: &Criteria<T>) -> PersistResult<u64> {
        sql::count(self.conn()?, criteria)
    }

    fn query_values(&mut self, sql: &str, params: &[Value]) -> PersistResult<Vec<Vec<Value>>> {
        sql::query_values(self.conn()?, sql, params)
    }

    fn insert<T: Entity>(&mut self, entity: &mut T) -> PersistResult<()> {
        sql::insert(self.conn()?, entity).map(|_| ())
    }

    fn update<T: Entity>(&mut self, entity: &T) -> PersistResult<()> {
        let conn = self.conn()?;
        let id = sql::require_id(entity)?;
        let statement = sql::update_statement(entity, &id)?;
        sql::execute_existing(conn, T::TABLE, &id, &statement)
    }

    fn delete<T: Entity>(&mut self, entity: &T) -> PersistResult<()> {
        let conn = self.conn()?;
        let id = sql::require_id(entity)?;
        sql::execute_existing(conn, T::TABLE, &id, &sql::delete_statement::<T>(&id))
    }
}

impl Debug for StatelessSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatelessSession")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}
