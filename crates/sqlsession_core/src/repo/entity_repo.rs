//! Generic entity repository over a managed session.
//!
//! # Responsibility
//! - Offer typed lookups, criteria queries and paging for any mapped entity.
//! - Wrap every write in a transaction, reusing the unit's transaction when
//!   one is active and owning a short one otherwise.
//!
//! # Invariants
//! - A write never runs without an open session and an active transaction.
//! - A failed write rolls back and closes the unit's session.
//! - Paging applies only when both page index and page size are given.
//! - Identity-map operations are rejected for stateless sessions before any
//!   transaction is touched.

use crate::context::WorkContext;
use crate::error::{PersistError, PersistResult};
use crate::mapping::{display_value, quote_ident, sql_value, Entity, Field};
use crate::query::{Criteria, SortList};
use crate::session::{lock_session, Manager, PersistenceSession, Session, StatelessSession};
use log::{debug, warn};
use rusqlite::types::{FromSql, Value, ValueRef};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// One page of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter, ignoring paging.
    pub total_count: u64,
}

/// Data access contract for one entity type.
pub trait EntityRepository<T: Entity> {
    /// Gets one entity by identifier.
    fn get(&self, id: T::Id) -> PersistResult<Option<T>>;
    /// Gets the single entity whose `field` equals `value`.
    fn get_by_property(&self, field: Field<T>, value: impl Into<Value>) -> PersistResult<Option<T>>;
    /// Reads one property of the single row where `id_field` equals `id_value`.
    fn get_property<P: FromSql>(
        &self,
        property: Field<T>,
        id_field: Field<T>,
        id_value: impl Into<Value>,
    ) -> PersistResult<Option<P>>;
    /// Reads several properties of the single row where `id_field` equals `id_value`.
    fn get_properties(
        &self,
        properties: &[Field<T>],
        id_field: Field<T>,
        id_value: impl Into<Value>,
    ) -> PersistResult<Vec<Value>>;
    /// First match under the given ordering.
    fn find_first(
        &self,
        criteria: &Criteria<T>,
        sorts: Option<&SortList<T>>,
    ) -> PersistResult<Option<T>>;
    /// Matches with optional ordering and paging, plus the unpaged total.
    fn find(
        &self,
        criteria: &Criteria<T>,
        sorts: Option<&SortList<T>>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>>;
    /// Every entity, with optional ordering and paging.
    fn find_all(
        &self,
        sorts: Option<&SortList<T>>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>>;
    /// Entities whose `field` equals `value`.
    fn find_by_property(
        &self,
        field: Field<T>,
        value: impl Into<Value>,
        sorts: Option<&SortList<T>>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>>;
    fn count(&self, criteria: &Criteria<T>) -> PersistResult<u64>;
    fn exists(&self, criteria: &Criteria<T>) -> PersistResult<bool>;
    /// Inserts `entity`; a generated identifier is written back.
    fn save(&self, entity: &mut T) -> PersistResult<()>;
    /// Inserts without identifier, updates otherwise. Stateful only.
    fn save_or_update(&self, entity: &mut T) -> PersistResult<()>;
    /// Inserts, then detaches from the identity map. Stateful only.
    fn save_and_evict(&self, entity: &mut T) -> PersistResult<()>;
    /// Detaches from the identity map, dropping queued writes. Stateful only.
    fn evict(&self, entity: &T) -> PersistResult<()>;
    fn update(&self, entity: &T) -> PersistResult<()>;
    /// Copies detached state onto the persistent row. Stateful only.
    fn merge(&self, entity: &mut T) -> PersistResult<()>;
    fn delete(&self, entity: &T) -> PersistResult<()>;
    /// Loads then deletes; fails with `NotFound` for unknown identifiers.
    fn delete_by_id(&self, id: T::Id) -> PersistResult<()>;
    /// Deletes every match one by one and returns how many were deleted.
    fn delete_matching(&self, criteria: &Criteria<T>) -> PersistResult<u64>;
}

/// Repository bound to one manager and one unit of work.
pub struct Repository<'a, T, S: PersistenceSession = Session> {
    manager: &'a Manager<S>,
    ctx: WorkContext<'a>,
    _entity: PhantomData<fn() -> T>,
}

/// Repository over stateless sessions.
pub type StatelessRepository<'a, T> = Repository<'a, T, StatelessSession>;

impl<'a, T: Entity, S: PersistenceSession> Repository<'a, T, S> {
    /// Binds the repository and opens the unit's session.
    ///
    /// # Errors
    /// - `UnmappedEntity` when `T` is not part of the manager's catalog.
    /// - `Session` when no session can be opened.
    pub fn new(manager: &'a Manager<S>, ctx: WorkContext<'a>) -> PersistResult<Self> {
        if !manager.factory().is_mapped(T::TABLE) {
            return Err(PersistError::UnmappedEntity(T::TABLE));
        }
        manager.get_session(&ctx)?;
        Ok(Self {
            manager,
            ctx,
            _entity: PhantomData,
        })
    }

    pub fn context(&self) -> WorkContext<'a> {
        self.ctx
    }

    fn read<R>(&self, op: impl FnOnce(&mut S) -> PersistResult<R>) -> PersistResult<R> {
        let shared = self.manager.get_session(&self.ctx)?;
        let mut session = lock_session(&shared);
        op(&mut session)
    }

    fn write<R>(
        &self,
        name: &'static str,
        op: impl FnOnce(&mut S) -> PersistResult<R>,
    ) -> PersistResult<R> {
        let shared = self
            .manager
            .current_session(&self.ctx)
            .ok_or(PersistError::SessionClosed)?;
        let open = lock_session(&shared).is_open();
        if !open {
            return Err(PersistError::SessionClosed);
        }

        let owns_transaction = !self.manager.has_open_transaction(&self.ctx);
        if owns_transaction {
            self.manager.begin_transaction(&self.ctx)?;
        }
        let engine_active = lock_session(&shared).in_transaction();
        if !engine_active || !self.manager.has_open_transaction(&self.ctx) {
            warn!(
                "event=repo_write module=repo status=error op={} entity={} reason=no_transaction",
                name,
                T::TABLE
            );
            return Err(PersistError::NoTransaction);
        }

        let outcome = {
            let mut session = lock_session(&shared);
            op(&mut session)
        };

        match outcome {
            Ok(value) => {
                if owns_transaction {
                    self.manager.commit_transaction(&self.ctx)?;
                }
                debug!(
                    "event=repo_write module=repo status=ok op={} entity={} owned_transaction={}",
                    name,
                    T::TABLE,
                    owns_transaction
                );
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event=repo_write module=repo status=error op={} entity={} error={}",
                    name,
                    T::TABLE,
                    err
                );
                if let Err(rollback_err) = self.manager.rollback_transaction(&self.ctx) {
                    warn!(
                        "event=transaction_rollback module=repo status=error entity={} error={}",
                        T::TABLE,
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    fn require_stateful(op: &'static str) -> PersistResult<()> {
        if S::STATEFUL {
            Ok(())
        } else {
            Err(PersistError::UnsupportedOperation(op))
        }
    }

    fn project(
        &self,
        columns: &[Field<T>],
        id_field: Field<T>,
        id_value: Value,
    ) -> PersistResult<Option<Vec<Value>>> {
        let select_list = columns
            .iter()
            .map(|field| quote_ident(field.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select_list} FROM {} WHERE {} = ?1 LIMIT 2",
            quote_ident(T::TABLE),
            quote_ident(id_field.name())
        );

        let mut rows = self.read(|session| session.query_values(&sql, &[id_value.clone()]))?;
        if rows.len() > 1 {
            let count = self.count(&Criteria::new().eq(id_field, id_value))?;
            return Err(PersistError::NonUniqueResult {
                entity: T::TABLE,
                count,
            });
        }
        Ok(rows.pop())
    }

    fn page(
        &self,
        mut query: Criteria<T>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>> {
        let counting = query.count_clone();
        if let (Some(index), Some(size)) = (page_index, page_size) {
            query.set_first_result(u64::from(index) * u64::from(size));
            query.set_max_results(u64::from(size));
        }

        self.read(|session| {
            let total_count = session.count(&counting)?;
            let items = session.list(&query)?;
            Ok(Page { items, total_count })
        })
    }
}

fn sorted<T: Entity>(criteria: &Criteria<T>, sorts: Option<&SortList<T>>) -> Criteria<T> {
    let mut query = criteria.clone();
    if let Some(sorts) = sorts {
        sorts.apply_to(&mut query);
    }
    query
}

fn convert<P: FromSql>(entity: &'static str, value: &Value) -> PersistResult<P> {
    P::column_result(ValueRef::from(value)).map_err(|err| {
        PersistError::InvalidData(format!("`{entity}` property cannot be converted: {err}"))
    })
}

impl<'a, T: Entity, S: PersistenceSession> EntityRepository<T> for Repository<'a, T, S> {
    fn get(&self, id: T::Id) -> PersistResult<Option<T>> {
        self.read(|session| session.get::<T>(&id))
    }

    fn get_by_property(&self, field: Field<T>, value: impl Into<Value>) -> PersistResult<Option<T>> {
        let mut query = Criteria::new().eq(field, value);
        query.set_max_results(2);

        let mut matches = self.read(|session| session.list(&query))?;
        if matches.len() > 1 {
            let count = self.count(&query)?;
            return Err(PersistError::NonUniqueResult {
                entity: T::TABLE,
                count,
            });
        }
        Ok(matches.pop())
    }

    fn get_property<P: FromSql>(
        &self,
        property: Field<T>,
        id_field: Field<T>,
        id_value: impl Into<Value>,
    ) -> PersistResult<Option<P>> {
        match self.project(&[property], id_field, id_value.into())? {
            Some(row) => match row.first() {
                Some(value) => convert(T::TABLE, value).map(Some),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn get_properties(
        &self,
        properties: &[Field<T>],
        id_field: Field<T>,
        id_value: impl Into<Value>,
    ) -> PersistResult<Vec<Value>> {
        if properties.is_empty() {
            return Err(PersistError::InvalidData(format!(
                "`{}` property projection needs at least one field",
                T::TABLE
            )));
        }
        Ok(self
            .project(properties, id_field, id_value.into())?
            .unwrap_or_default())
    }

    fn find_first(
        &self,
        criteria: &Criteria<T>,
        sorts: Option<&SortList<T>>,
    ) -> PersistResult<Option<T>> {
        let mut query = sorted(criteria, sorts);
        query.set_first_result(0);
        query.set_max_results(1);
        Ok(self.read(|session| session.list(&query))?.into_iter().next())
    }

    fn find(
        &self,
        criteria: &Criteria<T>,
        sorts: Option<&SortList<T>>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>> {
        self.page(sorted(criteria, sorts), page_index, page_size)
    }

    fn find_all(
        &self,
        sorts: Option<&SortList<T>>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>> {
        self.find(&Criteria::new(), sorts, page_index, page_size)
    }

    fn find_by_property(
        &self,
        field: Field<T>,
        value: impl Into<Value>,
        sorts: Option<&SortList<T>>,
        page_index: Option<u32>,
        page_size: Option<u32>,
    ) -> PersistResult<Page<T>> {
        self.find(
            &Criteria::new().eq(field, value),
            sorts,
            page_index,
            page_size,
        )
    }

    fn count(&self, criteria: &Criteria<T>) -> PersistResult<u64> {
        let counting = criteria.count_clone();
        self.read(|session| session.count(&counting))
    }

    fn exists(&self, criteria: &Criteria<T>) -> PersistResult<bool> {
        Ok(self.count(criteria)? > 0)
    }

    fn save(&self, entity: &mut T) -> PersistResult<()> {
        self.write("save", |session| session.insert(entity))
    }

    fn save_or_update(&self, entity: &mut T) -> PersistResult<()> {
        Self::require_stateful("save_or_update")?;
        self.write("save_or_update", |session| session.save_or_update(entity))
    }

    fn save_and_evict(&self, entity: &mut T) -> PersistResult<()> {
        Self::require_stateful("save_and_evict")?;
        self.write("save_and_evict", |session| {
            session.insert(&mut *entity)?;
            session.evict(&*entity)
        })
    }

    fn evict(&self, entity: &T) -> PersistResult<()> {
        Self::require_stateful("evict")?;
        self.write("evict", |session| session.evict(entity))
    }

    fn update(&self, entity: &T) -> PersistResult<()> {
        self.write("update", |session| session.update(entity))
    }

    fn merge(&self, entity: &mut T) -> PersistResult<()> {
        Self::require_stateful("merge")?;
        self.write("merge", |session| session.merge(entity))
    }

    fn delete(&self, entity: &T) -> PersistResult<()> {
        self.write("delete", |session| session.delete(entity))
    }

    fn delete_by_id(&self, id: T::Id) -> PersistResult<()> {
        let Some(entity) = self.get(id.clone())? else {
            let shown = sql_value(&id)
                .map(|value| display_value(&value))
                .unwrap_or_else(|_| format!("{id:?}"));
            return Err(PersistError::NotFound {
                entity: T::TABLE,
                id: shown,
            });
        };
        self.delete(&entity)
    }

    fn delete_matching(&self, criteria: &Criteria<T>) -> PersistResult<u64> {
        let matches = self.find(criteria, None, None, None)?;
        for entity in &matches.items {
            self.delete(entity)?;
        }
        Ok(matches.items.len() as u64)
    }
}

impl<T, S: PersistenceSession> Debug for Repository<'_, T, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("kind", &S::KIND)
            .field("context", &self.ctx)
            .finish()
    }
}
