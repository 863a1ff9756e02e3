//! Session factory over one data source and mapping catalog.
//!
//! # Responsibility
//! - Validate the configured catalog against the database once, at build.
//! - Open bootstrapped connections for stateful and stateless sessions.
//!
//! # Invariants
//! - Every mapped table and column exists once `build` returns.
//! - A closed factory opens no further sessions.

use crate::config::{Config, ConfigError};
use crate::db::{open_connection, DataSource};
use crate::error::{PersistError, PersistResult};
use crate::mapping::MappingCatalog;
use crate::session::{Interceptor, PersistenceSession, Session, StatelessSession};
use log::{error, info};
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Process-wide source of sessions.
///
/// Built once from configuration: the catalog named by the configuration is
/// selected, its schema script applied and every mapping checked against the
/// live tables. A shared in-memory database is kept alive by an anchor
/// connection for as long as the factory is open.
pub struct SessionFactory {
    config: Config,
    data_source: DataSource,
    catalog: MappingCatalog,
    anchor: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

impl SessionFactory {
    /// Builds the factory for the catalog named by `config`.
    ///
    /// # Errors
    /// - `Configuration(UnknownCatalog)` when no catalog carries that name.
    /// - `Configuration(InvalidMapping)` when a mapping does not match the schema.
    /// - `Engine` when the database cannot be opened or the schema script fails.
    pub fn build(
        config: Config,
        data_source: DataSource,
        catalogs: impl IntoIterator<Item = MappingCatalog>,
    ) -> PersistResult<Self> {
        let started_at = Instant::now();
        let catalog_name = config.fluent_mapping_assembly_name.clone();

        match Self::assemble(config, data_source, catalogs) {
            Ok(factory) => {
                info!(
                    "event=factory_build module=session status=ok catalog={} mode={} entities={} duration_ms={}",
                    catalog_name,
                    factory.data_source.mode(),
                    factory.catalog.entities().len(),
                    started_at.elapsed().as_millis()
                );
                Ok(factory)
            }
            Err(err) => {
                error!(
                    "event=factory_build module=session status=error catalog={} duration_ms={} error={}",
                    catalog_name,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn assemble(
        config: Config,
        data_source: DataSource,
        catalogs: impl IntoIterator<Item = MappingCatalog>,
    ) -> PersistResult<Self> {
        let catalog = catalogs
            .into_iter()
            .find(|catalog| catalog.name() == config.fluent_mapping_assembly_name)
            .ok_or_else(|| ConfigError::UnknownCatalog(config.fluent_mapping_assembly_name.clone()))?;
        catalog.validate_identifiers()?;

        let mut conn = open_connection(&data_source)?;
        if let Some(schema) = catalog.schema_sql() {
            let tx = conn.transaction()?;
            tx.execute_batch(schema)?;
            tx.commit()?;
        }
        catalog.verify_schema(&conn)?;

        let anchor = data_source.is_memory().then_some(conn);
        Ok(Self {
            config,
            data_source,
            catalog,
            anchor: Mutex::new(anchor),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    pub fn catalog(&self) -> &MappingCatalog {
        &self.catalog
    }

    pub fn is_mapped(&self, table: &str) -> bool {
        self.catalog.contains(table)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Opens a change-tracking session, optionally observed by `interceptor`.
    pub fn open_session(&self, interceptor: Option<Box<dyn Interceptor>>) -> PersistResult<Session> {
        Session::open(self, interceptor)
    }

    pub fn open_stateless_session(&self) -> PersistResult<StatelessSession> {
        StatelessSession::open(self, None)
    }

    /// Opens a fresh connection for one session.
    pub(crate) fn open_connection(&self) -> PersistResult<Connection> {
        if self.is_closed() {
            return Err(PersistError::Session("session factory is closed".to_string()));
        }
        open_connection(&self.data_source)
            .map_err(|err| PersistError::Session(format!("failed to open connection: {err}")))
    }

    /// Stops handing out sessions. Sessions already open keep working.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let anchor = self
            .anchor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(anchor);
        info!(
            "event=factory_close module=session status=ok catalog={}",
            self.catalog.name()
        );
    }
}

impl Debug for SessionFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("catalog", &self.catalog.name())
            .field("data_source", &self.data_source)
            .field("closed", &self.is_closed())
            .finish()
    }
}
