//! Connection bootstrap for session data sources.

use super::DataSource;
use log::{debug, error};
use rusqlite::{Connection, OpenFlags};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens and configures one connection to `source`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(source: &DataSource) -> rusqlite::Result<Connection> {
    let started_at = Instant::now();
    let mode = source.mode();

    let opened = match source {
        DataSource::File(path) => Connection::open(path),
        DataSource::Memory(name) => Connection::open_with_flags(
            format!("file:{name}?mode=memory&cache=shared"),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        ),
    };

    let conn = opened
        .and_then(|conn| bootstrap_connection(&conn).map(|()| conn))
        .map_err(|err| {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            err
        })?;

    debug!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
