//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the list store.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Opening never migrates; callers go through `ListDatabase::migrate`.

use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if absent) a SQLite database file.
///
/// The parent directory must already exist; the host owns directory
/// resolution and creation.
///
/// # Errors
/// - `DbError::InvalidPath` when `path` is empty or its parent is missing.
/// - `DbError::Sqlite` when SQLite cannot open or configure the file.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_timeout(path.as_ref(), DEFAULT_BUSY_TIMEOUT)
}

pub(crate) fn open_db_with_timeout(path: &Path, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    if let Err(err) = check_parent_dir(path) {
        error!(
            "event=db_open module=db status=error mode=file duration_ms={} error_code=db_path_invalid error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err);
    }

    let result = Connection::open(path)
        .map_err(DbError::from)
        .and_then(|conn| configure(conn, busy_timeout));
    log_open_outcome("file", started_at, &result);
    result
}

/// Opens a private in-memory SQLite database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let result = Connection::open_in_memory()
        .map_err(DbError::from)
        .and_then(|conn| configure(conn, DEFAULT_BUSY_TIMEOUT));
    log_open_outcome("memory", started_at, &result);
    result
}

fn configure(conn: Connection, busy_timeout: Duration) -> DbResult<Connection> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

fn check_parent_dir(path: &Path) -> DbResult<()> {
    if path.as_os_str().is_empty() {
        return Err(DbError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is empty",
        });
    }

    // A bare file name resolves against the working directory.
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };
    if !parent.is_dir() {
        return Err(DbError::InvalidPath {
            path: path.to_path_buf(),
            reason: "parent directory does not exist",
        });
    }
    Ok(())
}

fn log_open_outcome(mode: &str, started_at: Instant, result: &DbResult<Connection>) {
    match result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}
