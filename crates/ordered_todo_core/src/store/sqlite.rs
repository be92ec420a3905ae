//! SQLite side of the list store: opened database and migrated backend.

use super::{ListStore, SqliteListStore};
use crate::config::StoreConfig;
use crate::db::migrations::{build_migrations, Migrator};
use crate::db::{open_db, open_db_in_memory, open_db_with_timeout, DbError, DbResult};
use crate::model::list::ListRecord;
use crate::repo::list_repo::{ListRepository, RepoError, RepoResult, SqliteListRepository};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Opened but not yet migrated database.
///
/// The only way forward is `migrate_to_latest`, which yields the ready store.
pub struct ListDatabase {
    conn: Connection,
    path: Option<PathBuf>,
}

impl ListDatabase {
    /// Opens (creating if absent) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        Ok(Self {
            conn: open_db(path)?,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens `<documents_dir>/ordered-todo-database.sqlite` per `config`.
    pub fn open_with(config: &StoreConfig) -> DbResult<Self> {
        let path = config.database_path()?;
        Ok(Self {
            conn: open_db_with_timeout(&path, config.busy_timeout)?,
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
            path: None,
        })
    }

    /// File backing this database; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Applies every pending shipped migration and returns the ready store.
    ///
    /// Safe to call on every launch; an up-to-date file is left untouched.
    pub fn migrate_to_latest(self) -> DbResult<SqliteListStore> {
        self.migrate_with(&build_migrations())
    }

    /// Like `migrate_to_latest` with a caller-assembled migration sequence.
    ///
    /// `migrator` must begin with every shipped step, in shipped order; extra
    /// steps may follow. Anything else is rejected before the database is
    /// touched, so a store is never built over an incomplete schema.
    pub fn migrate_with(mut self, migrator: &Migrator) -> DbResult<SqliteListStore> {
        let shipped = build_migrations().names();
        if !migrator.names().starts_with(&shipped) {
            return Err(DbError::MissingShippedMigrations { expected: shipped });
        }

        migrator.migrate(&mut self.conn)?;
        Ok(ListStore::with_repository(Arc::new(SqliteListBackend {
            conn: Mutex::new(self.conn),
        })))
    }
}

/// Migrated SQLite connection shared by one store.
///
/// The mutex serializes transactions, so ids read after an insert always
/// belong to that insert.
pub struct SqliteListBackend {
    conn: Mutex<Connection>,
}

impl SqliteListBackend {
    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RepoError::Unavailable("connection lock poisoned".to_string()))
    }
}

impl ListRepository for SqliteListBackend {
    fn insert_list(&self, record: &ListRecord) -> RepoResult<ListRecord> {
        let conn = self.conn()?;
        SqliteListRepository::new(&conn).insert_list(record)
    }

    fn list_all(&self) -> RepoResult<Vec<ListRecord>> {
        let conn = self.conn()?;
        SqliteListRepository::new(&conn).list_all()
    }

    fn count_lists(&self) -> RepoResult<u64> {
        let conn = self.conn()?;
        SqliteListRepository::new(&conn).count_lists()
    }
}
