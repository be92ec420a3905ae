//! List repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the insert/read-all API over `list_model` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Inserts only accept unsaved records and run in one transaction.
//! - Reads return lists in insertion order (`id` ascending).
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::{list_table, DbError};
use crate::model::list::{ListId, ListRecord};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const LIST_SELECT_SQL: &str = concat!(
    "SELECT id, name, is_dated FROM ",
    list_table!(),
    " ORDER BY id ASC;"
);
const LIST_INSERT_SQL: &str = concat!(
    "INSERT INTO ",
    list_table!(),
    " (name, is_dated) VALUES (?1, ?2);"
);
const LIST_COUNT_SQL: &str = concat!("SELECT COUNT(*) FROM ", list_table!(), ";");

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for list persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Insert was given a record that already carries an id.
    AlreadyPersisted(ListId),
    /// The storage handle cannot be used (poisoned lock, closed fake, ...).
    Unavailable(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::AlreadyPersisted(id) => write!(f, "list {id} is already persisted"),
            Self::Unavailable(message) => write!(f, "list storage unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted list data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::AlreadyPersisted(_) | Self::Unavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract shared by the SQLite store and the in-memory fake.
pub trait ListRepository {
    /// Stores an unsaved list and returns it with the assigned id.
    fn insert_list(&self, record: &ListRecord) -> RepoResult<ListRecord>;
    /// Returns every list in insertion order.
    fn list_all(&self) -> RepoResult<Vec<ListRecord>>;
    fn count_lists(&self) -> RepoResult<u64>;
}

/// SQLite-backed list repository over a borrowed, migrated connection.
pub struct SqliteListRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteListRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ListRepository for SqliteListRepository<'_> {
    fn insert_list(&self, record: &ListRecord) -> RepoResult<ListRecord> {
        if let Some(id) = record.id {
            return Err(RepoError::AlreadyPersisted(id));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            LIST_INSERT_SQL,
            params![record.name.as_str(), record.is_dated],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(record.with_id(id))
    }

    fn list_all(&self) -> RepoResult<Vec<ListRecord>> {
        let mut stmt = self.conn.prepare(LIST_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        let mut lists = Vec::new();

        while let Some(row) = rows.next()? {
            lists.push(parse_list_row(row)?);
        }

        Ok(lists)
    }

    fn count_lists(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(LIST_COUNT_SQL, [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<ListRecord> {
    let id: ListId = row.get("id")?;
    if id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{id}` in list_model.id"
        )));
    }

    let is_dated = match row.get::<_, i64>("is_dated")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_dated value `{other}` in list_model.is_dated"
            )));
        }
    };

    Ok(ListRecord {
        id: Some(id),
        name: row.get("name")?,
        is_dated,
    })
}
