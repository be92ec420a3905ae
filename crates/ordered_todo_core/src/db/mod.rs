//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure the SQLite connection behind the list store.
//! - Apply named schema migrations in registration order.
//!
//! # Invariants
//! - Applied migrations are tracked by name in `migration_history`.
//! - Nothing reads or writes list data before migrations succeed; the
//!   `ListDatabase -> ListStore` type-state makes that unrepresentable.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
pub(crate) use open::open_db_with_timeout;

/// Expands to the list table name as a literal, for `concat!`-built SQL.
macro_rules! list_table {
    () => {
        "list_model"
    };
}
pub(crate) use list_table;

/// Table holding every `ListRecord`.
pub const LIST_TABLE: &str = list_table!();

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Database path is empty, relative, or its parent directory is missing.
    InvalidPath {
        path: PathBuf,
        reason: &'static str,
    },
    /// Registry misuse: empty or duplicate migration name.
    InvalidMigration(String),
    /// A registered step failed; its transaction was rolled back.
    Migration {
        name: String,
        source: rusqlite::Error,
    },
    /// History names a step this binary does not know about.
    UnknownAppliedMigration(String),
    /// A custom migration sequence does not begin with the shipped steps.
    MissingShippedMigrations {
        expected: Vec<&'static str>,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidPath { path, reason } => {
                write!(f, "invalid database path `{}`: {reason}", path.display())
            }
            Self::InvalidMigration(message) => write!(f, "invalid migration: {message}"),
            Self::Migration { name, source } => {
                write!(f, "migration `{name}` failed: {source}")
            }
            Self::UnknownAppliedMigration(name) => write!(
                f,
                "database has applied migration `{name}` which this build does not know"
            ),
            Self::MissingShippedMigrations { expected } => write!(
                f,
                "migration sequence must start with the shipped steps [{}]",
                expected.join(", ")
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Migration { source, .. } => Some(source),
            Self::InvalidPath { .. }
            | Self::InvalidMigration(_)
            | Self::UnknownAppliedMigration(_)
            | Self::MissingShippedMigrations { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
