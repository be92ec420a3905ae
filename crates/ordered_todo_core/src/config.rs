//! Store configuration.
//!
//! The host resolves its per-user documents directory and hands it in;
//! the core only decides the file name and connection tuning.

use crate::db::{DbError, DbResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed database file name inside the documents directory.
pub const DATABASE_FILE_NAME: &str = "ordered-todo-database.sqlite";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub documents_dir: PathBuf,
    pub file_name: String,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            file_name: DATABASE_FILE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Returns `<documents_dir>/<file_name>`.
    ///
    /// # Errors
    /// - `DbError::InvalidPath` when the directory is empty or relative, or
    ///   the file name is empty or contains a path separator.
    pub fn database_path(&self) -> DbResult<PathBuf> {
        let dir = self.documents_dir.as_path();
        if dir.as_os_str().is_empty() {
            return Err(invalid(dir, "documents directory cannot be empty"));
        }
        if !dir.is_absolute() {
            return Err(invalid(dir, "documents directory must be absolute"));
        }

        let file_name = self.file_name.trim();
        if file_name.is_empty() {
            return Err(invalid(dir, "database file name cannot be empty"));
        }
        if file_name.contains(['/', '\\']) {
            return Err(invalid(
                dir,
                "database file name cannot contain path separators",
            ));
        }

        Ok(dir.join(file_name))
    }
}

fn invalid(path: &Path, reason: &'static str) -> DbError {
    DbError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    }
}
