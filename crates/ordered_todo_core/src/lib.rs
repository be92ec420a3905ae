//! Core persistence for OrderedTODO.
//! This crate owns the list schema, its migrations and the live list store.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod observe;
pub mod repo;
pub mod store;

pub use config::{StoreConfig, DATABASE_FILE_NAME};
pub use db::{DbError, DbResult, LIST_TABLE};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::list::{ListId, ListRecord};
pub use observe::{ChangeHub, ObservationEvent, Subscription, TableChange};
pub use repo::list_repo::{ListRepository, RepoError, RepoResult, SqliteListRepository};
pub use repo::memory_repo::MemoryListRepository;
pub use store::{
    ListDatabase, ListEvent, ListStore, MemoryListStore, SqliteListBackend, SqliteListStore,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
