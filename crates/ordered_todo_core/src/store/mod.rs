//! List record store.
//!
//! # Responsibility
//! - Own the list repository and publish a change after each committed write.
//! - Serve one-shot reads and live `observe_all` snapshots.
//!
//! # Invariants
//! - The SQLite store is only built by `ListDatabase` after every shipped
//!   migration is applied, so reads and writes never run against an
//!   unmigrated schema.
//! - Snapshots are owned copies of storage state.
//!
//! # See also
//! - `observe` for the change hub and live query machinery.

use crate::db::LIST_TABLE;
use crate::model::list::ListRecord;
use crate::observe::query::observe_query;
use crate::observe::{ChangeHub, ObservationEvent, Subscription, TableChange};
use crate::repo::list_repo::{ListRepository, RepoError, RepoResult};
use crate::repo::memory_repo::MemoryListRepository;
use log::{error, info};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Instant;

mod sqlite;

pub use sqlite::{ListDatabase, SqliteListBackend};

/// Event delivered by `ListStore::observe_all`.
pub type ListEvent = ObservationEvent<Vec<ListRecord>, RepoError>;

pub type SqliteListStore = ListStore<SqliteListBackend>;
pub type MemoryListStore = ListStore<MemoryListRepository>;

/// Ready-to-use list store over any `ListRepository`.
///
/// Share it across threads with `Arc`; every method takes `&self`.
pub struct ListStore<R> {
    repo: Arc<R>,
    hub: ChangeHub,
}

impl<R> ListStore<R>
where
    R: ListRepository + Send + Sync + 'static,
{
    /// Wraps an already prepared repository, e.g. `MemoryListRepository`.
    pub fn with_repository(repo: Arc<R>) -> Self {
        Self {
            repo,
            hub: ChangeHub::new(),
        }
    }

    /// Stores an unsaved list and returns it with its assigned id.
    ///
    /// Observers of `list_model` are refreshed on this thread after commit.
    ///
    /// # Errors
    /// - `RepoError::AlreadyPersisted` when `record.id` is set.
    /// - `RepoError::Db` on constraint violations or SQLite failures.
    /// - `RepoError::Unavailable` when the storage handle cannot be used.
    pub fn insert(&self, record: ListRecord) -> RepoResult<ListRecord> {
        let started_at = Instant::now();
        match self.repo.insert_list(&record) {
            Ok(saved) => {
                info!(
                    "event=list_insert module=store status=ok id={} is_dated={} duration_ms={}",
                    saved.id.unwrap_or_default(),
                    saved.is_dated,
                    started_at.elapsed().as_millis()
                );
                self.hub.publish(&TableChange::new(LIST_TABLE));
                Ok(saved)
            }
            Err(err) => {
                error!(
                    "event=list_insert module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Returns every list in insertion order.
    pub fn fetch_all(&self) -> RepoResult<Vec<ListRecord>> {
        self.repo.list_all()
    }

    pub fn count(&self) -> RepoResult<u64> {
        self.repo.count_lists()
    }

    /// Observes the read-all query.
    ///
    /// `on_event` receives an initial snapshot, then a full snapshot after
    /// every committed write to `list_model`. The initial snapshot normally
    /// arrives before this returns; a write racing on another thread may
    /// deliver it from that thread instead. A failed fetch delivers one
    /// `ObservationEvent::Failed` and ends the stream. Drop or cancel the
    /// returned subscription to stop observing.
    pub fn observe_all<F>(&self, on_event: F) -> Subscription
    where
        F: Fn(ListEvent) + Send + Sync + 'static,
    {
        info!("event=list_observe module=store status=start table={LIST_TABLE}");
        let repo = Arc::clone(&self.repo);
        observe_query(&self.hub, LIST_TABLE, move || repo.list_all(), on_event)
    }

    /// Channel flavour of `observe_all` for hosts that pull events.
    ///
    /// Without concurrent writers the initial snapshot is already queued
    /// when this returns.
    pub fn observe_all_channel(&self) -> (Subscription, Receiver<ListEvent>) {
        let (sender, receiver) = mpsc::channel();
        let subscription = self.observe_all(move |event| {
            // Receiver gone means the host stopped listening.
            let _ = sender.send(event);
        });
        (subscription, receiver)
    }

    /// Hub carrying this store's change notifications.
    pub fn change_hub(&self) -> &ChangeHub {
        &self.hub
    }
}

impl MemoryListStore {
    /// Store over a fresh in-memory fake, returned with a handle to the fake.
    pub fn in_memory() -> (Self, Arc<MemoryListRepository>) {
        let repo = Arc::new(MemoryListRepository::new());
        (Self::with_repository(Arc::clone(&repo)), repo)
    }
}
