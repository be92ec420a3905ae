//! In-memory list repository.
//!
//! Satisfies the same `ListRepository` contract as SQLite storage so the
//! store and its observations can be exercised without a database file.

use crate::model::list::{ListId, ListRecord};
use crate::repo::list_repo::{ListRepository, RepoError, RepoResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    rows: Vec<ListRecord>,
    last_id: ListId,
}

/// Vec-backed list storage with a switch to simulate an unusable handle.
#[derive(Default)]
pub struct MemoryListRepository {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryListRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `RepoError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn state(&self) -> RepoResult<MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable(
                "in-memory repository switched off".to_string(),
            ));
        }
        self.state
            .lock()
            .map_err(|_| RepoError::Unavailable("in-memory state lock poisoned".to_string()))
    }
}

impl ListRepository for MemoryListRepository {
    fn insert_list(&self, record: &ListRecord) -> RepoResult<ListRecord> {
        if let Some(id) = record.id {
            return Err(RepoError::AlreadyPersisted(id));
        }

        let mut state = self.state()?;
        state.last_id += 1;
        let saved = record.with_id(state.last_id);
        state.rows.push(saved.clone());
        Ok(saved)
    }

    fn list_all(&self) -> RepoResult<Vec<ListRecord>> {
        Ok(self.state()?.rows.clone())
    }

    fn count_lists(&self) -> RepoResult<u64> {
        Ok(self.state()?.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryListRepository;
    use crate::model::list::ListRecord;
    use crate::repo::list_repo::{ListRepository, RepoError};

    #[test]
    fn assigns_increasing_ids_in_insertion_order() {
        let repo = MemoryListRepository::new();
        let first = repo.insert_list(&ListRecord::undated("a")).unwrap();
        let second = repo.insert_list(&ListRecord::undated("b")).unwrap();

        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert_eq!(repo.list_all().unwrap(), vec![first, second]);
    }

    #[test]
    fn unavailable_switch_fails_reads_and_writes() {
        let repo = MemoryListRepository::new();
        repo.set_unavailable(true);

        assert!(matches!(
            repo.insert_list(&ListRecord::undated("a")),
            Err(RepoError::Unavailable(_))
        ));
        assert!(matches!(repo.list_all(), Err(RepoError::Unavailable(_))));

        repo.set_unavailable(false);
        assert_eq!(repo.count_lists().unwrap(), 0);
    }
}
