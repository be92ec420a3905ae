use ordered_todo_core::{
    ListDatabase, ListRecord, ListRepository, ListStore, MemoryListStore, RepoError,
    SqliteListRepository, SqliteListStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn sqlite_store() -> SqliteListStore {
    ListDatabase::open_in_memory()
        .unwrap()
        .migrate_to_latest()
        .unwrap()
}

#[test]
fn insert_and_fetch_roundtrip() {
    let store = sqlite_store();

    let saved = store.insert(ListRecord::new("Groceries", true)).unwrap();
    let id = saved.id.unwrap();
    assert!(id > 0);

    let all = store.fetch_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, Some(id));
    assert_eq!(all[0].name, "Groceries");
    assert!(all[0].is_dated);
}

#[test]
fn fetch_all_returns_insertion_order() {
    let store = sqlite_store();
    for name in ["A", "B", "C"] {
        store.insert(ListRecord::undated(name)).unwrap();
    }

    let names = store
        .fetch_all()
        .unwrap()
        .into_iter()
        .map(|list| list.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn insert_rejects_already_persisted_record() {
    let store = sqlite_store();
    let saved = store.insert(ListRecord::undated("Chores")).unwrap();

    let err = store.insert(saved.clone()).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyPersisted(id) if Some(id) == saved.id));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn snapshots_are_detached_copies() {
    let store = sqlite_store();
    store.insert(ListRecord::undated("Original")).unwrap();

    let mut snapshot = store.fetch_all().unwrap();
    snapshot[0].name = "Changed locally".to_string();
    snapshot.clear();

    assert_eq!(store.fetch_all().unwrap()[0].name, "Original");
}

#[test]
fn concurrent_inserts_get_unique_ids() {
    let store = Arc::new(sqlite_store());

    let handles = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..25)
                    .map(|n| {
                        store
                            .insert(ListRecord::new(format!("w{worker}-{n}"), n % 2 == 0))
                            .unwrap()
                            .id
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(ids.len(), 200);
    assert_eq!(store.count().unwrap(), 200);
}

#[test]
fn borrowed_repository_works_on_migrated_connection() {
    let mut conn = ordered_todo_core::db::open_db_in_memory().unwrap();
    ordered_todo_core::db::migrations::apply_migrations(&mut conn).unwrap();
    let repo = SqliteListRepository::new(&conn);

    let saved = repo.insert_list(&ListRecord::new("Reading", false)).unwrap();
    assert_eq!(repo.list_all().unwrap(), vec![saved]);
}

#[test]
fn invalid_persisted_flag_is_reported() {
    let mut conn = ordered_todo_core::db::open_db_in_memory().unwrap();
    ordered_todo_core::db::migrations::apply_migrations(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO list_model (name, is_dated) VALUES ('Odd', 7);",
        [],
    )
    .unwrap();

    let err = SqliteListRepository::new(&conn).list_all().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)), "{err}");
}

#[test]
fn memory_store_follows_the_same_contract() {
    let (store, repo) = MemoryListStore::in_memory();

    let saved = store.insert(ListRecord::new("Groceries", true)).unwrap();
    assert_eq!(saved.id, Some(1));
    assert_eq!(store.fetch_all().unwrap(), vec![saved]);

    repo.set_unavailable(true);
    let err = store.insert(ListRecord::undated("Later")).unwrap_err();
    assert!(matches!(err, RepoError::Unavailable(_)));
}

#[test]
fn store_wraps_any_repository() {
    let repo = Arc::new(ordered_todo_core::MemoryListRepository::new());
    let store = ListStore::with_repository(Arc::clone(&repo));

    store.insert(ListRecord::undated("Direct")).unwrap();
    assert_eq!(repo.count_lists().unwrap(), 1);
}
