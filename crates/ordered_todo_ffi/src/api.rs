//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose list store operations to Dart via FRB.
//! - Turn core results into simple envelopes the UI can render.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - One store per process, bound to the first documents directory that
//!   migrates successfully. Dart cannot own the Rust store value, so this
//!   module holds it on the host's behalf.
//! - Live observers are held here by id; each owns its core `Subscription`
//!   until it is cancelled or its stream ends.

use log::{info, warn};
use ordered_todo_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ListDatabase, ListEvent, ListRecord, ObservationEvent, SqliteListStore, StoreConfig,
    Subscription,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

struct BoundStore {
    documents_dir: PathBuf,
    store: SqliteListStore,
}

struct ListObserver {
    _subscription: Subscription,
    events: Arc<Mutex<Receiver<ListEvent>>>,
}

static LIST_STORE: OnceLock<BoundStore> = OnceLock::new();
static LIST_OBSERVERS: OnceLock<Mutex<HashMap<u64, ListObserver>>> = OnceLock::new();
static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and an error message otherwise.
/// Repeating the same `level + log_dir` is accepted.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One list row for the list screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub id: i64,
    pub name: String,
    pub is_dated: bool,
    /// Ready-made row text, `name (id)`.
    pub label: String,
}

/// Result envelope for list store actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListActionResponse {
    pub ok: bool,
    /// Id of the created list, for `lists_create`.
    pub list_id: Option<i64>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ListActionResponse {
    fn success(message: impl Into<String>, list_id: Option<i64>) -> Self {
        Self {
            ok: true,
            list_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            list_id: None,
            message: message.into(),
        }
    }
}

/// Snapshot envelope returned by `lists_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshotResponse {
    pub ok: bool,
    /// Lists in insertion order; empty on failure.
    pub items: Vec<ListItem>,
    pub message: String,
}

/// Envelope returned by `lists_observe_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObserverResponse {
    pub ok: bool,
    /// Handle for `lists_observe_next` / `lists_observe_cancel`.
    pub observer_id: Option<u64>,
    pub message: String,
}

/// One pull from a live list observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObservationResponse {
    /// `false` when the observation failed or the observer is gone.
    pub ok: bool,
    /// Full list snapshot; empty on timeout or failure.
    pub items: Vec<ListItem>,
    /// No snapshot arrived within the requested timeout; call again.
    pub timed_out: bool,
    /// The stream ended; stop polling this observer id.
    pub finished: bool,
    pub message: String,
}

impl ListObservationResponse {
    fn finished(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            timed_out: false,
            finished: true,
            message: message.into(),
        }
    }
}

/// Opens `<documents_dir>/ordered-todo-database.sqlite` and migrates it.
///
/// # FFI contract
/// - Sync call; call once at app launch before any other list call.
/// - Repeating the call with the same directory is a no-op.
/// - A different directory after a successful call is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_migrate_to_latest(documents_dir: String) -> ListActionResponse {
    let documents_dir = PathBuf::from(documents_dir.trim());
    if let Some(bound) = LIST_STORE.get() {
        return same_dir_response(bound, &documents_dir);
    }

    let config = StoreConfig::new(documents_dir.clone());
    let store = match ListDatabase::open_with(&config).and_then(ListDatabase::migrate_to_latest) {
        Ok(store) => store,
        Err(err) => {
            warn!("event=ffi_bind_store module=ffi status=error error={err}");
            return ListActionResponse::failure(format!("lists_migrate_to_latest failed: {err}"));
        }
    };

    let candidate = BoundStore {
        documents_dir: documents_dir.clone(),
        store,
    };
    if LIST_STORE.set(candidate).is_ok() {
        info!("event=ffi_bind_store module=ffi status=ok");
        return ListActionResponse::success("List store ready.", None);
    }
    // Lost a race against a concurrent first call.
    match LIST_STORE.get() {
        Some(bound) => same_dir_response(bound, &documents_dir),
        None => ListActionResponse::failure("lists_migrate_to_latest failed: store unavailable"),
    }
}

/// Creates a list from the add-list sheet.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Returns the assigned list id on success.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_create(name: String, is_dated: bool) -> ListActionResponse {
    let Some(bound) = LIST_STORE.get() else {
        return ListActionResponse::failure(not_ready("lists_create"));
    };
    match bound.store.insert(ListRecord::new(name, is_dated)) {
        Ok(saved) => ListActionResponse::success("List created.", saved.id),
        Err(err) => ListActionResponse::failure(format!("lists_create failed: {err}")),
    }
}

/// Reads every list in insertion order.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; failures come back as `ok=false` with a message.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_snapshot() -> ListSnapshotResponse {
    let Some(bound) = LIST_STORE.get() else {
        return ListSnapshotResponse {
            ok: false,
            items: Vec::new(),
            message: not_ready("lists_snapshot"),
        };
    };

    match bound.store.fetch_all() {
        Ok(lists) => {
            let items = lists.into_iter().filter_map(to_list_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No lists.".to_string()
            } else {
                format!("Found {} list(s).", items.len())
            };
            ListSnapshotResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => ListSnapshotResponse {
            ok: false,
            items: Vec::new(),
            message: format!("lists_snapshot failed: {err}"),
        },
    }
}

/// Starts a live observation of every list.
///
/// # FFI contract
/// - Sync call. The first snapshot is queued for the returned observer id.
/// - Dart drives the stream by awaiting `lists_observe_next` in a loop and
///   stops it with `lists_observe_cancel`.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_observe_start() -> ListObserverResponse {
    let Some(bound) = LIST_STORE.get() else {
        return ListObserverResponse {
            ok: false,
            observer_id: None,
            message: not_ready("lists_observe_start"),
        };
    };

    let (subscription, events) = bound.store.observe_all_channel();
    let observer_id = NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed);
    observers().insert(
        observer_id,
        ListObserver {
            _subscription: subscription,
            events: Arc::new(Mutex::new(events)),
        },
    );
    info!("event=ffi_observe module=ffi status=start observer_id={observer_id}");
    ListObserverResponse {
        ok: true,
        observer_id: Some(observer_id),
        message: "List observer started.".to_string(),
    }
}

/// Waits up to `timeout_ms` for the next snapshot of `observer_id`.
///
/// # FFI contract
/// - Async call (runs on the FRB worker pool); blocks only its worker.
/// - A failed observation returns `ok=false, finished=true` once and
///   releases the observer.
pub fn lists_observe_next(observer_id: u64, timeout_ms: u32) -> ListObservationResponse {
    let events = match observers().get(&observer_id) {
        Some(observer) => Arc::clone(&observer.events),
        None => return ListObservationResponse::finished(unknown_observer(observer_id)),
    };

    let received = events
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .recv_timeout(Duration::from_millis(u64::from(timeout_ms)));
    let response = to_observation_response(received);
    if response.finished {
        release_observer(observer_id);
    }
    response
}

/// Stops `observer_id`; pending `lists_observe_next` calls end as finished.
#[flutter_rust_bridge::frb(sync)]
pub fn lists_observe_cancel(observer_id: u64) -> ListActionResponse {
    if release_observer(observer_id) {
        ListActionResponse::success("List observer cancelled.", None)
    } else {
        ListActionResponse::failure(unknown_observer(observer_id))
    }
}

fn observers() -> MutexGuard<'static, HashMap<u64, ListObserver>> {
    LIST_OBSERVERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn release_observer(observer_id: u64) -> bool {
    // Drop the subscription after releasing the registry lock.
    let removed = observers().remove(&observer_id);
    let found = removed.is_some();
    drop(removed);
    if found {
        info!("event=ffi_observe module=ffi status=stop observer_id={observer_id}");
    }
    found
}

fn to_observation_response(
    received: Result<ListEvent, RecvTimeoutError>,
) -> ListObservationResponse {
    match received {
        Ok(ObservationEvent::Snapshot(lists)) => {
            let items = lists.into_iter().filter_map(to_list_item).collect::<Vec<_>>();
            let message = format!("Found {} list(s).", items.len());
            ListObservationResponse {
                ok: true,
                items,
                timed_out: false,
                finished: false,
                message,
            }
        }
        Ok(ObservationEvent::Failed(err)) => {
            warn!("event=ffi_observe module=ffi status=error error={err}");
            ListObservationResponse::finished(format!("lists_observe failed: {err}"))
        }
        Err(RecvTimeoutError::Timeout) => ListObservationResponse {
            ok: true,
            items: Vec::new(),
            timed_out: true,
            finished: false,
            message: "No change.".to_string(),
        },
        Err(RecvTimeoutError::Disconnected) => {
            ListObservationResponse::finished("List observer ended.")
        }
    }
}

fn unknown_observer(observer_id: u64) -> String {
    format!("unknown list observer `{observer_id}`")
}

fn same_dir_response(bound: &BoundStore, documents_dir: &Path) -> ListActionResponse {
    if bound.documents_dir.as_path() == documents_dir {
        ListActionResponse::success("List store ready.", None)
    } else {
        ListActionResponse::failure(format!(
            "list store already bound to `{}`; refusing to switch to `{}`",
            bound.documents_dir.display(),
            documents_dir.display()
        ))
    }
}

fn not_ready(operation: &str) -> String {
    format!("{operation} failed: list store is not ready; call lists_migrate_to_latest first")
}

fn to_list_item(list: ListRecord) -> Option<ListItem> {
    let label = list.to_string();
    Some(ListItem {
        id: list.id?,
        name: list.name,
        is_dated: list.is_dated,
        label,
    })
}
