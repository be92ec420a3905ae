//! Table change publish/subscribe.
//!
//! # Responsibility
//! - Carry "table X changed" notifications from committed writes to
//!   registered listeners.
//! - Hand out `Subscription` handles that stop delivery when dropped.
//!
//! # Invariants
//! - Listeners run outside the hub lock, so a listener may subscribe,
//!   cancel, or publish without deadlocking.
//! - Cancelling stops future deliveries only; a notification already being
//!   dispatched on another thread may still arrive.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub mod query;

pub use query::ObservationEvent;

/// Notification that a committed transaction wrote to `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    table: String,
}

impl TableChange {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

type Listener = Arc<dyn Fn(&TableChange) + Send + Sync>;

struct Registration {
    table: String,
    listener: Listener,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    registrations: Mutex<BTreeMap<u64, Registration>>,
}

impl HubInner {
    fn registrations(&self) -> MutexGuard<'_, BTreeMap<u64, Registration>> {
        // Registrations stay consistent across a listener panic because
        // listeners never run under this lock.
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-local change bus shared by a store and its observations.
#[derive(Clone, Default)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for changes to `table`.
    pub fn subscribe<F>(&self, table: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&TableChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.registrations().insert(
            id,
            Registration {
                table: table.into(),
                listener: Arc::new(listener),
            },
        );
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
            on_cancel: None,
        }
    }

    /// Delivers `change` to every listener watching its table.
    ///
    /// Returns how many listeners were notified.
    pub fn publish(&self, change: &TableChange) -> usize {
        let listeners: Vec<Listener> = self
            .inner
            .registrations()
            .values()
            .filter(|registration| registration.table == change.table)
            .map(|registration| Arc::clone(&registration.listener))
            .collect();

        for listener in &listeners {
            listener(change);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.registrations().len()
    }
}

impl Debug for ChangeHub {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Disposable handle for one hub registration.
///
/// Dropping the handle cancels it.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    id: u64,
    hub: Weak<HubInner>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Stops future notifications for this registration.
    pub fn cancel(mut self) {
        self.detach();
    }

    /// Returns whether the registration is still attached to a live hub.
    pub fn is_active(&self) -> bool {
        self.hub
            .upgrade()
            .is_some_and(|hub| hub.registrations().contains_key(&self.id))
    }

    pub(crate) fn with_cancel_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    /// Handle that removes this registration without consuming the
    /// subscription. The cancel hook still runs only on drop/cancel.
    pub(crate) fn registration(&self) -> RegistrationHandle {
        RegistrationHandle {
            id: self.id,
            hub: self.hub.clone(),
        }
    }

    fn detach(&mut self) {
        self.registration().unregister();
        self.hub = Weak::new();
        if let Some(hook) = self.on_cancel.take() {
            hook();
        }
    }
}

/// Weak pointer to one hub registration.
pub(crate) struct RegistrationHandle {
    id: u64,
    hub: Weak<HubInner>,
}

impl RegistrationHandle {
    /// Removes the registration if the hub is still alive. Idempotent.
    pub(crate) fn unregister(&self) {
        if let Some(hub) = self.hub.upgrade() {
            // Drop the registration after releasing the lock; it may own
            // values whose destructors touch the hub.
            let removed = hub.registrations().remove(&self.id);
            drop(removed);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
