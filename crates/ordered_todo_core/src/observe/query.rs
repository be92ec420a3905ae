//! Live query observation on top of `ChangeHub`.
//!
//! # Responsibility
//! - Re-run a read query whenever its watched table changes.
//! - Emit each fresh result to one observer callback.
//!
//! # Invariants
//! - Emissions for one observation are serialized and never reentrant.
//!   Changes that arrive while a refresh runs (including writes made from
//!   inside the callback) are coalesced into one more refresh.
//! - A failed fetch emits `ObservationEvent::Failed` once and ends the
//!   observation; nothing is emitted after it, and its hub listener is
//!   removed even while the `Subscription` is still held.

use super::{ChangeHub, RegistrationHandle, Subscription};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One delivery from a live query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationEvent<T, E> {
    /// Full, freshly fetched result.
    Snapshot(T),
    /// Terminal: the query failed and the observation stopped.
    Failed(E),
}

impl<T, E> ObservationEvent<T, E> {
    pub fn snapshot(self) -> Option<T> {
        match self {
            Self::Snapshot(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

type Fetch<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;
type Deliver<T, E> = Box<dyn Fn(ObservationEvent<T, E>) + Send + Sync>;

struct QueryObservation<T, E> {
    table: String,
    fetch: Fetch<T, E>,
    deliver: Deliver<T, E>,
    pending: AtomicBool,
    running: AtomicBool,
    stopped: AtomicBool,
    registration: OnceCell<RegistrationHandle>,
}

impl<T, E: std::fmt::Display> QueryObservation<T, E> {
    fn refresh(&self) {
        self.pending.store(true, Ordering::SeqCst);
        loop {
            if self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                // The thread already refreshing picks up `pending`.
                return;
            }

            while self.pending.swap(false, Ordering::SeqCst) {
                if self.stopped.load(Ordering::SeqCst) {
                    break;
                }
                self.emit_once();
            }

            self.running.store(false, Ordering::SeqCst);
            if self.stopped.load(Ordering::SeqCst) || !self.pending.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn emit_once(&self) {
        match (self.fetch)() {
            Ok(value) => {
                debug!(
                    "event=query_observe module=observe status=snapshot table={}",
                    self.table
                );
                (self.deliver)(ObservationEvent::Snapshot(value));
            }
            Err(err) => {
                self.stopped.store(true, Ordering::SeqCst);
                self.unregister();
                warn!(
                    "event=query_observe module=observe status=error table={} error={}",
                    self.table, err
                );
                (self.deliver)(ObservationEvent::Failed(err));
            }
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn unregister(&self) {
        if let Some(registration) = self.registration.get() {
            registration.unregister();
        }
    }
}

/// Starts observing `fetch` against changes to `table`.
///
/// The first event is normally delivered on the calling thread before this
/// function returns. If another thread publishes a change to `table` at the
/// same moment, that thread may deliver the first event instead, possibly
/// after this returns. Later events are delivered on whichever thread
/// published the change. Events never overlap and arrive in fetch order.
pub fn observe_query<T, E, F, D>(hub: &ChangeHub, table: &str, fetch: F, deliver: D) -> Subscription
where
    T: 'static,
    E: std::fmt::Display + 'static,
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    D: Fn(ObservationEvent<T, E>) + Send + Sync + 'static,
{
    let observation = Arc::new(QueryObservation {
        table: table.to_string(),
        fetch: Box::new(fetch),
        deliver: Box::new(deliver),
        pending: AtomicBool::new(false),
        running: AtomicBool::new(false),
        stopped: AtomicBool::new(false),
        registration: OnceCell::new(),
    });

    // Register before the first fetch so a write racing with it still
    // triggers a refresh.
    let listener = Arc::clone(&observation);
    let stopper = Arc::clone(&observation);
    let subscription = hub
        .subscribe(table, move |_change| listener.refresh())
        .with_cancel_hook(move || stopper.stop());
    // A racing refresh may have failed before the handle was stored.
    if observation.registration.set(subscription.registration()).is_ok()
        && observation.stopped.load(Ordering::SeqCst)
    {
        observation.unregister();
    }

    observation.refresh();
    subscription
}

#[cfg(test)]
mod tests {
    use super::{observe_query, ObservationEvent};
    use crate::observe::{ChangeHub, TableChange};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn emits_initial_and_refreshed_values() {
        let hub = ChangeHub::new();
        let source = Arc::new(AtomicUsize::new(1));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_source = Arc::clone(&source);
        let sink = Arc::clone(&seen);
        let _subscription = observe_query(
            &hub,
            "t",
            move || Ok::<_, String>(fetch_source.load(Ordering::SeqCst)),
            move |event| sink.lock().unwrap().push(event),
        );

        source.store(2, Ordering::SeqCst);
        hub.publish(&TableChange::new("t"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ObservationEvent::Snapshot(1), ObservationEvent::Snapshot(2)]
        );
    }

    #[test]
    fn failure_is_terminal() {
        let hub = ChangeHub::new();
        let broken = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_broken = Arc::clone(&broken);
        let sink = Arc::clone(&seen);
        let _subscription = observe_query(
            &hub,
            "t",
            move || {
                if fetch_broken.load(Ordering::SeqCst) {
                    Err("boom".to_string())
                } else {
                    Ok(7)
                }
            },
            move |event| sink.lock().unwrap().push(event),
        );

        broken.store(true, Ordering::SeqCst);
        hub.publish(&TableChange::new("t"));
        broken.store(false, Ordering::SeqCst);
        hub.publish(&TableChange::new("t"));

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ObservationEvent::Snapshot(7));
        assert!(events[1].is_terminal());
    }

    #[test]
    fn failed_observation_leaves_the_hub_while_subscription_is_held() {
        let hub = ChangeHub::new();
        let fetches = Arc::new(AtomicUsize::new(0));

        let fetch_count = Arc::clone(&fetches);
        let subscription = observe_query(
            &hub,
            "t",
            move || {
                if fetch_count.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(())
                } else {
                    Err("boom".to_string())
                }
            },
            |_event| {},
        );
        assert_eq!(hub.listener_count(), 1);

        assert_eq!(hub.publish(&TableChange::new("t")), 1);
        assert_eq!(hub.listener_count(), 0);
        assert!(!subscription.is_active());

        assert_eq!(hub.publish(&TableChange::new("t")), 0);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        drop(subscription);
    }

    #[test]
    fn initial_failure_detaches_immediately() {
        let hub = ChangeHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _subscription = observe_query(
            &hub,
            "t",
            || Err::<(), _>("unavailable".to_string()),
            move |event| sink.lock().unwrap().push(event),
        );

        assert_eq!(hub.listener_count(), 0);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ObservationEvent::Failed("unavailable".to_string())]
        );
    }

    #[test]
    fn publish_from_callback_is_coalesced_not_reentrant() {
        let hub = ChangeHub::new();
        let depth = Arc::new(AtomicUsize::new(0));
        let max_depth = Arc::new(AtomicUsize::new(0));
        let emitted = Arc::new(AtomicUsize::new(0));

        let callback_hub = hub.clone();
        let callback_depth = Arc::clone(&depth);
        let callback_max = Arc::clone(&max_depth);
        let callback_emitted = Arc::clone(&emitted);
        let _subscription = observe_query(
            &hub,
            "t",
            || Ok::<_, String>(()),
            move |_event| {
                let now = callback_depth.fetch_add(1, Ordering::SeqCst) + 1;
                callback_max.fetch_max(now, Ordering::SeqCst);
                if callback_emitted.fetch_add(1, Ordering::SeqCst) == 0 {
                    callback_hub.publish(&TableChange::new("t"));
                }
                callback_depth.fetch_sub(1, Ordering::SeqCst);
            },
        );

        assert_eq!(emitted.load(Ordering::SeqCst), 2);
        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_observation_stops_emitting() {
        let hub = ChangeHub::new();
        let emitted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&emitted);

        let subscription = observe_query(
            &hub,
            "t",
            || Ok::<_, String>(()),
            move |_event| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        subscription.cancel();
        hub.publish(&TableChange::new("t"));

        assert_eq!(emitted.load(Ordering::SeqCst), 1);
    }
}
