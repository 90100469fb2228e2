//! Publish/subscribe plumbing shared by nodes and factories
//!
//! Observable types own an [`Observers`] list and expose `subscribe` /
//! `unsubscribe`. Events are delivered synchronously, in subscription order,
//! to every listener registered at the time of the notification.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Handle returned by `subscribe`, used to unsubscribe later
pub type ListenerId = usize;

static NEXT_LISTENER_ID: AtomicUsize = AtomicUsize::new(1);

/// Receiver of events emitted by an observable object
pub trait Listener<E>: Send + Sync {
    /// Called once per emitted event; `sender` is the emitter's unique id
    fn on_event(&self, sender: Uuid, event: &E);
}

impl<E, F> Listener<E> for F
where
    F: Fn(Uuid, &E) + Send + Sync,
{
    fn on_event(&self, sender: Uuid, event: &E) {
        self(sender, event)
    }
}

/// Listener list owned by an observable object
pub struct Observers<E> {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn Listener<E>>)>>,
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener<E>>) -> ListenerId {
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, listener));
        id
    }

    /// Remove a listener; returns false if the id was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to all current listeners
    pub fn notify(&self, sender: Uuid, event: &E) {
        // Snapshot so a listener may (un)subscribe from inside its callback
        let snapshot: Vec<Arc<dyn Listener<E>>> =
            self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            listener.on_event(sender, event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn Listener<E>>)>> {
        // A panicking listener must not wedge the observable
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("listeners", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reaches_all_listeners() {
        let observers: Observers<u32> = Observers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        observers.subscribe(Arc::new(move |_: Uuid, e: &u32| sink.lock().unwrap().push(*e)));
        let sink = Arc::clone(&seen);
        observers.subscribe(Arc::new(move |_: Uuid, e: &u32| sink.lock().unwrap().push(*e * 10)));

        observers.notify(Uuid::new_v4(), &4);
        assert_eq!(*seen.lock().unwrap(), vec![4, 40]);
    }

    #[test]
    fn test_unsubscribe() {
        let observers: Observers<u32> = Observers::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let id = observers.subscribe(Arc::new(move |_: Uuid, _: &u32| *sink.lock().unwrap() += 1));

        observers.notify(Uuid::new_v4(), &1);
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(Uuid::new_v4(), &1);

        assert_eq!(*seen.lock().unwrap(), 1);
        assert!(observers.is_empty());
    }
}
