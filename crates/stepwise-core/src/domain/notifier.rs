//! Composable event capability.
//!
//! Flows, steps and the key-press hub each own a [`Notifier`] instead of
//! inheriting event-target behaviour.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Synchronous, ordered event fan-out
pub struct Notifier<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> Notifier<E> {
    /// Create a notifier without listeners
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener; listeners run in registration order
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener and return how many were called.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe,
    /// unsubscribe or emit re-entrantly.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// True when nobody listens
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let notifier = Notifier::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            notifier.subscribe(move |value: &u32| seen.lock().push(format!("{}:{}", tag, value)));
        }

        assert_eq!(notifier.emit(&7), 2);
        assert_eq!(*seen.lock(), vec!["first:7", "second:7"]);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = Notifier::<()>::new();
        let id = notifier.subscribe(|_| {});
        assert_eq!(notifier.len(), 1);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        assert!(notifier.is_empty());
        assert_eq!(notifier.emit(&()), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let notifier = Arc::new(Notifier::<()>::new());
        let slot = Arc::new(Mutex::new(None::<ListenerId>));

        let n = notifier.clone();
        let s = slot.clone();
        let id = notifier.subscribe(move |_| {
            if let Some(id) = *s.lock() {
                n.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        assert_eq!(notifier.emit(&()), 1);
        assert_eq!(notifier.emit(&()), 0);
    }
}
