//! Listener registration shared by the stores, the timer and sessions.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

fn lock<T>(set: &Mutex<ListenerSet<T>>) -> MutexGuard<'_, ListenerSet<T>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of callbacks notified with `&T`.
///
/// Listeners are invoked outside the internal lock, so a listener may
/// subscribe or unsubscribe while being notified.
pub struct Listeners<T> {
    inner: Arc<Mutex<ListenerSet<T>>>,
}

impl<T: 'static> Listeners<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerSet {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `listener`. Dropping the returned handle keeps it registered.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut set = lock(&self.inner);
            let id = set.next_id;
            set.next_id += 1;
            set.entries.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<ListenerSet<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    /// Drop every registered listener.
    pub fn clear(&self) {
        lock(&self.inner).entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &lock(&self.inner).entries.len())
            .finish()
    }
}

/// Handle returned by `subscribe`.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn notifies_until_unsubscribed() {
        let listeners = Listeners::<u32>::new();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let sub = listeners.subscribe(move |v| {
            counter.fetch_add(*v, Ordering::SeqCst);
        });

        listeners.notify(&2);
        listeners.notify(&3);
        assert_eq!(seen.load(Ordering::SeqCst), 5);

        sub.unsubscribe();
        listeners.notify(&10);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert!(listeners.is_empty());
    }

    #[test]
    fn unsubscribe_only_removes_its_listener() {
        let listeners = Listeners::<()>::new();
        let first = listeners.subscribe(|()| {});
        let _second = listeners.subscribe(|()| {});
        assert_eq!(listeners.len(), 2);
        first.unsubscribe();
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn listener_may_subscribe_during_notify() {
        let listeners = Listeners::<()>::new();
        let inner = listeners.clone();
        let _sub = listeners.subscribe(move |()| {
            let _nested = inner.subscribe(|()| {});
        });
        listeners.notify(&());
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn unsubscribe_after_set_dropped_is_harmless() {
        let listeners = Listeners::<()>::new();
        let sub = listeners.subscribe(|()| {});
        drop(listeners);
        sub.unsubscribe();
    }
}
