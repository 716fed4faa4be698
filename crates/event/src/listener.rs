//! Listener registration for change notifications.
//!
//! Every collection and view owns one `ListenerSet`. Dispatch goes through
//! `snapshot()` so the callback list is cloned out first and no internal
//! borrow is held while listeners run; a listener may therefore re-read the
//! notifying source or manage subscriptions from inside its callback.

use crate::change::ChangeBatch;
use hashbrown::HashMap;
use std::rc::Rc;

/// Unique identifier for a registered listener.
pub type ListenerId = u64;

/// Callback type for change notifications.
pub type ChangeCallback<K, T> = Rc<dyn Fn(&ChangeBatch<K, T>)>;

/// An id-keyed set of change listeners.
pub struct ListenerSet<K, T> {
    listeners: HashMap<ListenerId, ChangeCallback<K, T>>,
    next_id: ListenerId,
}

impl<K, T> Default for ListenerSet<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> ListenerSet<K, T> {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a callback and returns its id.
    pub fn subscribe(&mut self, callback: ChangeCallback<K, T>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, callback);
        id
    }

    /// Removes a callback by id. Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Clones the current callbacks out for borrow-free dispatch.
    ///
    /// Registration order is not significant for delivery.
    pub fn snapshot(&self) -> Vec<ChangeCallback<K, T>> {
        self.listeners.values().cloned().collect()
    }

    /// Returns the number of registered listeners.
    #[inline]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if no listeners are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Removes every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
