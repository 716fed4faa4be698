//! The capability every collection and view exposes to consumers.

use sluice_event::{ChangeCallback, ListenerId};
use std::rc::Rc;

/// Derives the stable key of an item.
///
/// One key function is shared from a source down to every view stacked on
/// it, so the whole pipeline agrees on item identity.
pub type KeyFn<K, T> = Rc<dyn Fn(&T) -> K>;

/// A keyed, ordered, observable item set.
///
/// Implemented by the base collection and by every view, which is what makes
/// views stackable: a view binds to any `Source` and is itself one.
pub trait Source<K, T> {
    /// The key derivation shared across the pipeline.
    fn key_fn(&self) -> KeyFn<K, T>;

    /// Derives the key of `item`.
    fn key_of(&self, item: &T) -> K {
        (self.key_fn())(item)
    }

    /// The full ordered item snapshot.
    fn items(&self) -> Vec<Rc<T>>;

    /// A clamped `[start, end)` slice of the ordered snapshot.
    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>>;

    /// Number of items currently held.
    fn count(&self) -> usize;

    /// Registers a change listener.
    fn subscribe(&self, callback: ChangeCallback<K, T>) -> ListenerId;

    /// Removes a change listener. Returns true if it was registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Detaches from upstream, cancels timers and drops all listeners.
    ///
    /// Idempotent; a disposed source dispatches nothing further.
    fn dispose(&self);
}

/// Clamps `[start, end)` against `items` and clones that window out.
pub fn slice_range<T>(items: &[Rc<T>], start: usize, end: usize) -> Vec<Rc<T>> {
    let len = items.len();
    let start = start.min(len);
    let end = end.min(len);
    if start >= end {
        Vec::new()
    } else {
        items[start..end].to_vec()
    }
}
