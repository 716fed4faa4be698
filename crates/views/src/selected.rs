//! Independently mutable selection synchronized to an upstream source.
//!
//! A `SelectedView` is a full collection in its own right: callers insert
//! and remove members freely. The upstream subscription only keeps members
//! coherent: an upstream update refreshes a member in place, an upstream
//! removal evicts it, and upstream additions never auto-join.

use core::hash::Hash;
use core::time::Duration;
use sluice_collection::{Collection, KeyFn, Source};
use sluice_event::{ChangeBatch, ChangeCallback, ListenerId, Result, TimerDriver};
use std::cell::Cell;
use std::rc::Rc;

struct SelectedInner<K, T> {
    selection: Collection<K, T>,
    upstream: Rc<dyn Source<K, T>>,
    subscription: Cell<Option<ListenerId>>,
}

/// Folds one upstream batch into the selection.
fn sync_selection<K, T>(selection: &Collection<K, T>, change: &ChangeBatch<K, T>) -> Result<()>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    selection.pause_events();
    let mut applied = Ok(());
    for (key, item) in change.iter_updated() {
        if selection.contains_key(key) {
            if let Err(err) = selection.insert(item.clone()) {
                applied = Err(err);
                break;
            }
        }
    }
    if applied.is_ok() {
        applied = selection.remove_keys(change.iter_removed().map(|(key, _)| key.clone()));
    }
    selection.resume_events();
    applied
}

/// A selection over an upstream source.
pub struct SelectedView<K, T> {
    inner: Rc<SelectedInner<K, T>>,
}

impl<K, T> Clone for SelectedView<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> SelectedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    /// Binds an empty selection to `upstream`.
    pub fn new(upstream: Rc<dyn Source<K, T>>) -> Self {
        Self::build(upstream, None)
    }

    /// Like [`SelectedView::new`] with dispatch debounced by `delay`.
    pub fn with_debounce(
        upstream: Rc<dyn Source<K, T>>,
        delay: Duration,
        driver: Rc<dyn TimerDriver>,
    ) -> Self {
        Self::build(upstream, Some((delay, driver)))
    }

    fn build(
        upstream: Rc<dyn Source<K, T>>,
        debounce: Option<(Duration, Rc<dyn TimerDriver>)>,
    ) -> Self {
        let key_fn = upstream.key_fn();
        let selection = match debounce {
            Some((delay, driver)) => Collection::with_debounce(key_fn, delay, driver),
            None => Collection::new(key_fn),
        };
        // The sync callback holds only a weak handle; dropping every view
        // handle leaves an inert listener on the upstream.
        let weak = selection.downgrade();
        let id = upstream.subscribe(Rc::new(move |change| {
            let Some(selection) = weak.upgrade() else { return };
            // A malformed upstream batch is dropped, not propagated.
            let _ = sync_selection(&selection, change);
        }));
        Self {
            inner: Rc::new(SelectedInner {
                selection,
                upstream,
                subscription: Cell::new(Some(id)),
            }),
        }
    }

    /// Adds `item` to the selection.
    pub fn insert(&self, item: Rc<T>) -> Result<()> {
        self.inner.selection.insert(item)
    }

    /// Adds every item inside one pause bracket.
    pub fn insert_many(&self, items: impl IntoIterator<Item = Rc<T>>) -> Result<()> {
        self.inner.selection.insert_many(items)
    }

    /// Selects the entire upstream snapshot in one batch.
    pub fn select_all(&self) -> Result<()> {
        self.inner.selection.insert_many(self.inner.upstream.items())
    }

    /// Deselects the item under `key`. Absent keys are a no-op.
    pub fn remove_key(&self, key: &K) -> Result<()> {
        self.inner.selection.remove_key(key)
    }

    /// Deselects every listed key inside one pause bracket.
    pub fn remove_keys(&self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        self.inner.selection.remove_keys(keys)
    }

    /// Empties the selection.
    pub fn clear(&self) -> Result<()> {
        self.inner.selection.clear()
    }

    /// Returns true if this exact `Rc` is selected.
    pub fn contains(&self, item: &Rc<T>) -> bool {
        self.inner.selection.contains(item)
    }

    /// Returns true if any item is selected under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.selection.contains_key(key)
    }

    /// Opens a pause bracket on the selection's emitter.
    pub fn pause_events(&self) {
        self.inner.selection.pause_events();
    }

    /// Closes a pause bracket, publishing the folded batch if one is due.
    pub fn resume_events(&self) {
        self.inner.selection.resume_events();
    }
}

impl<K, T> Source<K, T> for SelectedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn key_fn(&self) -> KeyFn<K, T> {
        self.inner.selection.key_fn()
    }

    fn items(&self) -> Vec<Rc<T>> {
        self.inner.selection.items()
    }

    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        self.inner.selection.items_range(start, end)
    }

    fn count(&self) -> usize {
        self.inner.selection.count()
    }

    fn subscribe(&self, callback: ChangeCallback<K, T>) -> ListenerId {
        self.inner.selection.subscribe(callback)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.selection.unsubscribe(id)
    }

    fn dispose(&self) {
        if let Some(id) = self.inner.subscription.take() {
            self.inner.upstream.unsubscribe(id);
        }
        self.inner.selection.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[test]
    fn test_selection_is_independent() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        source.insert(entry(2, "two")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        let seen = capture(&selected);

        assert_eq!(selected.count(), 0);

        let picked = source.items()[0].clone();
        selected.insert(picked.clone()).unwrap();

        assert_eq!(selected.count(), 1);
        assert!(selected.contains(&picked));
        assert_eq!(added_keys(&seen.borrow()[0]), vec![1]);
    }

    #[test]
    fn test_upstream_add_never_auto_joins() {
        let source = entries();
        let selected = SelectedView::new(as_source(&source));
        let seen = capture(&selected);

        source.insert(entry(1, "one")).unwrap();

        assert_eq!(selected.count(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_upstream_update_refreshes_member() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        selected.insert(source.items()[0].clone()).unwrap();
        let seen = capture(&selected);

        let renamed = entry(1, "one renamed");
        source.insert(renamed.clone()).unwrap();

        assert!(selected.contains(&renamed));
        assert_eq!(selected.items()[0].label, "one renamed");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(updated_keys(&seen[0]), vec![1]);
    }

    #[test]
    fn test_upstream_update_of_non_member_is_ignored() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        let seen = capture(&selected);

        source.insert(entry(1, "one renamed")).unwrap();

        assert_eq!(selected.count(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_upstream_removal_evicts_member() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        source.insert(entry(2, "two")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        selected.select_all().unwrap();
        let seen = capture(&selected);

        source.remove_key(&1).unwrap();

        assert_eq!(selected.count(), 1);
        assert!(!selected.contains_key(&1));
        assert_eq!(removed_keys(&seen.borrow()[0]), vec![1]);
    }

    #[test]
    fn test_select_all_is_one_batch() {
        let source = entries();
        source
            .insert_many((1..=4).map(|id| entry(id, "e")))
            .unwrap();
        let selected = SelectedView::new(as_source(&source));
        let seen = capture(&selected);

        selected.select_all().unwrap();

        assert_eq!(selected.count(), 4);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(added_keys(&seen[0]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_clear_empties_selection_only() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        selected.select_all().unwrap();

        selected.clear().unwrap();

        assert_eq!(selected.count(), 0);
        assert_eq!(source.count(), 1);
    }

    #[test]
    fn test_dispose_detaches_sync() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        selected.select_all().unwrap();

        selected.dispose();
        source.remove_key(&1).unwrap();

        // Sync stopped with the subscription; the selection saw nothing.
        assert_eq!(source.count(), 0);
        assert_eq!(selected.count(), 1);
    }

    #[test]
    fn test_dropped_view_leaves_inert_listener() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        let selected = SelectedView::new(as_source(&source));
        drop(selected);

        source.insert(entry(1, "one renamed")).unwrap();
        assert_eq!(source.count(), 1);
    }
}
