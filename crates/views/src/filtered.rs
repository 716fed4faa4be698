//! Predicate view over an upstream source.
//!
//! Without a predicate the view is a pure pass-through: reads proxy the
//! upstream and upstream batches are replayed verbatim. With a predicate it
//! keeps a shadow map of the matching items and translates upstream diffs
//! into diffs over that subset, so downstream consumers never re-scan.

use crate::upstream::forward_upstream;
use core::hash::Hash;
use core::time::Duration;
use indexmap::IndexMap;
use sluice_collection::{slice_range, KeyFn, Source};
use sluice_event::{
    install_flush_hook, publish, ChangeBatch, ChangeCallback, CollectionEmitter, EmitterHost,
    ListenerId, ListenerSet, Result, TimerDriver,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Membership predicate for a [`FilteredView`].
pub type FilterFn<T> = Rc<dyn Fn(&T) -> bool>;

struct FilteredInner<K, T> {
    upstream: Rc<dyn Source<K, T>>,
    key_fn: KeyFn<K, T>,
    filter: Option<FilterFn<T>>,
    shadow: IndexMap<K, Rc<T>>,
    snapshot: Option<Vec<Rc<T>>>,
    emitter: CollectionEmitter<K, T>,
    listeners: ListenerSet<K, T>,
    subscription: Option<ListenerId>,
    disposed: bool,
}

impl<K: Eq + Hash, T> EmitterHost<K, T> for FilteredInner<K, T> {
    fn emitter_mut(&mut self) -> &mut CollectionEmitter<K, T> {
        &mut self.emitter
    }

    fn listeners(&self) -> &ListenerSet<K, T> {
        &self.listeners
    }
}

impl<K: Eq + Hash + Clone, T> FilteredInner<K, T> {
    fn active(&self) -> bool {
        self.filter.is_some()
    }

    fn snapshot_items(&mut self) -> &[Rc<T>] {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.shadow.values().cloned().collect());
        }
        self.snapshot.as_deref().unwrap_or(&[])
    }

    /// Runs one upstream add/update candidate through the predicate.
    fn apply_candidate(&mut self, filter: &FilterFn<T>, key: &K, item: &Rc<T>) -> Result<()> {
        if filter(item) {
            match self.shadow.get(key) {
                Some(held) if Rc::ptr_eq(held, item) => {}
                Some(_) => {
                    self.emitter.update_event(key.clone(), item.clone())?;
                    self.shadow.insert(key.clone(), item.clone());
                    self.snapshot = None;
                }
                None => {
                    self.emitter.add_event(key.clone(), item.clone())?;
                    self.shadow.insert(key.clone(), item.clone());
                    self.snapshot = None;
                }
            }
        } else if let Some(held) = self.shadow.shift_remove(key) {
            self.snapshot = None;
            self.emitter.remove_event(key.clone(), held)?;
        }
        Ok(())
    }

    fn apply_upstream(&mut self, change: &ChangeBatch<K, T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            return Ok(None);
        }
        let Some(filter) = self.filter.clone() else {
            return self.emitter.replay(change);
        };
        self.emitter.pause_events();
        let mut applied = Ok(());
        for (key, item) in change.iter_added().chain(change.iter_updated()) {
            if let Err(err) = self.apply_candidate(&filter, key, item) {
                applied = Err(err);
                break;
            }
        }
        if applied.is_ok() {
            for (key, _) in change.iter_removed() {
                if let Some(held) = self.shadow.shift_remove(key) {
                    self.snapshot = None;
                    if let Err(err) = self.emitter.remove_event(key.clone(), held) {
                        applied = Err(err);
                        break;
                    }
                }
            }
        }
        let flushed = self.emitter.resume_events();
        applied.map(|()| flushed)
    }

    /// Installs or replaces the predicate, diffing every upstream item.
    fn refilter(&mut self, next: FilterFn<T>) -> Result<Option<ChangeBatch<K, T>>> {
        let source_items = self.upstream.items();
        if self.filter.is_none() {
            // Coming from pass-through: everything was visible, so seed the
            // shadow with the full upstream and let the diff below evict.
            self.shadow = source_items
                .iter()
                .map(|item| ((self.key_fn)(item), item.clone()))
                .collect();
        }
        self.filter = Some(next.clone());
        self.snapshot = None;
        self.emitter.pause_events();
        let mut applied = Ok(());
        for item in &source_items {
            let key = (self.key_fn)(item);
            if let Err(err) = self.apply_candidate(&next, &key, item) {
                applied = Err(err);
                break;
            }
        }
        let flushed = self.emitter.resume_events();
        applied.map(|()| flushed)
    }

    /// Drops the predicate, reporting the items that become visible again.
    fn unfilter(&mut self) -> Result<Option<ChangeBatch<K, T>>> {
        self.filter = None;
        let shadow = core::mem::take(&mut self.shadow);
        self.snapshot = None;
        if self.upstream.count() == shadow.len() {
            return Ok(None);
        }
        self.emitter.pause_events();
        let mut applied = Ok(());
        for item in self.upstream.items() {
            let key = (self.key_fn)(&item);
            if !shadow.contains_key(&key) {
                if let Err(err) = self.emitter.add_event(key, item) {
                    applied = Err(err);
                    break;
                }
            }
        }
        let flushed = self.emitter.resume_events();
        applied.map(|()| flushed)
    }
}

/// A view exposing the upstream items that satisfy a switchable predicate.
pub struct FilteredView<K, T> {
    inner: Rc<RefCell<FilteredInner<K, T>>>,
}

impl<K, T> Clone for FilteredView<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> FilteredView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    /// Binds to `upstream`, optionally filtering from the start.
    pub fn new(upstream: Rc<dyn Source<K, T>>, filter: Option<FilterFn<T>>) -> Self {
        Self::build(upstream, filter, None)
    }

    /// Like [`FilteredView::new`] with dispatch debounced by `delay`.
    pub fn with_debounce(
        upstream: Rc<dyn Source<K, T>>,
        filter: Option<FilterFn<T>>,
        delay: Duration,
        driver: Rc<dyn TimerDriver>,
    ) -> Self {
        Self::build(upstream, filter, Some((delay, driver)))
    }

    fn build(
        upstream: Rc<dyn Source<K, T>>,
        filter: Option<FilterFn<T>>,
        debounce: Option<(Duration, Rc<dyn TimerDriver>)>,
    ) -> Self {
        let key_fn = upstream.key_fn();
        // Nothing can observe the view yet, so the initial subset is seeded
        // directly instead of diffed.
        let shadow = match &filter {
            Some(f) => upstream
                .items()
                .into_iter()
                .filter(|item| f(item))
                .map(|item| ((key_fn)(&item), item))
                .collect(),
            None => IndexMap::new(),
        };
        let emitter = match &debounce {
            Some((delay, driver)) => CollectionEmitter::with_debounce(*delay, driver.clone()),
            None => CollectionEmitter::new(),
        };
        let inner = Rc::new(RefCell::new(FilteredInner {
            upstream: upstream.clone(),
            key_fn,
            filter,
            shadow,
            snapshot: None,
            emitter,
            listeners: ListenerSet::new(),
            subscription: None,
            disposed: false,
        }));
        if debounce.is_some() {
            install_flush_hook(&inner);
        }
        let id = forward_upstream(&inner, &upstream, FilteredInner::apply_upstream);
        inner.borrow_mut().subscription = Some(id);
        Self { inner }
    }

    /// Switches the predicate; `None` reverts to pass-through.
    ///
    /// Setting the same predicate `Rc` (or `None` twice) is a no-op. A
    /// predicate change reports newly matching items as added and newly
    /// failing ones as removed, in one batch.
    pub fn set_filter(&self, filter: Option<FilterFn<T>>) -> Result<()> {
        let change = {
            let mut inner = self.inner.borrow_mut();
            match (&inner.filter, &filter) {
                (None, None) => return Ok(()),
                (Some(current), Some(next)) if Rc::ptr_eq(current, next) => return Ok(()),
                _ => {}
            }
            match filter {
                Some(next) => inner.refilter(next)?,
                None => inner.unfilter()?,
            }
        };
        publish(&self.inner, change);
        Ok(())
    }
}

impl<K, T> Source<K, T> for FilteredView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn key_fn(&self) -> KeyFn<K, T> {
        self.inner.borrow().key_fn.clone()
    }

    fn items(&self) -> Vec<Rc<T>> {
        let mut inner = self.inner.borrow_mut();
        if inner.active() {
            inner.snapshot_items().to_vec()
        } else {
            inner.upstream.items()
        }
    }

    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        let mut inner = self.inner.borrow_mut();
        if inner.active() {
            slice_range(inner.snapshot_items(), start, end)
        } else {
            inner.upstream.items_range(start, end)
        }
    }

    fn count(&self) -> usize {
        let inner = self.inner.borrow();
        if inner.active() {
            inner.shadow.len()
        } else {
            inner.upstream.count()
        }
    }

    fn subscribe(&self, callback: ChangeCallback<K, T>) -> ListenerId {
        self.inner.borrow_mut().listeners.subscribe(callback)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.unsubscribe(id)
    }

    fn dispose(&self) {
        let (upstream, subscription) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.emitter.dispose();
            inner.listeners.clear();
            inner.shadow.clear();
            inner.snapshot = None;
            (inner.upstream.clone(), inner.subscription.take())
        };
        if let Some(id) = subscription {
            upstream.unsubscribe(id);
        }
    }
}
