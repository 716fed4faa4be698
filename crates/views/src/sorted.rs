//! Comparator view over an upstream source.
//!
//! With a comparator installed the view keeps a fully re-sorted copy of the
//! upstream snapshot, refreshed on every upstream batch. Outgoing batches
//! carry the upstream change sets with the ordered flag forced, pass-through
//! included, since any upstream change may move items under the comparator.

use crate::upstream::forward_upstream;
use core::cmp::Ordering;
use core::hash::Hash;
use core::time::Duration;
use sluice_collection::{slice_range, KeyFn, Source};
use sluice_event::{
    install_flush_hook, publish, ChangeBatch, ChangeCallback, CollectionEmitter, EmitterHost,
    ListenerId, ListenerSet, Result, TimerDriver,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Comparator for a [`SortedView`].
pub type SortFn<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

struct SortedInner<K, T> {
    upstream: Rc<dyn Source<K, T>>,
    key_fn: KeyFn<K, T>,
    sort: Option<SortFn<T>>,
    sorted: Option<Vec<Rc<T>>>,
    emitter: CollectionEmitter<K, T>,
    listeners: ListenerSet<K, T>,
    subscription: Option<ListenerId>,
    disposed: bool,
}

impl<K: Eq + Hash, T> EmitterHost<K, T> for SortedInner<K, T> {
    fn emitter_mut(&mut self) -> &mut CollectionEmitter<K, T> {
        &mut self.emitter
    }

    fn listeners(&self) -> &ListenerSet<K, T> {
        &self.listeners
    }
}

fn sort_items<T>(mut items: Vec<Rc<T>>, cmp: &SortFn<T>) -> Vec<Rc<T>> {
    // Stable, so equal items keep their upstream relative order.
    items.sort_by(|a, b| cmp(a, b));
    items
}

impl<K: Eq + Hash + Clone, T> SortedInner<K, T> {
    fn apply_upstream(&mut self, change: &ChangeBatch<K, T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            return Ok(None);
        }
        if let Some(cmp) = self.sort.clone() {
            self.sorted = Some(sort_items(self.upstream.items(), &cmp));
        }
        self.emitter.pause_events();
        let applied = self.emitter.replay(change).map(|_| ());
        self.emitter.ordered_event();
        let flushed = self.emitter.resume_events();
        applied.map(|()| flushed)
    }
}

/// A view exposing the upstream items under a switchable comparator.
pub struct SortedView<K, T> {
    inner: Rc<RefCell<SortedInner<K, T>>>,
}

impl<K, T> Clone for SortedView<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> SortedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    /// Binds to `upstream`, optionally sorting from the start.
    pub fn new(upstream: Rc<dyn Source<K, T>>, sort: Option<SortFn<T>>) -> Self {
        Self::build(upstream, sort, None)
    }

    /// Like [`SortedView::new`] with dispatch debounced by `delay`.
    pub fn with_debounce(
        upstream: Rc<dyn Source<K, T>>,
        sort: Option<SortFn<T>>,
        delay: Duration,
        driver: Rc<dyn TimerDriver>,
    ) -> Self {
        Self::build(upstream, sort, Some((delay, driver)))
    }

    fn build(
        upstream: Rc<dyn Source<K, T>>,
        sort: Option<SortFn<T>>,
        debounce: Option<(Duration, Rc<dyn TimerDriver>)>,
    ) -> Self {
        let key_fn = upstream.key_fn();
        let sorted = sort.as_ref().map(|cmp| sort_items(upstream.items(), cmp));
        let emitter = match &debounce {
            Some((delay, driver)) => CollectionEmitter::with_debounce(*delay, driver.clone()),
            None => CollectionEmitter::new(),
        };
        let inner = Rc::new(RefCell::new(SortedInner {
            upstream: upstream.clone(),
            key_fn,
            sort,
            sorted,
            emitter,
            listeners: ListenerSet::new(),
            subscription: None,
            disposed: false,
        }));
        if debounce.is_some() {
            install_flush_hook(&inner);
        }
        let id = forward_upstream(&inner, &upstream, SortedInner::apply_upstream);
        inner.borrow_mut().subscription = Some(id);
        Self { inner }
    }

    /// Switches the comparator; `None` reverts to upstream order.
    ///
    /// Setting the same comparator `Rc` (or `None` twice) is a no-op. Any
    /// actual change dispatches an ordered-only event.
    pub fn set_sort(&self, sort: Option<SortFn<T>>) {
        let change = {
            let mut inner = self.inner.borrow_mut();
            match (&inner.sort, &sort) {
                (None, None) => return,
                (Some(current), Some(next)) if Rc::ptr_eq(current, next) => return,
                _ => {}
            }
            inner.sorted = sort
                .as_ref()
                .map(|cmp| sort_items(inner.upstream.items(), cmp));
            inner.sort = sort;
            inner.emitter.ordered_event()
        };
        publish(&self.inner, change);
    }
}

impl<K, T> Source<K, T> for SortedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn key_fn(&self) -> KeyFn<K, T> {
        self.inner.borrow().key_fn.clone()
    }

    fn items(&self) -> Vec<Rc<T>> {
        let inner = self.inner.borrow();
        match &inner.sorted {
            Some(sorted) => sorted.clone(),
            None => inner.upstream.items(),
        }
    }

    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        let inner = self.inner.borrow();
        match &inner.sorted {
            Some(sorted) => slice_range(sorted, start, end),
            None => inner.upstream.items_range(start, end),
        }
    }

    fn count(&self) -> usize {
        let inner = self.inner.borrow();
        match &inner.sorted {
            Some(sorted) => sorted.len(),
            None => inner.upstream.count(),
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
            inner.sorted = None;
            (inner.upstream.clone(), inner.subscription.take())
        };
        if let Some(id) = subscription {
            upstream.unsubscribe(id);
        }
    }
}
