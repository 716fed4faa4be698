//! Scoring view over an upstream source.
//!
//! Active only when both a scoring function and a non-empty query are set.
//! While active it tracks a score per upstream item and exposes the items in
//! ascending score order, best match first. Every dispatched batch carries a
//! forced ordered flag, pass-through included, since a score change can move
//! any item.

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

/// Scores an item against a query; lower scores rank first.
pub type SearchFn<T> = Rc<dyn Fn(&T, &str) -> f64>;

struct ScoredItem<T> {
    score: f64,
    item: Rc<T>,
}

struct SearchedInner<K, T> {
    upstream: Rc<dyn Source<K, T>>,
    key_fn: KeyFn<K, T>,
    search_fn: Option<SearchFn<T>>,
    query: Option<String>,
    tracked: Option<IndexMap<K, ScoredItem<T>>>,
    results: Option<Vec<Rc<T>>>,
    emitter: CollectionEmitter<K, T>,
    listeners: ListenerSet<K, T>,
    subscription: Option<ListenerId>,
    disposed: bool,
}

impl<K: Eq + Hash, T> EmitterHost<K, T> for SearchedInner<K, T> {
    fn emitter_mut(&mut self) -> &mut CollectionEmitter<K, T> {
        &mut self.emitter
    }

    fn listeners(&self) -> &ListenerSet<K, T> {
        &self.listeners
    }
}

impl<K: Eq + Hash + Clone, T> SearchedInner<K, T> {
    /// Both halves configured and the query non-empty.
    fn active_config(&self) -> Option<(SearchFn<T>, String)> {
        let query = self.query.as_ref().filter(|q| !q.is_empty())?;
        let search_fn = self.search_fn.as_ref()?;
        Some((search_fn.clone(), query.clone()))
    }

    fn result_items(&mut self) -> &[Rc<T>] {
        if self.results.is_none() {
            if let Some(tracked) = &self.tracked {
                let mut scored: Vec<&ScoredItem<T>> = tracked.values().collect();
                // Stable over the tracking order, so equal scores tie-break
                // by first appearance.
                scored.sort_by(|l, r| l.score.total_cmp(&r.score));
                let items = scored.into_iter().map(|s| s.item.clone()).collect();
                self.results = Some(items);
            }
        }
        self.results.as_deref().unwrap_or(&[])
    }

    /// Rescores everything after a query or scoring-function change.
    fn refresh(&mut self) -> Result<Option<ChangeBatch<K, T>>> {
        let source_items = self.upstream.items();
        let key_fn = self.key_fn.clone();
        self.results = None;
        self.emitter.pause_events();
        let mut applied = Ok(());
        if let Some((search_fn, query)) = self.active_config() {
            let tracked = self.tracked.get_or_insert_with(IndexMap::new);
            for item in source_items {
                let key = key_fn(&item);
                let score = search_fn(&item, &query);
                let step = if tracked.contains_key(&key) {
                    self.emitter.update_event(key.clone(), item.clone())
                } else {
                    self.emitter.add_event(key.clone(), item.clone())
                };
                if let Err(err) = step {
                    applied = Err(err);
                    break;
                }
                tracked.insert(key, ScoredItem { score, item });
            }
        } else if let Some(tracked) = self.tracked.take() {
            // Deactivation: report any upstream item the score table missed
            // before dropping it. The table tracks every item while active,
            // so the usual outcome is an ordered-only event.
            for item in source_items {
                let key = key_fn(&item);
                if !tracked.contains_key(&key) {
                    if let Err(err) = self.emitter.add_event(key, item) {
                        applied = Err(err);
                        break;
                    }
                }
            }
        }
        self.emitter.ordered_event();
        let flushed = self.emitter.resume_events();
        applied.map(|()| flushed)
    }

    fn apply_upstream(&mut self, change: &ChangeBatch<K, T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            return Ok(None);
        }
        let Some((search_fn, query)) = self.active_config() else {
            self.emitter.pause_events();
            let applied = self.emitter.replay(change).map(|_| ());
            self.emitter.ordered_event();
            let flushed = self.emitter.resume_events();
            return applied.map(|()| flushed);
        };
        self.results = None;
        self.emitter.pause_events();
        let mut applied = Ok(());
        let tracked = self.tracked.get_or_insert_with(IndexMap::new);
        for (key, item) in change.iter_added().chain(change.iter_updated()) {
            let score = search_fn(item, &query);
            let step = if tracked.contains_key(key) {
                self.emitter.update_event(key.clone(), item.clone())
            } else {
                self.emitter.add_event(key.clone(), item.clone())
            };
            if let Err(err) = step {
                applied = Err(err);
                break;
            }
            tracked.insert(key.clone(), ScoredItem { score, item: item.clone() });
        }
        if applied.is_ok() {
            for (key, item) in change.iter_removed() {
                if tracked.shift_remove(key).is_some() {
                    if let Err(err) = self.emitter.remove_event(key.clone(), item.clone()) {
                        applied = Err(err);
                        break;
                    }
                }
            }
        }
        self.emitter.ordered_event();
        let flushed = self.emitter.resume_events();
        applied.map(|()| flushed)
    }
}

/// A view ranking upstream items against a query.
pub struct SearchedView<K, T> {
    inner: Rc<RefCell<SearchedInner<K, T>>>,
}

impl<K, T> Clone for SearchedView<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> SearchedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    /// Binds to `upstream`, optionally scoring from the start.
    pub fn new(
        upstream: Rc<dyn Source<K, T>>,
        search_fn: Option<SearchFn<T>>,
        query: Option<String>,
    ) -> Self {
        Self::build(upstream, search_fn, query, None)
    }

    /// Like [`SearchedView::new`] with dispatch debounced by `delay`.
    pub fn with_debounce(
        upstream: Rc<dyn Source<K, T>>,
        search_fn: Option<SearchFn<T>>,
        query: Option<String>,
        delay: Duration,
        driver: Rc<dyn TimerDriver>,
    ) -> Self {
        Self::build(upstream, search_fn, query, Some((delay, driver)))
    }

    fn build(
        upstream: Rc<dyn Source<K, T>>,
        search_fn: Option<SearchFn<T>>,
        query: Option<String>,
        debounce: Option<(Duration, Rc<dyn TimerDriver>)>,
    ) -> Self {
        let key_fn = upstream.key_fn();
        // Seed the score table directly; nothing can observe the view yet.
        let tracked = match (&search_fn, query.as_ref().filter(|q| !q.is_empty())) {
            (Some(f), Some(q)) => Some(
                upstream
                    .items()
                    .into_iter()
                    .map(|item| {
                        let key = (key_fn)(&item);
                        let score = f(&item, q);
                        (key, ScoredItem { score, item })
                    })
                    .collect(),
            ),
            _ => None,
        };
        let emitter = match &debounce {
            Some((delay, driver)) => CollectionEmitter::with_debounce(*delay, driver.clone()),
            None => CollectionEmitter::new(),
        };
        let inner = Rc::new(RefCell::new(SearchedInner {
            upstream: upstream.clone(),
            key_fn,
            search_fn,
            query,
            tracked,
            results: None,
            emitter,
            listeners: ListenerSet::new(),
            subscription: None,
            disposed: false,
        }));
        if debounce.is_some() {
            install_flush_hook(&inner);
        }
        let id = forward_upstream(&inner, &upstream, SearchedInner::apply_upstream);
        inner.borrow_mut().subscription = Some(id);
        Self { inner }
    }

    /// Switches the query; `None` or the empty string deactivates scoring.
    ///
    /// Setting a value-equal query is a no-op.
    pub fn set_query(&self, query: Option<String>) -> Result<()> {
        let change = {
            let mut inner = self.inner.borrow_mut();
            if inner.query == query {
                return Ok(());
            }
            inner.query = query;
            inner.refresh()?
        };
        publish(&self.inner, change);
        Ok(())
    }

    /// Switches the scoring function; `None` deactivates scoring.
    ///
    /// Setting the same function `Rc` (or `None` twice) is a no-op.
    pub fn set_search_fn(&self, search_fn: Option<SearchFn<T>>) -> Result<()> {
        let change = {
            let mut inner = self.inner.borrow_mut();
            match (&inner.search_fn, &search_fn) {
                (None, None) => return Ok(()),
                (Some(current), Some(next)) if Rc::ptr_eq(current, next) => return Ok(()),
                _ => {}
            }
            inner.search_fn = search_fn;
            inner.refresh()?
        };
        publish(&self.inner, change);
        Ok(())
    }
}

impl<K, T> Source<K, T> for SearchedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn key_fn(&self) -> KeyFn<K, T> {
        self.inner.borrow().key_fn.clone()
    }

    fn items(&self) -> Vec<Rc<T>> {
        let mut inner = self.inner.borrow_mut();
        if inner.tracked.is_some() {
            inner.result_items().to_vec()
        } else {
            inner.upstream.items()
        }
    }

    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        let mut inner = self.inner.borrow_mut();
        if inner.tracked.is_some() {
            slice_range(inner.result_items(), start, end)
        } else {
            inner.upstream.items_range(start, end)
        }
    }

    fn count(&self) -> usize {
        let inner = self.inner.borrow();
        match &inner.tracked {
            Some(tracked) => tracked.len(),
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
            inner.tracked = None;
            inner.results = None;
            (inner.upstream.clone(), inner.subscription.take())
        };
        if let Some(id) = subscription {
            upstream.unsubscribe(id);
        }
    }
}
