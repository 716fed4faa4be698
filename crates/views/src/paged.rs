//! Pagination window over an upstream source.
//!
//! Exposes one page of the upstream snapshot. The window is recomputed on
//! every upstream batch and on page changes, and every recomputation
//! dispatches an ordered-only event: consumers re-read the window rather
//! than patching it.

use crate::upstream::forward_upstream;
use core::hash::Hash;
use core::time::Duration;
use sluice_collection::{slice_range, KeyFn, Source};
use sluice_event::{
    install_flush_hook, publish, ChangeBatch, ChangeCallback, CollectionEmitter, EmitterHost,
    ListenerId, ListenerSet, Result, TimerDriver,
};
use std::cell::RefCell;
use std::rc::Rc;

struct PagedInner<K, T> {
    upstream: Rc<dyn Source<K, T>>,
    key_fn: KeyFn<K, T>,
    page: usize,
    page_size: usize,
    window: Vec<Rc<T>>,
    emitter: CollectionEmitter<K, T>,
    listeners: ListenerSet<K, T>,
    subscription: Option<ListenerId>,
    disposed: bool,
}

impl<K: Eq + Hash, T> EmitterHost<K, T> for PagedInner<K, T> {
    fn emitter_mut(&mut self) -> &mut CollectionEmitter<K, T> {
        &mut self.emitter
    }

    fn listeners(&self) -> &ListenerSet<K, T> {
        &self.listeners
    }
}

/// `[start, end)` window for a 1-based page; page 0 clamps to page 1.
fn window_bounds(page: usize, page_size: usize) -> (usize, usize) {
    let start = page.saturating_sub(1) * page_size;
    (start, start + page_size)
}

impl<K: Eq + Hash + Clone, T> PagedInner<K, T> {
    fn paginate(&mut self) -> Option<ChangeBatch<K, T>> {
        let (start, end) = window_bounds(self.page, self.page_size);
        self.window = self.upstream.items_range(start, end);
        self.emitter.ordered_event()
    }

    fn apply_upstream(&mut self, _change: &ChangeBatch<K, T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            return Ok(None);
        }
        Ok(self.paginate())
    }
}

/// A view exposing one page of the upstream snapshot.
pub struct PagedView<K, T> {
    inner: Rc<RefCell<PagedInner<K, T>>>,
}

impl<K, T> Clone for PagedView<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> PagedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    /// Binds to `upstream`, windowed to the 1-based `page` of `page_size`.
    pub fn new(upstream: Rc<dyn Source<K, T>>, page: usize, page_size: usize) -> Self {
        Self::build(upstream, page, page_size, None)
    }

    /// Like [`PagedView::new`] with dispatch debounced by `delay`.
    pub fn with_debounce(
        upstream: Rc<dyn Source<K, T>>,
        page: usize,
        page_size: usize,
        delay: Duration,
        driver: Rc<dyn TimerDriver>,
    ) -> Self {
        Self::build(upstream, page, page_size, Some((delay, driver)))
    }

    fn build(
        upstream: Rc<dyn Source<K, T>>,
        page: usize,
        page_size: usize,
        debounce: Option<(Duration, Rc<dyn TimerDriver>)>,
    ) -> Self {
        let key_fn = upstream.key_fn();
        let (start, end) = window_bounds(page, page_size);
        let window = upstream.items_range(start, end);
        let emitter = match &debounce {
            Some((delay, driver)) => CollectionEmitter::with_debounce(*delay, driver.clone()),
            None => CollectionEmitter::new(),
        };
        let inner = Rc::new(RefCell::new(PagedInner {
            upstream: upstream.clone(),
            key_fn,
            page,
            page_size,
            window,
            emitter,
            listeners: ListenerSet::new(),
            subscription: None,
            disposed: false,
        }));
        if debounce.is_some() {
            install_flush_hook(&inner);
        }
        let id = forward_upstream(&inner, &upstream, PagedInner::apply_upstream);
        inner.borrow_mut().subscription = Some(id);
        Self { inner }
    }

    /// Current 1-based page number.
    pub fn page(&self) -> usize {
        self.inner.borrow().page
    }

    /// Current page size.
    pub fn page_size(&self) -> usize {
        self.inner.borrow().page_size
    }

    /// Moves the window. Unchanged `(page, page_size)` is a no-op; any
    /// actual move dispatches an ordered-only event.
    pub fn set_page(&self, page: usize, page_size: usize) {
        let change = {
            let mut inner = self.inner.borrow_mut();
            if inner.page == page && inner.page_size == page_size {
                return;
            }
            inner.page = page;
            inner.page_size = page_size;
            inner.paginate()
        };
        publish(&self.inner, change);
    }
}

impl<K, T> Source<K, T> for PagedView<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn key_fn(&self) -> KeyFn<K, T> {
        self.inner.borrow().key_fn.clone()
    }

    fn items(&self) -> Vec<Rc<T>> {
        self.inner.borrow().window.clone()
    }

    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        slice_range(&self.inner.borrow().window, start, end)
    }

    fn count(&self) -> usize {
        self.inner.borrow().window.len()
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
            inner.window.clear();
            (inner.upstream.clone(), inner.subscription.take())
        };
        if let Some(id) = subscription {
            upstream.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    fn nine_entries() -> sluice_collection::Collection<u64, Entry> {
        let source = entries();
        source
            .insert_many((1..=9).map(|id| entry(id, "e")))
            .unwrap();
        source
    }

    #[test]
    fn test_first_page() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 1, 3);

        assert_eq!(ids(&paged.items()), vec![1, 2, 3]);
        assert_eq!(paged.count(), 3);
        assert_eq!(paged.page(), 1);
        assert_eq!(paged.page_size(), 3);
    }

    #[test]
    fn test_set_page_moves_window() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 1, 3);
        let seen = capture(&paged);

        paged.set_page(3, 2);

        assert_eq!(ids(&paged.items()), vec![5, 6]);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ordered);
        assert_eq!(seen[0].len(), 0);
    }

    #[test]
    fn test_unchanged_set_page_is_noop() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 2, 3);
        let seen = capture(&paged);

        paged.set_page(2, 3);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_page_zero_clamps_to_first_window() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 0, 3);
        assert_eq!(ids(&paged.items()), vec![1, 2, 3]);
    }

    #[test]
    fn test_last_partial_page_and_beyond() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 5, 2);
        assert_eq!(ids(&paged.items()), vec![9]);

        paged.set_page(7, 2);
        assert!(paged.items().is_empty());
        assert_eq!(paged.count(), 0);
    }

    #[test]
    fn test_upstream_change_recomputes_window() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 1, 3);
        let seen = capture(&paged);

        source.remove_key(&1).unwrap();

        assert_eq!(ids(&paged.items()), vec![2, 3, 4]);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ordered);
    }

    #[test]
    fn test_items_range_within_window() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 2, 4);
        assert_eq!(ids(&paged.items()), vec![5, 6, 7, 8]);
        assert_eq!(ids(&paged.items_range(1, 3)), vec![6, 7]);
    }

    #[test]
    fn test_dispose_detaches() {
        let source = nine_entries();
        let paged = PagedView::new(as_source(&source), 1, 3);
        let seen = capture(&paged);

        paged.dispose();
        source.insert(entry(10, "e")).unwrap();

        assert!(seen.borrow().is_empty());
        assert_eq!(paged.count(), 0);
    }
}
