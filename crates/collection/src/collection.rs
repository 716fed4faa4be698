//! The keyed base collection.
//!
//! `Collection` owns the items. It keeps them in an `IndexMap` so insertion
//! order survives in-place updates, coalesces mutations through its own
//! emitter, and publishes batches only after internal borrows are released —
//! a listener may re-read the collection from inside its callback.

use crate::source::{slice_range, KeyFn, Source};
use core::hash::Hash;
use core::time::Duration;
use indexmap::IndexMap;
use sluice_event::{
    install_flush_hook, publish, ChangeBatch, ChangeCallback, CollectionEmitter, EmitterHost,
    ListenerId, ListenerSet, Result, TimerDriver,
};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub(crate) struct CollectionInner<K, T> {
    key_fn: KeyFn<K, T>,
    store: IndexMap<K, Rc<T>>,
    snapshot: Option<Vec<Rc<T>>>,
    emitter: CollectionEmitter<K, T>,
    listeners: ListenerSet<K, T>,
    disposed: bool,
}

impl<K: Eq + Hash, T> EmitterHost<K, T> for CollectionInner<K, T> {
    fn emitter_mut(&mut self) -> &mut CollectionEmitter<K, T> {
        &mut self.emitter
    }

    fn listeners(&self) -> &ListenerSet<K, T> {
        &self.listeners
    }
}

impl<K: Eq + Hash + Clone, T> CollectionInner<K, T> {
    fn snapshot_items(&mut self) -> &[Rc<T>] {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.store.values().cloned().collect());
        }
        self.snapshot.as_deref().unwrap_or(&[])
    }

    fn apply_insert(&mut self, item: Rc<T>) -> Result<Option<ChangeBatch<K, T>>> {
        let key = (self.key_fn)(&item);
        match self.store.get(&key) {
            Some(existing) if Rc::ptr_eq(existing, &item) => Ok(None),
            Some(_) => {
                let change = self.emitter.update_event(key.clone(), item.clone())?;
                // IndexMap keeps the slot's position on key reuse.
                self.store.insert(key, item);
                self.snapshot = None;
                Ok(change)
            }
            None => {
                let change = self.emitter.add_event(key.clone(), item.clone())?;
                self.store.insert(key, item);
                self.snapshot = None;
                Ok(change)
            }
        }
    }

    fn apply_remove(&mut self, key: &K) -> Result<Option<ChangeBatch<K, T>>> {
        match self.store.shift_remove(key) {
            Some(item) => {
                self.snapshot = None;
                self.emitter.remove_event(key.clone(), item)
            }
            None => Ok(None),
        }
    }
}

/// A keyed, insertion-ordered collection with coalesced change events.
///
/// The handle is a cheap `Rc` clone; every method takes `&self`.
pub struct Collection<K, T> {
    inner: Rc<RefCell<CollectionInner<K, T>>>,
}

impl<K, T> Clone for Collection<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> Collection<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    /// Creates an empty collection dispatching synchronously.
    pub fn new(key_fn: KeyFn<K, T>) -> Self {
        Self::build(key_fn, None)
    }

    /// Creates an empty collection that debounces dispatch by `delay`.
    pub fn with_debounce(key_fn: KeyFn<K, T>, delay: Duration, driver: Rc<dyn TimerDriver>) -> Self {
        Self::build(key_fn, Some((delay, driver)))
    }

    fn build(key_fn: KeyFn<K, T>, debounce: Option<(Duration, Rc<dyn TimerDriver>)>) -> Self {
        let emitter = match &debounce {
            Some((delay, driver)) => CollectionEmitter::with_debounce(*delay, driver.clone()),
            None => CollectionEmitter::new(),
        };
        let inner = Rc::new(RefCell::new(CollectionInner {
            key_fn,
            store: IndexMap::new(),
            snapshot: None,
            emitter,
            listeners: ListenerSet::new(),
            disposed: false,
        }));
        if debounce.is_some() {
            install_flush_hook(&inner);
        }
        Self { inner }
    }

    /// Inserts or replaces `item` under its derived key.
    ///
    /// Re-inserting the exact same `Rc` is a no-op. A new key appends and
    /// reports an addition; an existing key replaces in place, keeps the
    /// item's position, and reports an update.
    pub fn insert(&self, item: Rc<T>) -> Result<()> {
        let change = self.inner.borrow_mut().apply_insert(item)?;
        publish(&self.inner, change);
        Ok(())
    }

    /// Inserts every item inside one pause bracket; at most one batch.
    pub fn insert_many(&self, items: impl IntoIterator<Item = Rc<T>>) -> Result<()> {
        let change = {
            let mut inner = self.inner.borrow_mut();
            inner.emitter.pause_events();
            let mut applied = Ok(());
            for item in items {
                if let Err(err) = inner.apply_insert(item) {
                    applied = Err(err);
                    break;
                }
            }
            let flushed = inner.emitter.resume_events();
            applied?;
            flushed
        };
        publish(&self.inner, change);
        Ok(())
    }

    /// Removes the item under `key`. Absent keys are a no-op.
    pub fn remove_key(&self, key: &K) -> Result<()> {
        let change = self.inner.borrow_mut().apply_remove(key)?;
        publish(&self.inner, change);
        Ok(())
    }

    /// Removes every listed key inside one pause bracket.
    pub fn remove_keys(&self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        let change = {
            let mut inner = self.inner.borrow_mut();
            inner.emitter.pause_events();
            let mut applied = Ok(());
            for key in keys {
                if let Err(err) = inner.apply_remove(&key) {
                    applied = Err(err);
                    break;
                }
            }
            let flushed = inner.emitter.resume_events();
            applied?;
            flushed
        };
        publish(&self.inner, change);
        Ok(())
    }

    /// Removes every item, reporting one batch of removals.
    pub fn clear(&self) -> Result<()> {
        let change = {
            let mut inner = self.inner.borrow_mut();
            let drained = core::mem::take(&mut inner.store);
            inner.snapshot = None;
            inner.emitter.pause_events();
            let mut applied = Ok(());
            for (key, item) in drained {
                if let Err(err) = inner.emitter.remove_event(key, item) {
                    applied = Err(err);
                    break;
                }
            }
            let flushed = inner.emitter.resume_events();
            applied?;
            flushed
        };
        publish(&self.inner, change);
        Ok(())
    }

    /// Returns true if this exact `Rc` is held under its derived key.
    pub fn contains(&self, item: &Rc<T>) -> bool {
        let inner = self.inner.borrow();
        let key = (inner.key_fn)(item);
        inner
            .store
            .get(&key)
            .is_some_and(|held| Rc::ptr_eq(held, item))
    }

    /// Returns true if any item is held under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.borrow().store.contains_key(key)
    }

    /// Opens a pause bracket on the collection's emitter. Brackets nest.
    pub fn pause_events(&self) {
        self.inner.borrow_mut().emitter.pause_events();
    }

    /// Closes a pause bracket, publishing the folded batch if one is due.
    pub fn resume_events(&self) {
        let change = self.inner.borrow_mut().emitter.resume_events();
        publish(&self.inner, change);
    }

    /// Returns a non-owning handle.
    pub fn downgrade(&self) -> WeakCollection<K, T> {
        WeakCollection {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<K, T> Source<K, T> for Collection<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn key_fn(&self) -> KeyFn<K, T> {
        self.inner.borrow().key_fn.clone()
    }

    fn items(&self) -> Vec<Rc<T>> {
        self.inner.borrow_mut().snapshot_items().to_vec()
    }

    fn items_range(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        slice_range(self.inner.borrow_mut().snapshot_items(), start, end)
    }

    fn count(&self) -> usize {
        self.inner.borrow().emitter.len()
    }

    fn subscribe(&self, callback: ChangeCallback<K, T>) -> ListenerId {
        self.inner.borrow_mut().listeners.subscribe(callback)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.unsubscribe(id)
    }

    fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.disposed {
            return;
        }
        inner.emitter.dispose();
        inner.listeners.clear();
        inner.disposed = true;
    }
}

/// A non-owning collection handle.
///
/// Lets observers reach a collection without keeping it alive; `upgrade`
/// fails once every strong handle is gone.
pub struct WeakCollection<K, T> {
    inner: Weak<RefCell<CollectionInner<K, T>>>,
}

impl<K, T> Clone for WeakCollection<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> WeakCollection<K, T> {
    /// Recovers a strong handle if the collection still exists.
    pub fn upgrade(&self) -> Option<Collection<K, T>> {
        self.inner.upgrade().map(|inner| Collection { inner })
    }
}
