//! The change-event coalescing engine.
//!
//! `CollectionEmitter` turns a stream of raw per-key mutations into minimal
//! `ChangeBatch` values. Within one pause bracket (or one debounce window)
//! every touched key ends up with exactly one classification — added,
//! updated or removed — and sequences that cancel out net to nothing.
//!
//! The engine holds no listeners. Every operation that can complete a batch
//! returns the dispatched `ChangeBatch`, and the owning collection or view
//! publishes it to its own listener set. This keeps dispatch free of nested
//! borrows and lets one engine serve internal shadow state as well as the
//! public notification surface.
//!
//! # Transition rules
//!
//! The pending batch maps each key to a tagged classification. Applying a
//! new raw event pattern-matches on the current one:
//!
//! - add over `Removed` → `Updated` (the value changed, it never left)
//! - add over `Added`/`Updated` → [`TransitionError::DuplicateAdd`]
//! - update over `Added` → `Added` with the new value
//! - update over `Removed` → [`TransitionError::UpdateAfterRemove`]
//! - remove over `Added` → the key drops out of the batch entirely
//! - remove over `Updated` → `Removed`
//! - remove over `Removed` → [`TransitionError::DuplicateRemove`]

use crate::change::ChangeBatch;
use crate::error::{Result, TransitionError};
use crate::timer::{TimerDriver, TimerId};
use core::hash::Hash;
use core::time::Duration;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use std::rc::Rc;

/// Net classification of one key within a pending batch.
enum PendingChange<T> {
    Added(Rc<T>),
    Updated(Rc<T>),
    Removed(Rc<T>),
}

/// The batch under construction between dispatches.
struct PendingBatch<K, T> {
    changes: HashMap<K, PendingChange<T>>,
    ordered: bool,
}

impl<K: Eq + Hash, T> PendingBatch<K, T> {
    fn new() -> Self {
        Self {
            changes: HashMap::new(),
            ordered: false,
        }
    }

    fn into_batch(self) -> ChangeBatch<K, T> {
        let mut added = HashMap::new();
        let mut updated = HashMap::new();
        let mut removed = HashMap::new();
        for (key, change) in self.changes {
            match change {
                PendingChange::Added(item) => added.insert(key, item),
                PendingChange::Updated(item) => updated.insert(key, item),
                PendingChange::Removed(item) => removed.insert(key, item),
            };
        }
        ChangeBatch::from_parts(Some(added), Some(updated), Some(removed), self.ordered)
    }
}

/// Coalesces raw per-key mutations into minimal change batches.
pub struct CollectionEmitter<K, T> {
    pending: Option<PendingBatch<K, T>>,
    paused: u32,
    count: usize,
    debounce: Option<Duration>,
    driver: Option<Rc<dyn TimerDriver>>,
    timer: Option<TimerId>,
    flush_hook: Option<Rc<dyn Fn()>>,
    disposed: bool,
}

impl<K: Eq + Hash, T> Default for CollectionEmitter<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, T> CollectionEmitter<K, T> {
    /// Creates an engine that dispatches synchronously.
    pub fn new() -> Self {
        Self {
            pending: None,
            paused: 0,
            count: 0,
            debounce: None,
            driver: None,
            timer: None,
            flush_hook: None,
            disposed: false,
        }
    }

    /// Creates an engine that defers dispatch by `delay` on the given driver.
    pub fn with_debounce(delay: Duration, driver: Rc<dyn TimerDriver>) -> Self {
        Self {
            debounce: Some(delay),
            driver: Some(driver),
            ..Self::new()
        }
    }

    /// Sets the callback the timer driver runs to force a deferred flush.
    pub fn set_flush_hook(&mut self, hook: Rc<dyn Fn()>) {
        self.flush_hook = Some(hook);
    }

    /// Returns the engine-tracked item count.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the tracked item count is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if at least one pause bracket is open.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused > 0
    }

    /// Classifies `key` as added. The tracked item count grows by one.
    pub fn add_event(&mut self, key: K, item: Rc<T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            self.count += 1;
            return Ok(None);
        }
        let pending = self.pending.get_or_insert_with(PendingBatch::new);
        match pending.changes.entry(key) {
            Entry::Occupied(mut slot) => match slot.get() {
                PendingChange::Removed(_) => {
                    // The key never left within this batch; net effect is a
                    // value change.
                    slot.insert(PendingChange::Updated(item));
                }
                PendingChange::Added(_) | PendingChange::Updated(_) => {
                    return Err(TransitionError::DuplicateAdd)
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(PendingChange::Added(item));
            }
        }
        self.count += 1;
        Ok(self.send_event(false))
    }

    /// Classifies `key` as updated, or refreshes its pending value.
    pub fn update_event(&mut self, key: K, item: Rc<T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            return Ok(None);
        }
        let pending = self.pending.get_or_insert_with(PendingBatch::new);
        match pending.changes.entry(key) {
            Entry::Occupied(mut slot) => match slot.get() {
                PendingChange::Added(_) => {
                    slot.insert(PendingChange::Added(item));
                }
                PendingChange::Updated(_) => {
                    slot.insert(PendingChange::Updated(item));
                }
                PendingChange::Removed(_) => return Err(TransitionError::UpdateAfterRemove),
            },
            Entry::Vacant(slot) => {
                slot.insert(PendingChange::Updated(item));
            }
        }
        Ok(self.send_event(false))
    }

    /// Classifies `key` as removed. The tracked item count shrinks by one.
    pub fn remove_event(&mut self, key: K, item: Rc<T>) -> Result<Option<ChangeBatch<K, T>>> {
        if self.disposed {
            self.count = self.count.saturating_sub(1);
            return Ok(None);
        }
        let pending = self.pending.get_or_insert_with(PendingBatch::new);
        match pending.changes.entry(key) {
            Entry::Occupied(mut slot) => match slot.get() {
                PendingChange::Added(_) => {
                    // Added then removed within one batch nets to nothing.
                    slot.remove();
                }
                PendingChange::Updated(_) => {
                    slot.insert(PendingChange::Removed(item));
                }
                PendingChange::Removed(_) => return Err(TransitionError::DuplicateRemove),
            },
            Entry::Vacant(slot) => {
                slot.insert(PendingChange::Removed(item));
            }
        }
        self.count = self.count.saturating_sub(1);
        Ok(self.send_event(false))
    }

    /// Marks the batch as order-changing without touching any key.
    pub fn ordered_event(&mut self) -> Option<ChangeBatch<K, T>> {
        if self.disposed {
            return None;
        }
        self.pending.get_or_insert_with(PendingBatch::new).ordered = true;
        self.send_event(false)
    }

    /// Opens a pause bracket. Brackets nest.
    pub fn pause_events(&mut self) {
        self.paused += 1;
    }

    /// Closes a pause bracket, dispatching when the outermost one closes.
    pub fn resume_events(&mut self) -> Option<ChangeBatch<K, T>> {
        self.paused = self.paused.saturating_sub(1);
        if self.paused == 0 {
            self.send_event(false)
        } else {
            None
        }
    }

    /// Forces an immediate flush, consuming any scheduled debounce timer.
    pub fn flush(&mut self) -> Option<ChangeBatch<K, T>> {
        if let (Some(driver), Some(id)) = (self.driver.as_ref(), self.timer.take()) {
            driver.cancel(id);
        }
        self.send_event(true)
    }

    /// Applies a whole upstream batch through the per-key transition rules
    /// inside one pause bracket.
    ///
    /// This is how pass-through views re-publish upstream events through
    /// their own engine: folding consecutive upstream batches (for example
    /// under debounce) stays coherent because each upstream batch is itself
    /// a well-formed net.
    pub fn replay(&mut self, change: &ChangeBatch<K, T>) -> Result<Option<ChangeBatch<K, T>>>
    where
        K: Clone,
    {
        self.pause_events();
        let applied = self.replay_changes(change);
        let flushed = self.resume_events();
        applied.map(|()| flushed)
    }

    fn replay_changes(&mut self, change: &ChangeBatch<K, T>) -> Result<()>
    where
        K: Clone,
    {
        for (key, item) in change.iter_added() {
            self.add_event(key.clone(), item.clone())?;
        }
        for (key, item) in change.iter_updated() {
            self.update_event(key.clone(), item.clone())?;
        }
        for (key, item) in change.iter_removed() {
            self.remove_event(key.clone(), item.clone())?;
        }
        if change.ordered {
            self.ordered_event();
        }
        Ok(())
    }

    /// Cancels any scheduled timer and stops further event accumulation.
    ///
    /// The tracked item count keeps working so an owner may still mutate
    /// its store after teardown.
    pub fn dispose(&mut self) {
        if let (Some(driver), Some(id)) = (self.driver.as_ref(), self.timer.take()) {
            driver.cancel(id);
        }
        self.pending = None;
        self.flush_hook = None;
        self.disposed = true;
    }

    /// Attempts dispatch; returns the batch when one is due now.
    fn send_event(&mut self, immediate: bool) -> Option<ChangeBatch<K, T>> {
        if self.paused > 0 {
            return None;
        }
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| p.ordered || !p.changes.is_empty());
        if !ready {
            return None;
        }
        if !immediate && self.debounce.is_some() {
            if self.timer.is_none() {
                self.schedule_flush();
            }
            if self.timer.is_some() {
                return None;
            }
            // No driver or hook is wired; dispatch synchronously instead of
            // dropping the batch.
        }
        self.pending.take().map(PendingBatch::into_batch)
    }

    fn schedule_flush(&mut self) {
        let (Some(delay), Some(driver), Some(hook)) =
            (self.debounce, self.driver.as_ref(), self.flush_hook.as_ref())
        else {
            return;
        };
        let hook = hook.clone();
        self.timer = Some(driver.schedule(delay, Box::new(move || hook())));
    }
}


#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    const KEYS: [&str; 4] = ["a", "b", "c", "d"];

    proptest! {
        /// From any legal op sequence, the coalesced classification of each
        /// key is fully determined by whether it was present before the
        /// batch, present after it, and touched at all; the reported value
        /// is always the one carried by the last op.
        #[test]
        fn net_classification(
            init in proptest::collection::vec(any::<bool>(), 4),
            ops in proptest::collection::vec((any::<u8>(), 0..4usize), 0..40),
        ) {
            let mut emitter: CollectionEmitter<&str, i32> = CollectionEmitter::new();
            emitter.pause_events();

            let mut present = init.clone();
            let mut touched = [false; 4];
            let mut last: Vec<Option<Rc<i32>>> = vec![None; 4];
            let mut counter = 0;

            for (selector, ki) in ops {
                counter += 1;
                let item = Rc::new(counter);
                let key = KEYS[ki];
                if present[ki] {
                    if selector % 2 == 0 {
                        emitter.update_event(key, item.clone()).unwrap();
                    } else {
                        emitter.remove_event(key, item.clone()).unwrap();
                        present[ki] = false;
                    }
                } else {
                    emitter.add_event(key, item.clone()).unwrap();
                    present[ki] = true;
                }
                touched[ki] = true;
                last[ki] = Some(item);
            }

            let mut added = HashMap::new();
            let mut updated = HashMap::new();
            let mut removed = HashMap::new();
            for ki in 0..4 {
                if !touched[ki] {
                    continue;
                }
                let item = last[ki].clone().expect("touched key has a last value");
                match (init[ki], present[ki]) {
                    (false, true) => {
                        added.insert(KEYS[ki], item);
                    }
                    (true, true) => {
                        updated.insert(KEYS[ki], item);
                    }
                    (true, false) => {
                        removed.insert(KEYS[ki], item);
                    }
                    (false, false) => {}
                }
            }
            let expected =
                ChangeBatch::from_parts(Some(added), Some(updated), Some(removed), false);

            match emitter.resume_events() {
                Some(change) => prop_assert_eq!(change, expected),
                None => prop_assert!(expected.is_empty()),
            }
        }
    }
}
