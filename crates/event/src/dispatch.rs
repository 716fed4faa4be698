//! Dispatch plumbing shared by every collection and view.
//!
//! Components keep their state behind `Rc<RefCell<_>>` and publish batches
//! only after the borrow is released, so a listener can re-read the source
//! that is notifying it. `notify_all` additionally isolates listener
//! failures: a panicking listener is caught and discarded without starving
//! its siblings or corrupting emitter state.

use crate::change::ChangeBatch;
use crate::emitter::CollectionEmitter;
use crate::listener::{ChangeCallback, ListenerSet};
use core::hash::Hash;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Access to the emitter and listener set owned by a component.
///
/// Implemented by each collection/view inner state so the debounce flush
/// hook and the publish path can be shared.
pub trait EmitterHost<K, T> {
    /// The component's coalescing emitter.
    fn emitter_mut(&mut self) -> &mut CollectionEmitter<K, T>;

    /// The component's listener set.
    fn listeners(&self) -> &ListenerSet<K, T>;
}

/// Invokes every callback with the batch, isolating panics per listener.
pub fn notify_all<K, T>(callbacks: &[ChangeCallback<K, T>], change: &ChangeBatch<K, T>) {
    for callback in callbacks {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| callback(change)));
    }
}

/// Publishes a flushed batch, if any, to the host's listeners.
pub fn publish<H, K, T>(cell: &Rc<RefCell<H>>, change: Option<ChangeBatch<K, T>>)
where
    H: EmitterHost<K, T>,
{
    if let Some(change) = change {
        let callbacks = cell.borrow().listeners().snapshot();
        notify_all(&callbacks, &change);
    }
}

/// Wires the host's emitter to flush through a weak back-reference.
///
/// The hook is what the timer driver runs when a debounce interval elapses:
/// it forces the flush and publishes the result. Holding only a `Weak` keeps
/// a fired timer harmless after the component is gone.
pub fn install_flush_hook<H, K, T>(cell: &Rc<RefCell<H>>)
where
    H: EmitterHost<K, T> + 'static,
    K: Eq + Hash + 'static,
    T: 'static,
{
    let weak = Rc::downgrade(cell);
    let hook: Rc<dyn Fn()> = Rc::new(move || {
        let Some(cell) = weak.upgrade() else { return };
        let change = cell.borrow_mut().emitter_mut().flush();
        publish(&cell, change);
    });
    cell.borrow_mut().emitter_mut().set_flush_hook(hook);
}
