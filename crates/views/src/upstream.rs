//! Upstream subscription wiring shared by the engine-backed views.

use core::hash::Hash;
use sluice_collection::Source;
use sluice_event::{publish, ChangeBatch, EmitterHost, ListenerId, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Subscribes `inner` to `upstream`, forwarding batches through `apply`.
///
/// The callback captures only a `Weak`, so a view dropped without `dispose`
/// leaves an inert listener behind instead of a leak. `apply` runs under the
/// inner borrow and returns the view's own flushed batch; publication happens
/// after the borrow is released. A malformed upstream batch (one a
/// well-formed engine cannot produce) is dropped rather than propagated.
pub(crate) fn forward_upstream<I, K, T>(
    inner: &Rc<RefCell<I>>,
    upstream: &Rc<dyn Source<K, T>>,
    apply: fn(&mut I, &ChangeBatch<K, T>) -> Result<Option<ChangeBatch<K, T>>>,
) -> ListenerId
where
    I: EmitterHost<K, T> + 'static,
    K: Eq + Hash + 'static,
    T: 'static,
{
    let weak = Rc::downgrade(inner);
    upstream.subscribe(Rc::new(move |change| {
        let Some(cell) = weak.upgrade() else { return };
        let applied = apply(&mut cell.borrow_mut(), change);
        if let Ok(flushed) = applied {
            publish(&cell, flushed);
        }
    }))
}
