//! Timer facility for debounced dispatch.
//!
//! The emitter never sleeps or spawns threads; when a debounce interval is
//! configured it asks a host-provided `TimerDriver` to run a flush callback
//! after the interval. `ManualTimerDriver` is the cooperative implementation
//! used by tests and by hosts that pump timers from their own loop.

use core::time::Duration;
use std::cell::RefCell;

/// Identifier for a scheduled timer.
pub type TimerId = u64;

/// Host timer facility.
///
/// Implementations decide when (and on what loop) the callback runs; the
/// emitter only requires that a cancelled timer never fires.
pub trait TimerDriver {
    /// Schedules `callback` to run once after `delay`.
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancels a scheduled timer. Unknown ids are ignored.
    fn cancel(&self, id: TimerId);
}

struct ScheduledTimer {
    id: TimerId,
    delay: Duration,
    callback: Box<dyn FnOnce()>,
}

/// A driver that queues callbacks until the host fires them explicitly.
pub struct ManualTimerDriver {
    state: RefCell<ManualState>,
}

struct ManualState {
    next_id: TimerId,
    pending: Vec<ScheduledTimer>,
}

impl Default for ManualTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimerDriver {
    /// Creates a driver with no scheduled timers.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(ManualState {
                next_id: 1,
                pending: Vec::new(),
            }),
        }
    }

    /// Returns the number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Returns the delay of the next scheduled timer, if any.
    pub fn next_delay(&self) -> Option<Duration> {
        self.state.borrow().pending.first().map(|t| t.delay)
    }

    /// Fires the oldest scheduled timer. Returns false if none were pending.
    ///
    /// The callback runs with no internal borrows held, so it may schedule
    /// or cancel further timers.
    pub fn fire_next(&self) -> bool {
        let timer = {
            let mut state = self.state.borrow_mut();
            if state.pending.is_empty() {
                None
            } else {
                Some(state.pending.remove(0))
            }
        };
        match timer {
            Some(timer) => {
                (timer.callback)();
                true
            }
            None => false,
        }
    }

    /// Fires every timer scheduled so far, in order.
    pub fn fire_all(&self) {
        while self.fire_next() {}
    }
}

impl TimerDriver for ManualTimerDriver {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.pending.push(ScheduledTimer { id, delay, callback });
        id
    }

    fn cancel(&self, id: TimerId) {
        self.state.borrow_mut().pending.retain(|t| t.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_schedule_and_fire() {
        let driver = ManualTimerDriver::new();
        let fired = Rc::new(RefCell::new(0));

        let fired_clone = fired.clone();
        driver.schedule(Duration::from_millis(5), Box::new(move || *fired_clone.borrow_mut() += 1));

        assert_eq!(driver.pending(), 1);
        assert_eq!(driver.next_delay(), Some(Duration::from_millis(5)));
        assert_eq!(*fired.borrow(), 0);

        assert!(driver.fire_next());
        assert_eq!(*fired.borrow(), 1);
        assert_eq!(driver.pending(), 0);
        assert!(!driver.fire_next());
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let driver = ManualTimerDriver::new();
        let fired = Rc::new(RefCell::new(false));

        let fired_clone = fired.clone();
        let id = driver.schedule(Duration::from_millis(1), Box::new(move || *fired_clone.borrow_mut() = true));
        driver.cancel(id);

        driver.fire_all();
        assert!(!*fired.borrow());
    }

    #[test]
    fn test_fire_all_in_order() {
        let driver = ManualTimerDriver::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            driver.schedule(Duration::from_millis(1), Box::new(move || order.borrow_mut().push(n)));
        }

        driver.fire_all();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_callback_may_reschedule() {
        let driver = Rc::new(ManualTimerDriver::new());

        let inner = driver.clone();
        driver.schedule(
            Duration::from_millis(1),
            Box::new(move || {
                inner.schedule(Duration::from_millis(1), Box::new(|| {}));
            }),
        );

        assert!(driver.fire_next());
        assert_eq!(driver.pending(), 1);
    }
}
