//! Coalesced change events for keyed collections.
//!
//! This crate is the event backbone of sluice. It defines the batch value
//! type ([`ChangeBatch`]), the coalescing engine that folds raw per-key
//! mutations into minimal batches ([`CollectionEmitter`]), listener
//! bookkeeping ([`ListenerSet`]), the timer abstraction used for debounced
//! dispatch ([`TimerDriver`]), and the shared dispatch plumbing that lets
//! `Rc<RefCell<_>>`-backed components publish without holding borrows.
//!
//! Collections and views in the companion crates compose these parts; this
//! crate knows nothing about item storage or ordering.

pub mod change;
pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod listener;
pub mod timer;

pub use change::ChangeBatch;
pub use dispatch::{install_flush_hook, notify_all, publish, EmitterHost};
pub use emitter::CollectionEmitter;
pub use error::{Result, TransitionError};
pub use listener::{ChangeCallback, ListenerId, ListenerSet};
pub use timer::{ManualTimerDriver, TimerDriver, TimerId};
