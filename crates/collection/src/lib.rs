//! Keyed base collection for sluice pipelines.
//!
//! Defines the [`Source`] capability — the keyed, ordered, observable item
//! set every component exposes — and [`Collection`], the owning root of a
//! pipeline. Views from the companion views crate bind to any `Source`, so
//! they stack on a `Collection` or on each other interchangeably.

pub mod collection;
pub mod source;

pub use collection::{Collection, WeakCollection};
pub use source::{slice_range, KeyFn, Source};
