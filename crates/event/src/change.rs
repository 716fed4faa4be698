//! Change batch describing one coalesced notification.
//!
//! A `ChangeBatch` is the single value type crossing component boundaries: it
//! carries the minimal set of additions, updates and removals since the prior
//! dispatch, plus an `ordered` marker meaning "the relative order of the full
//! item list may have changed", orthogonal to the three sets.
//!
//! Invariant: a map field is `Some` iff its count is nonzero, and every count
//! equals its map's size. Consumers check counts, never map presence.

use core::hash::Hash;
use hashbrown::HashMap;
use std::rc::Rc;

/// One coalesced batch of changes to a keyed collection.
#[derive(Debug)]
pub struct ChangeBatch<K, T> {
    /// Number of added items.
    pub added_count: usize,
    /// Added items by key, present iff `added_count > 0`.
    pub added: Option<HashMap<K, Rc<T>>>,
    /// Number of updated items.
    pub updated_count: usize,
    /// Updated items by key, present iff `updated_count > 0`.
    pub updated: Option<HashMap<K, Rc<T>>>,
    /// Number of removed items.
    pub removed_count: usize,
    /// Removed items by key, present iff `removed_count > 0`.
    pub removed: Option<HashMap<K, Rc<T>>>,
    /// The full item order may have changed.
    pub ordered: bool,
}

impl<K, T> Default for ChangeBatch<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> ChangeBatch<K, T> {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self {
            added_count: 0,
            added: None,
            updated_count: 0,
            updated: None,
            removed_count: 0,
            removed: None,
            ordered: false,
        }
    }

    /// Builds a batch from optional maps, normalizing counts to map sizes.
    ///
    /// Empty maps are dropped so the presence invariant holds by
    /// construction.
    pub fn from_parts(
        added: Option<HashMap<K, Rc<T>>>,
        updated: Option<HashMap<K, Rc<T>>>,
        removed: Option<HashMap<K, Rc<T>>>,
        ordered: bool,
    ) -> Self {
        let added = added.filter(|m| !m.is_empty());
        let updated = updated.filter(|m| !m.is_empty());
        let removed = removed.filter(|m| !m.is_empty());
        Self {
            added_count: added.as_ref().map_or(0, HashMap::len),
            updated_count: updated.as_ref().map_or(0, HashMap::len),
            removed_count: removed.as_ref().map_or(0, HashMap::len),
            added,
            updated,
            removed,
            ordered,
        }
    }

    /// Returns true if the batch reports no changes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added_count == 0 && self.updated_count == 0 && self.removed_count == 0 && !self.ordered
    }

    /// Returns the total number of keyed changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added_count + self.updated_count + self.removed_count
    }

    /// Returns true if any item was added.
    #[inline]
    pub fn has_added(&self) -> bool {
        self.added_count > 0
    }

    /// Returns true if any item was updated.
    #[inline]
    pub fn has_updated(&self) -> bool {
        self.updated_count > 0
    }

    /// Returns true if any item was removed.
    #[inline]
    pub fn has_removed(&self) -> bool {
        self.removed_count > 0
    }

    /// Iterates the added entries.
    pub fn iter_added(&self) -> impl Iterator<Item = (&K, &Rc<T>)> {
        self.added.iter().flat_map(HashMap::iter)
    }

    /// Iterates the updated entries.
    pub fn iter_updated(&self) -> impl Iterator<Item = (&K, &Rc<T>)> {
        self.updated.iter().flat_map(HashMap::iter)
    }

    /// Iterates the removed entries.
    pub fn iter_removed(&self) -> impl Iterator<Item = (&K, &Rc<T>)> {
        self.removed.iter().flat_map(HashMap::iter)
    }
}

impl<K: Clone, T> Clone for ChangeBatch<K, T> {
    fn clone(&self) -> Self {
        Self {
            added_count: self.added_count,
            added: self.added.clone(),
            updated_count: self.updated_count,
            updated: self.updated.clone(),
            removed_count: self.removed_count,
            removed: self.removed.clone(),
            ordered: self.ordered,
        }
    }
}

impl<K: Eq + Hash, T: PartialEq> PartialEq for ChangeBatch<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.added_count == other.added_count
            && self.added == other.added
            && self.updated_count == other.updated_count
            && self.updated == other.updated
            && self.removed_count == other.removed_count
            && self.removed == other.removed
            && self.ordered == other.ordered
    }
}
