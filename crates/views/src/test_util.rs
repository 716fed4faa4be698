//! Shared fixtures for the view tests.

use sluice_collection::{Collection, Source};
use sluice_event::ChangeBatch;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, PartialEq)]
pub(crate) struct Entry {
    pub id: u64,
    pub label: &'static str,
}

pub(crate) fn entry(id: u64, label: &'static str) -> Rc<Entry> {
    Rc::new(Entry { id, label })
}

pub(crate) fn entries() -> Collection<u64, Entry> {
    Collection::new(Rc::new(|e: &Entry| e.id))
}

pub(crate) fn as_source(collection: &Collection<u64, Entry>) -> Rc<dyn Source<u64, Entry>> {
    Rc::new(collection.clone())
}

pub(crate) fn capture(
    source: &impl Source<u64, Entry>,
) -> Rc<RefCell<Vec<ChangeBatch<u64, Entry>>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    source.subscribe(Rc::new(move |change: &ChangeBatch<u64, Entry>| {
        sink.borrow_mut().push(change.clone())
    }));
    seen
}

pub(crate) fn ids(items: &[Rc<Entry>]) -> Vec<u64> {
    items.iter().map(|e| e.id).collect()
}

pub(crate) fn added_keys(change: &ChangeBatch<u64, Entry>) -> Vec<u64> {
    let mut keys: Vec<u64> = change.iter_added().map(|(k, _)| *k).collect();
    keys.sort_unstable();
    keys
}

pub(crate) fn updated_keys(change: &ChangeBatch<u64, Entry>) -> Vec<u64> {
    let mut keys: Vec<u64> = change.iter_updated().map(|(k, _)| *k).collect();
    keys.sort_unstable();
    keys
}

pub(crate) fn removed_keys(change: &ChangeBatch<u64, Entry>) -> Vec<u64> {
    let mut keys: Vec<u64> = change.iter_removed().map(|(k, _)| *k).collect();
    keys.sort_unstable();
    keys
}
