//! Composable views over sluice collections.
//!
//! Each view binds to one upstream [`Source`](sluice_collection::Source),
//! derives a synchronized item set from it, and is itself a `Source`, so
//! views stack into pipelines: filter, then sort, then page, with a
//! selection alongside. Upstream diffs are translated into downstream diffs
//! through each view's own coalescing emitter; nothing re-scans on read
//! beyond what the view's semantics require.

pub mod filtered;
pub mod paged;
pub mod searched;
pub mod selected;
pub mod sorted;
mod upstream;

#[cfg(test)]
mod test_util;

pub use filtered::{FilterFn, FilteredView};
pub use paged::PagedView;
pub use searched::{SearchFn, SearchedView};
pub use selected::SelectedView;
pub use sorted::{SortFn, SortedView};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use sluice_collection::Source;
    use sluice_event::ManualTimerDriver;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_pipeline_propagates_inserts() {
        let source = entries();

        let filtered = FilteredView::new(
            as_source(&source),
            Some(Rc::new(|e: &Entry| e.label != "hidden")),
        );
        let sorted = SortedView::new(
            Rc::new(filtered.clone()),
            Some(Rc::new(|a: &Entry, b: &Entry| a.label.cmp(b.label))),
        );
        let paged = PagedView::new(Rc::new(sorted.clone()), 1, 10);

        source.insert(entry(1, "walnut")).unwrap();
        source.insert(entry(2, "almond")).unwrap();
        source.insert(entry(3, "hidden")).unwrap();

        assert_eq!(ids(&paged.items()), vec![2, 1]);
        assert_eq!(paged.count(), 2);
    }

    #[test]
    fn test_pipeline_window_follows_upstream_removal() {
        let source = entries();
        source
            .insert_many((1..=6).map(|id| entry(id, "e")))
            .unwrap();

        let filtered = FilteredView::new(as_source(&source), None);
        let paged = PagedView::new(Rc::new(filtered.clone()), 2, 2);
        assert_eq!(ids(&paged.items()), vec![3, 4]);

        let seen = capture(&paged);
        source.remove_key(&1).unwrap();

        assert_eq!(ids(&paged.items()), vec![4, 5]);
        assert!(seen.borrow()[0].ordered);
    }

    #[test]
    fn test_selection_tracks_filtered_pipeline() {
        let source = entries();
        source.insert(entry(1, "keep")).unwrap();
        source.insert(entry(2, "drop")).unwrap();

        let filtered = FilteredView::new(
            as_source(&source),
            Some(Rc::new(|e: &Entry| e.label == "keep")),
        );
        let selected = SelectedView::new(Rc::new(filtered.clone()));
        selected.select_all().unwrap();
        assert_eq!(ids(&selected.items()), vec![1]);

        // Renaming the member upstream flows through the filter into the
        // selection as an eviction.
        source.insert(entry(1, "drop")).unwrap();
        assert_eq!(selected.count(), 0);
    }

    #[test]
    fn test_debounced_view_folds_upstream_bursts() {
        let driver = Rc::new(ManualTimerDriver::new());
        let source = entries();
        let filtered = FilteredView::with_debounce(
            as_source(&source),
            Some(Rc::new(|e: &Entry| e.id % 2 == 1)),
            Duration::from_millis(5),
            driver.clone(),
        );
        let seen = capture(&filtered);

        for id in 1..=4 {
            source.insert(entry(id, "e")).unwrap();
        }
        assert!(seen.borrow().is_empty());
        assert_eq!(driver.pending(), 1);

        driver.fire_next();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(added_keys(&seen[0]), vec![1, 3]);
    }

    #[test]
    fn test_sibling_views_do_not_interfere() {
        let source = entries();
        source.insert(entry(1, "one")).unwrap();
        source.insert(entry(2, "two")).unwrap();

        let odd = FilteredView::new(as_source(&source), Some(Rc::new(|e: &Entry| e.id % 2 == 1)));
        let even = FilteredView::new(as_source(&source), Some(Rc::new(|e: &Entry| e.id % 2 == 0)));

        source.insert(entry(3, "three")).unwrap();

        assert_eq!(ids(&odd.items()), vec![1, 3]);
        assert_eq!(ids(&even.items()), vec![2]);

        odd.dispose();
        source.insert(entry(4, "four")).unwrap();
        assert_eq!(ids(&even.items()), vec![2, 4]);
    }
}
