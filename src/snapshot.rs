//! Immutable, ordered snapshots and change detection.
//!
//! A [`Snapshot`] is the complete list for one collection as of one poll
//! cycle.  It is never mutated: a new cycle builds a new snapshot and the
//! poller decides, via [`ChangePolicy`], whether it replaces the accepted one.

use std::sync::Arc;

use serde::Deserialize;

use crate::item::Item;

/// An ordered, cheaply clonable list of items.
///
/// Items are ordered ascending by [`Item::sort_time`]; items without a time
/// go last.  The sort is stable, so equal keys keep the store's order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    items: Arc<[T]>,
}

impl<T: Item> Snapshot<T> {
    pub fn new(mut items: Vec<T>) -> Self {
        items.sort_by(|a, b| match (a.sort_time(), b.sort_time()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Self {
            items: items.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

impl<T: Item> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Returns `true` unless every item of `current` already appears in
/// `previous`.
///
/// This is a subset check, not an equality check: a snapshot that only lost
/// items is *not* a change.
pub fn has_changed<T: Item>(previous: &Snapshot<T>, current: &Snapshot<T>) -> bool {
    !current.items().iter().all(|item| previous.contains(item))
}

/// How a freshly fetched snapshot is compared against the accepted one.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ChangePolicy {
    /// Only items not seen in the accepted snapshot count as a change;
    /// removals alone leave the display as it is.
    #[default]
    NewItems,
    /// Any difference in content or order is a change.
    Exact,
}

impl ChangePolicy {
    pub fn detects<T: Item>(self, previous: &Snapshot<T>, current: &Snapshot<T>) -> bool {
        match self {
            ChangePolicy::NewItems => has_changed(previous, current),
            ChangePolicy::Exact => previous != current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::test_support::*;

    #[test]
    fn tasks_sort_by_due_with_undated_last() {
        let snap = Snapshot::new(vec![
            task("none", None),
            task("late", Some(day(9))),
            task("early", Some(day(1))),
        ]);
        let ids: Vec<_> = snap.items().iter().map(|t| t.entry_id.as_str()).collect();
        assert_eq!(ids, ["early", "late", "none"]);
    }

    #[test]
    fn equal_keys_keep_store_order() {
        let snap = Snapshot::new(vec![task("b", Some(day(1))), task("a", Some(day(1)))]);
        assert_eq!(snap.items()[0].entry_id, "b");
        assert_eq!(snap.items()[1].entry_id, "a");
    }

    #[test]
    fn occurrences_sort_by_start() {
        let snap = Snapshot::new(vec![
            appointment("late", day(2), 1),
            appointment("early", day(1), 5),
        ]);
        assert_eq!(snap.items()[0].entry_id, "early");
    }

    #[test]
    fn identical_snapshots_are_unchanged() {
        let a = Snapshot::new(vec![task("A", Some(day(5))), task("B", None)]);
        assert!(!has_changed(&a, &a.clone()));
    }

    #[test]
    fn shrinking_snapshot_is_not_a_change() {
        let previous = Snapshot::new(vec![task("A", Some(day(1))), task("B", Some(day(2)))]);
        let current = Snapshot::new(vec![task("A", Some(day(1)))]);
        assert!(!has_changed(&previous, &current));
    }

    #[test]
    fn empty_current_is_not_a_change() {
        let previous = Snapshot::new(vec![task("A", None)]);
        assert!(!has_changed(&previous, &Snapshot::empty()));
    }

    #[test]
    fn new_item_is_a_change() {
        let previous = Snapshot::new(vec![task("A", Some(day(5)))]);
        let current = Snapshot::new(vec![task("A", Some(day(5))), task("B", Some(day(3)))]);
        assert!(has_changed(&previous, &current));
        // Accepted snapshot is ordered by due date.
        assert_eq!(current.items()[0].entry_id, "B");
        assert_eq!(current.items()[1].entry_id, "A");
    }

    #[test]
    fn edited_field_is_a_change() {
        let previous = Snapshot::new(vec![task("A", Some(day(5)))]);
        let current = Snapshot::new(vec![task("A", Some(day(6)))]);
        assert!(has_changed(&previous, &current));
    }

    #[test]
    fn first_fetch_against_empty_is_a_change() {
        let current = Snapshot::new(vec![appointment("x", day(1), 1)]);
        assert!(has_changed(&Snapshot::empty(), &current));
    }

    #[test]
    fn exact_policy_sees_removals() {
        let previous = Snapshot::new(vec![task("A", None), task("B", None)]);
        let current = Snapshot::new(vec![task("A", None)]);
        assert!(!ChangePolicy::NewItems.detects(&previous, &current));
        assert!(ChangePolicy::Exact.detects(&previous, &current));
        assert!(!ChangePolicy::Exact.detects(&previous, &previous.clone()));
    }
}
