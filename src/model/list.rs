//! Row-based item list contract.
//!
//! The sync engine never owns the item list: the host does. The engine reads
//! and writes items by row, inserts and removes rows, and consumes change
//! events. Events are queued by the list while notifications are enabled and
//! drained by whoever drives the engine, one batch at a time. The engine turns
//! notifications off around its own writes so they never feed back into it.

use super::item::Item;

/// Stable row identity that survives rows moving around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

/// Change notification emitted by an [`ItemList`].
///
/// Row ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    RowsInserted { first: usize, last: usize },
    RowsRemoved { first: usize, last: usize, ids: Vec<RowId> },
    DataChanged { first: usize, last: usize },
}

/// The list model the sync engine drives.
pub trait ItemList {
    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Item at `row`.
    fn item(&self, row: usize) -> Option<&Item>;

    /// Identity of the row currently at `row`.
    fn row_id(&self, row: usize) -> Option<RowId>;

    /// Replace the item at `row`. Returns `false` if the row does not exist.
    fn set_item(&mut self, row: usize, item: Item) -> bool;

    /// Insert an item before `row`. Returns `false` if `row` is out of range.
    fn insert_item(&mut self, row: usize, item: Item) -> bool;

    /// Remove `count` rows starting at `row`, returning the removed items.
    fn remove_rows(&mut self, row: usize, count: usize) -> Vec<Item>;

    /// Maximum number of rows the engine may create.
    fn max_items(&self) -> usize;

    /// Attach (`true`) or detach (`false`) change notifications.
    fn set_notifications(&mut self, enabled: bool);

    /// Whether change notifications are attached.
    fn notifications_enabled(&self) -> bool;

    /// Drain queued change notifications.
    fn take_events(&mut self) -> Vec<ModelEvent>;

    /// Suppress generic side effects of the host during bulk engine writes.
    fn set_disabled(&mut self, disabled: bool);

    /// Whether the list is in a bulk engine write.
    fn is_disabled(&self) -> bool;

    /// Ask the host to persist the list again.
    fn mark_dirty(&mut self);

    /// Row of the first item with the given base name.
    fn find_row(&self, base_name: &str) -> Option<usize> {
        (0..self.row_count())
            .find(|&row| self.item(row).is_some_and(|item| item.base_name() == base_name))
    }
}

/// Default cap on rows created from files.
pub const DEFAULT_MAX_ITEMS: usize = 200;

/// Plain in-memory list model.
#[derive(Debug)]
pub struct MemoryList {
    rows: Vec<(RowId, Item)>,
    next_id: u64,
    max_items: usize,
    notifications: bool,
    events: Vec<ModelEvent>,
    disabled: bool,
    dirty: bool,
}

impl Default for MemoryList {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

impl MemoryList {
    /// Create an empty list with notifications attached.
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            rows: Vec::new(),
            next_id: 0,
            max_items,
            notifications: true,
            events: Vec::new(),
            disabled: false,
            dirty: false,
        }
    }

    /// Iterate over items in row order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.rows.iter().map(|(_, item)| item)
    }

    /// Whether the host was asked to persist the list again.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rename the item at `row`, as a user edit would.
    pub fn rename(&mut self, row: usize, base_name: &str) -> bool {
        let Some(mut item) = self.item(row).cloned() else {
            return false;
        };
        item.base_name = Some(base_name.to_string());
        self.set_item(row, item)
    }

    fn push_event(&mut self, event: ModelEvent) {
        if self.notifications {
            self.events.push(event);
        }
    }
}

impl ItemList for MemoryList {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn item(&self, row: usize) -> Option<&Item> {
        self.rows.get(row).map(|(_, item)| item)
    }

    fn row_id(&self, row: usize) -> Option<RowId> {
        self.rows.get(row).map(|(id, _)| *id)
    }

    fn set_item(&mut self, row: usize, item: Item) -> bool {
        let Some(slot) = self.rows.get_mut(row) else {
            return false;
        };
        slot.1 = item;
        self.push_event(ModelEvent::DataChanged {
            first: row,
            last: row,
        });
        true
    }

    fn insert_item(&mut self, row: usize, item: Item) -> bool {
        if row > self.rows.len() {
            return false;
        }
        let id = RowId(self.next_id);
        self.next_id += 1;
        self.rows.insert(row, (id, item));
        self.push_event(ModelEvent::RowsInserted {
            first: row,
            last: row,
        });
        true
    }

    fn remove_rows(&mut self, row: usize, count: usize) -> Vec<Item> {
        if count == 0 || row >= self.rows.len() {
            return Vec::new();
        }
        let end = (row + count).min(self.rows.len());
        let (ids, items): (Vec<_>, Vec<_>) = self.rows.drain(row..end).unzip();
        self.push_event(ModelEvent::RowsRemoved {
            first: row,
            last: end - 1,
            ids,
        });
        items
    }

    fn max_items(&self) -> usize {
        self.max_items
    }

    fn set_notifications(&mut self, enabled: bool) {
        self.notifications = enabled;
    }

    fn notifications_enabled(&self) -> bool {
        self.notifications
    }

    fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_ids_survive_moves() {
        let mut list = MemoryList::default();
        list.insert_item(0, Item::text("a"));
        let id_a = list.row_id(0).unwrap();
        list.insert_item(0, Item::text("b"));

        assert_eq!(list.row_id(1), Some(id_a));
        assert_ne!(list.row_id(0), Some(id_a));
    }

    #[test]
    fn test_events_queued_only_when_attached() {
        let mut list = MemoryList::default();
        list.insert_item(0, Item::text("a"));
        assert_eq!(
            list.take_events(),
            vec![ModelEvent::RowsInserted { first: 0, last: 0 }]
        );

        list.set_notifications(false);
        list.set_item(0, Item::text("b"));
        assert!(list.take_events().is_empty());
    }

    #[test]
    fn test_remove_rows_reports_ids() {
        let mut list = MemoryList::default();
        list.insert_item(0, Item::text("a"));
        list.insert_item(1, Item::text("b"));
        let id_b = list.row_id(1).unwrap();
        list.take_events();

        let removed = list.remove_rows(1, 5);

        assert_eq!(removed.len(), 1);
        assert_eq!(
            list.take_events(),
            vec![ModelEvent::RowsRemoved {
                first: 1,
                last: 1,
                ids: vec![id_b]
            }]
        );
    }

    #[test]
    fn test_insert_out_of_range_fails() {
        let mut list = MemoryList::default();
        assert!(!list.insert_item(1, Item::text("a")));
        assert_eq!(list.row_count(), 0);
    }

    #[test]
    fn test_find_row_by_base_name() {
        let mut list = MemoryList::default();
        list.insert_item(0, Item::text("a").named("first"));
        list.insert_item(1, Item::text("b").named("second"));
        assert_eq!(list.find_row("second"), Some(1));
        assert_eq!(list.find_row("third"), None);
    }
}
