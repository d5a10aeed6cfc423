use std::collections::HashMap;

use crate::textbuf::MarkerHandle;

/// A recorded bookmark: a line-tracking marker plus the column the cursor
/// had when the mark was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub handle: MarkerHandle,
    pub col: usize,
}

/// Bookmark table keyed by single-letter label.
///
/// Lowercase labels are buffer-local. Uppercase labels are reserved for
/// cross-buffer marks; the table stores them the same way so a global store
/// can take them over later, but resolution here is always local.
#[derive(Debug, Default)]
pub struct MarkTable {
    entries: HashMap<char, Mark>,
}

impl MarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite a mark. Returns the displaced mark, if any, so
    /// the caller can release its marker. Non-letter labels are refused.
    pub fn set(&mut self, label: char, mark: Mark) -> Option<Mark> {
        if !label.is_ascii_alphabetic() {
            return None;
        }
        self.entries.insert(label, mark)
    }

    pub fn get(&self, label: char) -> Option<Mark> {
        self.entries.get(&label).copied()
    }

    /// Drop a stale entry (its marker was invalidated by the buffer).
    pub fn evict(&mut self, label: char) {
        self.entries.remove(&label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(n: usize, col: usize) -> Mark {
        Mark {
            handle: MarkerHandle(n),
            col,
        }
    }

    #[test]
    fn set_and_get() {
        let mut table = MarkTable::new();
        assert!(table.set('a', mark(0, 3)).is_none());
        assert_eq!(table.get('a'), Some(mark(0, 3)));
        assert_eq!(table.get('b'), None);
    }

    #[test]
    fn overwrite_returns_old_mark() {
        let mut table = MarkTable::new();
        table.set('a', mark(0, 1));
        assert_eq!(table.set('a', mark(1, 2)), Some(mark(0, 1)));
        assert_eq!(table.get('a'), Some(mark(1, 2)));
    }

    #[test]
    fn uppercase_labels_stored() {
        let mut table = MarkTable::new();
        table.set('Z', mark(4, 0));
        assert_eq!(table.get('Z'), Some(mark(4, 0)));
    }

    #[test]
    fn evict_removes_entry() {
        let mut table = MarkTable::new();
        table.set('a', mark(0, 0));
        table.evict('a');
        assert_eq!(table.get('a'), None);
    }
}
