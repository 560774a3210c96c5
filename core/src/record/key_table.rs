use std::collections::HashMap;

/// Ordered, deduplicating table of keys.
///
/// Keys keep their first-seen position; an index never changes for the
/// table's lifetime (until `clear`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTable {
    keys: Vec<String>,
    index: HashMap<String, u64>,
}

/// Where a key lands if added now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot {
    pub is_new: bool,
    pub index: u64,
}

impl KeySlot {
    /// Slot of any key in an empty table.
    pub const FRESH: KeySlot = KeySlot { is_new: true, index: 0 };
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Index `key` would receive if added now. Does not mutate.
    #[inline]
    pub fn potential_index(&self, key: &str) -> u64 {
        self.index.get(key).copied().unwrap_or(self.keys.len() as u64)
    }

    #[inline]
    pub fn slot(&self, key: &str) -> KeySlot {
        match self.index.get(key) {
            Some(&index) => KeySlot { is_new: false, index },
            None => KeySlot { is_new: true, index: self.keys.len() as u64 },
        }
    }

    /// Add `key`, returning `(is_new, index)`. Existing keys leave the table unchanged.
    pub fn add(&mut self, key: &str) -> (bool, u64) {
        if let Some(&existing) = self.index.get(key) {
            return (false, existing);
        }
        let index = self.keys.len() as u64;
        self.keys.push(key.to_owned());
        self.index.insert(key.to_owned(), index);
        (true, index)
    }

    #[inline]
    pub fn get(&self, index: u64) -> Option<&str> {
        usize::try_from(index).ok().and_then(|i| self.keys.get(i)).map(String::as_str)
    }

    #[inline]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assigns_insertion_order_indices() {
        let mut table = KeyTable::new();
        assert_eq!(table.add("a"), (true, 0));
        assert_eq!(table.add("b"), (true, 1));
        assert_eq!(table.add("a"), (false, 0));
        assert_eq!(table.keys(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn potential_index_does_not_mutate() {
        let mut table = KeyTable::new();
        table.add("x");
        assert_eq!(table.potential_index("x"), 0);
        assert_eq!(table.potential_index("y"), 1);
        assert_eq!(table.potential_index("z"), 1);
        assert_eq!(table.len(), 1);
        assert!(!table.contains("y"));
    }

    #[test]
    fn slot_matches_add() {
        let mut table = KeyTable::new();
        assert_eq!(table.slot("k"), KeySlot::FRESH);
        let (_, idx) = table.add("k");
        assert_eq!(table.slot("k"), KeySlot { is_new: false, index: idx });
    }

    #[test]
    fn clear_empties_table() {
        let mut table = KeyTable::new();
        table.add("a");
        table.clear();
        assert!(table.is_empty());
        assert!(!table.contains("a"));
        assert_eq!(table.add("b"), (true, 0));
        assert_eq!(table.get(0), Some("b"));
        assert_eq!(table.get(1), None);
    }
}
