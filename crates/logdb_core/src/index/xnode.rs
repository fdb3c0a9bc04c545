//! Per-column value index.

use crate::index::key::IndexKey;
use std::collections::BTreeMap;

/// Index of one column: distinct value to the sorted slots holding it.
///
/// Slots are positions in the owning [`super::XTree`]'s id table. A slot
/// appears at most once per value.
///
/// # Example
///
/// ```rust,ignore
/// let mut node = XNode::default();
/// node.insert(IndexKey::Text("john".into()), 0);
/// assert_eq!(node.matches(&IndexKey::Text("oh".into())), vec![0]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XNode {
    entries: BTreeMap<IndexKey, Vec<u32>>,
}

impl XNode {
    /// Creates a node from persisted entries.
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = (IndexKey, Vec<u32>)>) -> Self {
        let mut node = Self::default();
        for (key, slots) in entries {
            for slot in slots {
                node.insert(key.clone(), slot);
            }
        }
        node
    }

    /// Adds `slot` under `key`. Returns false if it was already there.
    pub fn insert(&mut self, key: IndexKey, slot: u32) -> bool {
        let slots = self.entries.entry(key).or_default();
        match slots.binary_search(&slot) {
            Ok(_) => false,
            Err(pos) => {
                slots.insert(pos, slot);
                true
            }
        }
    }

    /// Removes `slot` from under `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &IndexKey, slot: u32) -> bool {
        let Some(slots) = self.entries.get_mut(key) else {
            return false;
        };
        let Ok(pos) = slots.binary_search(&slot) else {
            return false;
        };
        slots.remove(pos);
        if slots.is_empty() {
            self.entries.remove(key);
        }
        true
    }

    /// Slots matching `query`.
    ///
    /// Text queries match every text value containing the query as a
    /// substring (an exact match included), in value order. Other queries
    /// match by equality.
    #[must_use]
    pub fn matches(&self, query: &IndexKey) -> Vec<u32> {
        match query {
            IndexKey::Text(needle) => self
                .entries
                .range(IndexKey::Text(String::new())..)
                .take_while(|(key, _)| matches!(key, IndexKey::Text(_)))
                .filter(|(key, _)| key.as_text().is_some_and(|s| s.contains(needle.as_str())))
                .flat_map(|(_, slots)| slots.iter().copied())
                .collect(),
            other => self.entries.get(other).cloned().unwrap_or_default(),
        }
    }

    /// Number of slots [`matches`](Self::matches) would return.
    #[must_use]
    pub fn count(&self, query: &IndexKey) -> usize {
        match query {
            IndexKey::Text(needle) => self
                .entries
                .range(IndexKey::Text(String::new())..)
                .take_while(|(key, _)| matches!(key, IndexKey::Text(_)))
                .filter(|(key, _)| key.as_text().is_some_and(|s| s.contains(needle.as_str())))
                .map(|(_, slots)| slots.len())
                .sum(),
            other => self.entries.get(other).map_or(0, Vec::len),
        }
    }

    /// Returns true if `slot` is held under exactly `key`.
    #[must_use]
    pub fn holds(&self, key: &IndexKey, slot: u32) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slots| slots.binary_search(&slot).is_ok())
    }

    /// Number of `(value, slot)` pairs.
    #[must_use]
    pub fn pairs(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if no value is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(value, slots)` in value order.
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &[u32])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> IndexKey {
        IndexKey::Text(s.to_string())
    }

    #[test]
    fn insert_keeps_slots_sorted_without_duplicates() {
        let mut node = XNode::default();
        assert!(node.insert(text("a"), 5));
        assert!(node.insert(text("a"), 1));
        assert!(!node.insert(text("a"), 5));

        assert_eq!(node.matches(&text("a")), vec![1, 5]);
        assert_eq!(node.pairs(), 2);
        assert!(node.holds(&text("a"), 5));
        assert!(!node.holds(&text("a"), 2));
    }

    #[test]
    fn substring_search() {
        let mut node = XNode::default();
        node.insert(text("john"), 0);
        node.insert(text("johnny"), 1);
        node.insert(text("mary"), 2);
        node.insert(IndexKey::Integer(7), 3);

        assert_eq!(node.matches(&text("john")), vec![0, 1]);
        assert_eq!(node.matches(&text("ar")), vec![2]);
        assert_eq!(node.count(&text("")), 3);
        assert_eq!(node.matches(&IndexKey::Integer(7)), vec![3]);
        assert!(node.matches(&IndexKey::Integer(8)).is_empty());
    }

    #[test]
    fn remove_drops_empty_values() {
        let mut node = XNode::default();
        node.insert(IndexKey::Bool(true), 0);
        node.insert(IndexKey::Bool(true), 1);

        assert!(node.remove(&IndexKey::Bool(true), 0));
        assert!(!node.remove(&IndexKey::Bool(true), 0));
        assert_eq!(node.count(&IndexKey::Bool(true)), 1);

        assert!(node.remove(&IndexKey::Bool(true), 1));
        assert!(node.is_empty());
    }
}
