//! Secondary index over a table's records.
//!
//! ## Slots
//!
//! Every indexed record owns a *slot*: a stable position in the `base`
//! table, which maps slot to record id. Column nodes store slots, never
//! ids. Deleting a record tombstones its slot and puts it on a free list;
//! no other slot ever moves, so node entries stay valid without shifting.
//!
//! ## Persistence
//!
//! The index is stored in the table's `XINDEX` file:
//!
//! ```text
//! { base: [id | null, ...], tree: { column: [{ value, indexes: [slot, ...] }, ...] } }
//! ```
//!
//! The log files are the source of truth. An index whose live length does
//! not match the log record count is discarded and rebuilt.

use crate::error::CoreResult;
use crate::id::RecordId;
use crate::index::key::IndexKey;
use crate::index::xnode::XNode;
use crate::record::Record;
use logdb_codec::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Serialize, Deserialize)]
struct XEntry {
    value: Value,
    indexes: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct XIndexFile {
    base: Vec<Option<RecordId>>,
    tree: BTreeMap<String, Vec<XEntry>>,
}

/// Column name to [`XNode`], plus the slot table.
#[derive(Debug, Clone, Default)]
pub struct XTree {
    /// Columns to index; `None` indexes every scalar field.
    columns: Option<BTreeSet<String>>,
    base: Vec<Option<RecordId>>,
    free: Vec<u32>,
    slots: HashMap<RecordId, u32>,
    tree: BTreeMap<String, XNode>,
}

impl XTree {
    /// Creates an empty index over `columns` (`None` for every scalar field).
    #[must_use]
    pub fn new(columns: Option<BTreeSet<String>>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    fn is_indexed(&self, column: &str) -> bool {
        self.columns.as_ref().map_or(true, |c| c.contains(column))
    }

    /// Index keys a record contributes, per column.
    fn keys_of<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = (&'a String, IndexKey)> + 'a {
        record
            .fields()
            .iter()
            .filter(|(name, _)| self.is_indexed(name))
            .filter_map(|(name, value)| IndexKey::from_value(value).map(|k| (name, k)))
    }

    fn allocate(&mut self, id: RecordId) -> u32 {
        if let Some(&slot) = self.slots.get(&id) {
            return slot;
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.base[slot as usize] = Some(id);
                slot
            }
            None => {
                let slot = u32::try_from(self.base.len()).unwrap_or(u32::MAX);
                self.base.push(Some(id));
                slot
            }
        };
        self.slots.insert(id, slot);
        slot
    }

    fn add_values(&mut self, record: &Record, slot: u32) {
        let keys: Vec<(String, IndexKey)> = self
            .keys_of(record)
            .map(|(name, key)| (name.clone(), key))
            .collect();
        for (name, key) in keys {
            self.tree.entry(name).or_default().insert(key, slot);
        }
    }

    fn remove_values(&mut self, record: &Record, slot: u32) {
        let keys: Vec<(String, IndexKey)> = self
            .keys_of(record)
            .map(|(name, key)| (name.clone(), key))
            .collect();
        for (name, key) in keys {
            if let Some(node) = self.tree.get_mut(&name) {
                node.remove(&key, slot);
                if node.is_empty() {
                    self.tree.remove(&name);
                }
            }
        }
    }

    /// Indexes a new record and returns its slot.
    ///
    /// A record that is already indexed keeps its slot; its values are added.
    pub fn insert(&mut self, record: &Record) -> u32 {
        let slot = self.allocate(record.id());
        self.add_values(record, slot);
        slot
    }

    /// Replaces `old`'s values with `new`'s, keeping the slot.
    pub fn upsert(&mut self, old: &Record, new: &Record) -> u32 {
        match self.slots.get(&old.id()).copied() {
            Some(slot) => {
                self.remove_values(old, slot);
                self.add_values(new, slot);
                slot
            }
            None => self.insert(new),
        }
    }

    /// Removes a record's values and tombstones its slot.
    ///
    /// Returns false if the record was not indexed.
    pub fn disert(&mut self, record: &Record) -> bool {
        let Some(slot) = self.slots.remove(&record.id()) else {
            return false;
        };
        self.remove_values(record, slot);
        self.base[slot as usize] = None;
        self.free.push(slot);
        true
    }

    /// Returns true if `id` has a live slot.
    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.slots.contains_key(id)
    }

    /// Looks up the slot of `id`.
    #[must_use]
    pub fn slot_of(&self, id: &RecordId) -> Option<u32> {
        self.slots.get(id).copied()
    }

    fn field_matches(&self, column: &str, value: &Value) -> Vec<RecordId> {
        let (Some(node), Some(key)) = (self.tree.get(column), IndexKey::from_value(value)) else {
            return Vec::new();
        };
        node.matches(&key)
            .into_iter()
            .filter_map(|slot| self.base.get(slot as usize).copied().flatten())
            .collect()
    }

    /// Ids of records matching each query field, concatenated.
    ///
    /// Fields are visited in the order given. Each field yields the ids
    /// whose value equals it (substring containment for text). Results of
    /// different fields are concatenated, not merged: a record matching two
    /// fields appears twice. `skip` and `take` slice the concatenation.
    #[must_use]
    pub fn search(&self, query: &[(String, Value)], skip: usize, take: Option<usize>) -> Vec<RecordId> {
        let all = query
            .iter()
            .flat_map(|(column, value)| self.field_matches(column, value));
        match take {
            Some(take) => all.skip(skip).take(take).collect(),
            None => all.skip(skip).collect(),
        }
    }

    /// Sum of per-field match counts, with the same semantics as [`search`](Self::search).
    #[must_use]
    pub fn count(&self, query: &[(String, Value)]) -> usize {
        query
            .iter()
            .map(|(column, value)| {
                match (self.tree.get(column.as_str()), IndexKey::from_value(value)) {
                    (Some(node), Some(key)) => node.count(&key),
                    _ => 0,
                }
            })
            .sum()
    }

    /// Number of live (non-tombstoned) slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if the index covers exactly `records` records.
    #[must_use]
    pub fn confirm_length(&self, records: usize) -> bool {
        self.len() == records
    }

    /// Returns true if the index holds exactly the values of `records`.
    ///
    /// Every record must own a slot carrying each of its indexed values,
    /// and the index may hold nothing else. Catches an index persisted
    /// before later writes reached the logs, even when its length matches.
    #[must_use]
    pub fn confirm<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> bool {
        let mut live = 0;
        let mut pairs = 0;
        for record in records {
            let Some(slot) = self.slot_of(&record.id()) else {
                return false;
            };
            for (column, key) in self.keys_of(record) {
                if !self.tree.get(column).is_some_and(|node| node.holds(&key, slot)) {
                    return false;
                }
                pairs += 1;
            }
            live += 1;
        }
        self.confirm_length(live) && pairs == self.tree.values().map(XNode::pairs).sum::<usize>()
    }

    /// Returns the node of `column`, if any value is indexed for it.
    #[must_use]
    pub fn node(&self, column: &str) -> Option<&XNode> {
        self.tree.get(column)
    }

    /// Clears all state, keeping the column selection.
    pub fn restart(&mut self) {
        let columns = self.columns.take();
        *self = Self::new(columns);
    }

    /// Clears the index and replays `records` through [`insert`](Self::insert).
    pub fn rebuild<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        self.restart();
        for record in records {
            self.insert(record);
        }
    }

    /// Encodes the index for the `XINDEX` file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn persist(&self) -> CoreResult<Vec<u8>> {
        let file = XIndexFile {
            base: self.base.clone(),
            tree: self
                .tree
                .iter()
                .map(|(column, node)| {
                    let entries = node
                        .iter()
                        .map(|(key, slots)| XEntry {
                            value: key.to_value(),
                            indexes: slots.to_vec(),
                        })
                        .collect();
                    (column.clone(), entries)
                })
                .collect(),
        };
        Ok(logdb_codec::encode(&file)?)
    }

    /// Decodes an index written by [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode or reference slots
    /// outside the id table.
    pub fn restore(bytes: &[u8], columns: Option<BTreeSet<String>>) -> CoreResult<Self> {
        let file: XIndexFile = logdb_codec::decode(bytes)?;
        let mut tree = Self::new(columns);

        for (slot, id) in file.base.iter().enumerate() {
            let slot = u32::try_from(slot)
                .map_err(|_| crate::error::CoreError::invalid_format("index slot overflow"))?;
            match id {
                Some(id) => {
                    tree.slots.insert(*id, slot);
                }
                None => tree.free.push(slot),
            }
        }
        // Reuse the lowest tombstones first.
        tree.free.reverse();
        tree.base = file.base;

        for (column, entries) in file.tree {
            if !tree.is_indexed(&column) {
                return Err(crate::error::CoreError::invalid_format(format!(
                    "index column {column} is no longer indexed"
                )));
            }
            let mut pairs = Vec::with_capacity(entries.len());
            for entry in entries {
                if entry
                    .indexes
                    .iter()
                    .any(|&slot| tree.base.get(slot as usize).copied().flatten().is_none())
                {
                    return Err(crate::error::CoreError::invalid_format(format!(
                        "index column {column} references a dead slot"
                    )));
                }
                if let Some(key) = IndexKey::from_value(&entry.value) {
                    pairs.push((key, entry.indexes));
                }
            }
            tree.tree.insert(column, XNode::from_entries(pairs));
        }
        Ok(tree)
    }
}

/// Two trees are equal when they index the same slots the same way.
impl PartialEq for XTree {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.tree == other.tree
    }
}
