//! Unique column values (`UINDEX`).

use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::index::key::IndexKey;
use crate::record::{Fields, Record};
use logdb_codec::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A unique value newly reserved for a record.
pub type Claim = (String, IndexKey);

#[derive(Serialize, Deserialize)]
struct UniqueEntry {
    value: Value,
    id: RecordId,
}

/// Per unique column, value to the one record holding it.
///
/// Values are claimed before a write is queued, so two concurrent writers
/// cannot both take the same value, and claimed again when its batch
/// commits. Recording a committed record never takes a value from its owner. Nulls, arrays and maps are never
/// constrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueIndex {
    columns: Vec<String>,
    values: BTreeMap<String, BTreeMap<IndexKey, RecordId>>,
}

impl UniqueIndex {
    /// Creates an empty index for `columns`.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            values: BTreeMap::new(),
        }
    }

    fn keys_of<'a>(&'a self, fields: &'a Fields) -> impl Iterator<Item = (&'a String, IndexKey)> + 'a {
        self.columns.iter().filter_map(move |column| {
            fields
                .get(column)
                .filter(|v| !v.is_null())
                .and_then(IndexKey::from_value)
                .map(|key| (column, key))
        })
    }

    /// Reserves the unique values in `fields` for `id`.
    ///
    /// Returns the values that were not already held by `id`, so a failed
    /// write can hand them back with [`release`](Self::release).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UniqueViolation`] if any value belongs to
    /// another record. Nothing is reserved in that case.
    pub fn claim(&mut self, table: &str, id: RecordId, fields: &Fields) -> CoreResult<Vec<Claim>> {
        let keys: Vec<Claim> = self.keys_of(fields).map(|(c, k)| (c.clone(), k)).collect();

        for (column, key) in &keys {
            if let Some(owner) = self.values.get(column).and_then(|m| m.get(key)) {
                if *owner != id {
                    return Err(CoreError::UniqueViolation {
                        table: table.to_string(),
                        column: column.clone(),
                        value: key.to_value().to_string(),
                    });
                }
            }
        }

        let mut claimed = Vec::new();
        for (column, key) in keys {
            let column_values = self.values.entry(column.clone()).or_default();
            if column_values.insert(key.clone(), id).is_none() {
                claimed.push((column, key));
            }
        }
        Ok(claimed)
    }

    /// Hands back claims of `id`.
    pub fn release(&mut self, id: RecordId, claims: &[Claim]) {
        for (column, key) in claims {
            self.remove_if_owned(column, key, id);
        }
    }

    fn remove_if_owned(&mut self, column: &str, key: &IndexKey, id: RecordId) {
        if let Some(column_values) = self.values.get_mut(column) {
            if column_values.get(key) == Some(&id) {
                column_values.remove(key);
            }
            if column_values.is_empty() {
                self.values.remove(column);
            }
        }
    }

    /// Drops values `old` held that `new` no longer holds, and records `new`'s values.
    ///
    /// Returns false if some value of `new` is held by another record.
    pub fn replace(&mut self, old: &Record, new: &Record) -> bool {
        let stale: Vec<Claim> = self
            .keys_of(old.fields())
            .filter(|(column, key)| IndexKey::from_value(&new.get(column).unwrap_or(Value::Null)).as_ref() != Some(key))
            .map(|(c, k)| (c.clone(), k))
            .collect();
        for (column, key) in stale {
            self.remove_if_owned(&column, &key, old.id());
        }
        self.record(new)
    }

    /// Records every unique value of `record` that is still free.
    ///
    /// A value held by another record keeps its owner. Returns false if
    /// that happened for any value.
    pub fn record(&mut self, record: &Record) -> bool {
        let keys: Vec<Claim> = self
            .keys_of(record.fields())
            .map(|(c, k)| (c.clone(), k))
            .collect();
        let mut owned = true;
        for (column, key) in keys {
            let owner = self.values.entry(column).or_default().entry(key).or_insert(record.id());
            owned &= *owner == record.id();
        }
        owned
    }

    /// Removes every unique value held by `record`.
    pub fn remove_record(&mut self, record: &Record) {
        let keys: Vec<Claim> = self
            .keys_of(record.fields())
            .map(|(c, k)| (c.clone(), k))
            .collect();
        for (column, key) in keys {
            self.remove_if_owned(&column, &key, record.id());
        }
    }

    /// Returns the record holding `value` in `column`.
    #[must_use]
    pub fn lookup(&self, column: &str, value: &Value) -> Option<RecordId> {
        let key = IndexKey::from_value(value)?;
        self.values.get(column)?.get(&key).copied()
    }

    /// Returns true if the index holds exactly the unique values of `records`.
    #[must_use]
    pub fn confirm<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> bool {
        let mut expected = 0;
        for record in records {
            for (column, key) in self.keys_of(record.fields()) {
                if self.values.get(column).and_then(|m| m.get(&key)) != Some(&record.id()) {
                    return false;
                }
                expected += 1;
            }
        }
        expected == self.values.values().map(BTreeMap::len).sum::<usize>()
    }

    /// Clears the index and records every value of `records`.
    pub fn rebuild<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        self.values.clear();
        for record in records {
            if !self.record(record) {
                tracing::warn!(id = %record.id(), "duplicate unique value in logs");
            }
        }
    }

    /// Encodes the index for the `UINDEX` file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn persist(&self) -> CoreResult<Vec<u8>> {
        let file: BTreeMap<&String, Vec<UniqueEntry>> = self
            .values
            .iter()
            .map(|(column, values)| {
                let entries = values
                    .iter()
                    .map(|(key, id)| UniqueEntry {
                        value: key.to_value(),
                        id: *id,
                    })
                    .collect();
                (column, entries)
            })
            .collect();
        Ok(logdb_codec::encode(&file)?)
    }

    /// Decodes an index written by [`persist`](Self::persist).
    ///
    /// Columns no longer declared unique are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode.
    pub fn restore(bytes: &[u8], columns: Vec<String>) -> CoreResult<Self> {
        let file: BTreeMap<String, Vec<UniqueEntry>> = logdb_codec::decode(bytes)?;
        let mut index = Self::new(columns);
        for (column, entries) in file {
            if !index.columns.contains(&column) {
                continue;
            }
            let column_values = index.values.entry(column).or_default();
            for entry in entries {
                if let Some(key) = IndexKey::from_value(&entry.value) {
                    column_values.insert(key, entry.id);
                }
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn emails() -> UniqueIndex {
        UniqueIndex::new(vec!["email".to_string()])
    }

    #[test]
    fn claim_conflict_reserves_nothing() {
        let mut index = UniqueIndex::new(vec!["email".to_string(), "nick".to_string()]);
        let a = RecordId::new();
        let b = RecordId::new();

        index
            .claim("users", a, &fields(&[("email", Value::from("x@y"))]))
            .unwrap();
        let err = index
            .claim(
                "users",
                b,
                &fields(&[("nick", Value::from("bee")), ("email", Value::from("x@y"))]),
            )
            .unwrap_err();

        assert!(matches!(err, CoreError::UniqueViolation { ref column, .. } if column == "email"));
        assert_eq!(index.lookup("nick", &Value::from("bee")), None);
    }

    #[test]
    fn reclaim_by_owner_is_not_new() {
        let mut index = emails();
        let a = RecordId::new();
        let f = fields(&[("email", Value::from("x@y"))]);

        assert_eq!(index.claim("t", a, &f).unwrap().len(), 1);
        assert!(index.claim("t", a, &f).unwrap().is_empty());
    }

    #[test]
    fn release_returns_values() {
        let mut index = emails();
        let a = RecordId::new();
        let claims = index
            .claim("t", a, &fields(&[("email", Value::from("x@y"))]))
            .unwrap();

        index.release(a, &claims);
        assert_eq!(index.lookup("email", &Value::from("x@y")), None);
    }

    #[test]
    fn nulls_are_unconstrained() {
        let mut index = emails();
        index
            .claim("t", RecordId::new(), &fields(&[("email", Value::Null)]))
            .unwrap();
        index
            .claim("t", RecordId::new(), &fields(&[("email", Value::Null)]))
            .unwrap();
        assert_eq!(index.lookup("email", &Value::Null), None);
    }

    #[test]
    fn replace_frees_old_value() {
        let mut index = emails();
        let old = Record::new(RecordId::new(), fields(&[("email", Value::from("old@x"))]));
        index.record(&old);
        let new = old.merged(&fields(&[("email", Value::from("new@x"))]));

        assert!(index.replace(&old, &new));
        assert_eq!(index.lookup("email", &Value::from("old@x")), None);
        assert_eq!(index.lookup("email", &Value::from("new@x")), Some(old.id()));

        index.remove_record(&new);
        assert_eq!(index.lookup("email", &Value::from("new@x")), None);
    }

    #[test]
    fn record_never_steals() {
        let mut index = emails();
        let a = RecordId::new();
        let b = Record::new(RecordId::new(), fields(&[("email", Value::from("y@x"))]));

        let claims = index.claim("t", a, &fields(&[("email", Value::from("y@x"))])).unwrap();
        index.release(a, &claims);
        assert!(index.record(&b));

        let a = Record::new(a, fields(&[("email", Value::from("y@x"))]));
        assert!(!index.record(&a));
        assert_eq!(index.lookup("email", &Value::from("y@x")), Some(b.id()));
        assert!(matches!(
            index.claim("t", a.id(), a.fields()),
            Err(CoreError::UniqueViolation { .. })
        ));
    }

    #[test]
    fn persist_restore_roundtrip() {
        let mut index = emails();
        let record = Record::new(RecordId::new(), fields(&[("email", Value::from("a@b"))]));
        index.record(&record);

        let restored = UniqueIndex::restore(&index.persist().unwrap(), vec!["email".to_string()]).unwrap();
        assert_eq!(restored, index);

        assert!(restored.confirm([&record]));
        assert!(!restored.confirm(std::iter::empty::<&Record>()));

        let dropped = UniqueIndex::restore(&index.persist().unwrap(), Vec::new()).unwrap();
        assert_eq!(dropped.lookup("email", &Value::from("a@b")), None);
    }
}
