//! Records stored in log files.

use crate::id::RecordId;
use logdb_codec::Value;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the identifier field every record carries.
pub const ID_FIELD: &str = "_id";

/// Field name to value mapping, without the `_id` field.
pub type Fields = BTreeMap<String, Value>;

/// A stored document: an immutable id plus its fields.
///
/// On disk a record is a single map whose `_id` entry holds the hex id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: Fields,
}

impl Record {
    /// Creates a record. Any `_id` entry in `fields` is dropped.
    #[must_use]
    pub fn new(id: RecordId, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self { id, fields }
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the fields, `_id` excluded.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Looks up a field. `_id` resolves to the hex id.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return Some(Value::Text(self.id.to_string()));
        }
        self.fields.get(name).cloned()
    }

    /// Sets a field, returning the previous value. `_id` cannot be set.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        if name == ID_FIELD {
            return None;
        }
        self.fields.insert(name, value)
    }

    /// Returns a copy with `patch` written over the existing fields.
    #[must_use]
    pub fn merged(&self, patch: &Fields) -> Self {
        let mut fields = self.fields.clone();
        for (name, value) in patch {
            if name != ID_FIELD {
                fields.insert(name.clone(), value.clone());
            }
        }
        Self {
            id: self.id,
            fields,
        }
    }

    /// Converts into a map value that includes `_id`.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut map = self.fields;
        map.insert(ID_FIELD.to_string(), Value::Text(self.id.to_string()));
        Value::Map(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a record map with an _id entry")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
        let mut id = None;
        let mut fields = Fields::new();
        while let Some(key) = access.next_key::<String>()? {
            if key == ID_FIELD {
                id = Some(access.next_value::<RecordId>()?);
            } else {
                let value = access.next_value::<Value>()?;
                fields.insert(key, value);
            }
        }
        let id = id.ok_or_else(|| de::Error::missing_field(ID_FIELD))?;
        Ok(Record { id, fields })
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}
