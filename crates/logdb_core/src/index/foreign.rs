//! Relationship adjacency (`FINDEX`).
//!
//! Relationship fields are stored in the record itself as null, an id, or
//! an array of ids. `FINDEX` mirrors them per record and can always be
//! derived again from the log files.

use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::record::Record;
use crate::schema::{RelationKind, Relationship};
use logdb_codec::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Target(s) of one relationship field of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// The field was cleared.
    None,
    /// A to-one link.
    One(RecordId),
    /// A to-many link, in the order written.
    Many(Vec<RecordId>),
}

impl Link {
    /// Linked ids, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            Link::None => Vec::new(),
            Link::One(id) => vec![*id],
            Link::Many(ids) => ids.clone(),
        }
    }

    /// Reads a relationship value of the given kind.
    ///
    /// Null clears the link. A to-many link accepts a single id or an
    /// array of ids; repeated ids are dropped. Returns `None` for anything
    /// that is not an id.
    #[must_use]
    pub fn parse(kind: RelationKind, value: &Value) -> Option<Link> {
        let id = |v: &Value| v.as_text().and_then(|s| s.parse::<RecordId>().ok());
        match (kind, value) {
            (_, Value::Null) => Some(Link::None),
            (RelationKind::One, v) => id(v).map(Link::One),
            (RelationKind::Many, Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    let item = id(item)?;
                    if !ids.contains(&item) {
                        ids.push(item);
                    }
                }
                Some(Link::Many(ids))
            }
            (RelationKind::Many, v) => id(v).map(|id| Link::Many(vec![id])),
        }
    }

    /// The value a record stores for this link.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Link::None => Value::Null,
            Link::One(id) => Value::Text(id.to_string()),
            Link::Many(ids) => Value::Array(ids.iter().map(|id| Value::Text(id.to_string())).collect()),
        }
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Link::None => serializer.serialize_none(),
            Link::One(id) => id.serialize(serializer),
            Link::Many(ids) => ids.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let parse = |v: &Value| -> Result<RecordId, D::Error> {
            v.as_text()
                .ok_or_else(|| D::Error::custom("link target is not text"))?
                .parse()
                .map_err(D::Error::custom)
        };
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Link::None),
            Value::Array(items) => items.iter().map(parse).collect::<Result<_, _>>().map(Link::Many),
            other => parse(&other).map(Link::One),
        }
    }
}

/// Per record, relationship name to its link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignIndex {
    links: BTreeMap<RecordId, BTreeMap<String, Link>>,
}

impl ForeignIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one relationship of `id`. [`Link::None`] clears it.
    pub fn set(&mut self, id: RecordId, name: &str, link: Link) {
        if link == Link::None {
            if let Some(links) = self.links.get_mut(&id) {
                links.remove(name);
                if links.is_empty() {
                    self.links.remove(&id);
                }
            }
            return;
        }
        self.links.entry(id).or_default().insert(name.to_string(), link);
    }

    /// Sets the links `record` stores for `relationships`.
    ///
    /// Relationship fields absent from the record are left alone; values
    /// that are not ids are skipped.
    pub fn record(&mut self, relationships: &[Relationship], record: &Record) {
        for rel in relationships {
            if let Some(link) = record.fields().get(&rel.name).and_then(|v| Link::parse(rel.kind, v)) {
                self.set(record.id(), &rel.name, link);
            }
        }
    }

    /// Clears the index and records the links of every record.
    pub fn rebuild<'a>(&mut self, relationships: &[Relationship], records: impl IntoIterator<Item = &'a Record>) {
        self.links.clear();
        for record in records {
            self.record(relationships, record);
        }
    }

    /// Returns every relationship of `id`.
    #[must_use]
    pub fn links_of(&self, id: &RecordId) -> Option<&BTreeMap<String, Link>> {
        self.links.get(id)
    }

    /// Drops every relationship of `id`.
    pub fn remove(&mut self, id: &RecordId) -> bool {
        self.links.remove(id).is_some()
    }

    /// Number of records with at least one link.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true if no record has links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Encodes the index for the `FINDEX` file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn persist(&self) -> CoreResult<Vec<u8>> {
        Ok(logdb_codec::encode(&self.links)?)
    }

    /// Decodes an index written by [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode.
    pub fn restore(bytes: &[u8]) -> CoreResult<Self> {
        let links: BTreeMap<RecordId, BTreeMap<String, Link>> = logdb_codec::decode(bytes)
            .map_err(|e| CoreError::invalid_format(format!("relationship index: {e}")))?;
        Ok(Self { links })
    }
}
