//! Static table schemas and record validation.

use crate::error::{CoreError, CoreResult};
use crate::index::Link;
use crate::record::{Fields, ID_FIELD};
use logdb_codec::Value;
use std::collections::BTreeSet;

/// The kind of value a column accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any value.
    Any,
    /// Boolean.
    Bool,
    /// Integer.
    Integer,
    /// Integer or float.
    Number,
    /// Text.
    Text,
    /// Byte string.
    Bytes,
    /// Array of values.
    Array,
    /// Nested map.
    Map,
}

impl FieldKind {
    /// Returns true if `value` has this kind. Null is handled by the caller.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::Integer => matches!(value, Value::Integer(_)),
            FieldKind::Number => matches!(value, Value::Integer(_) | Value::Float(_)),
            FieldKind::Text => matches!(value, Value::Text(_)),
            FieldKind::Bytes => matches!(value, Value::Bytes(_)),
            FieldKind::Array => matches!(value, Value::Array(_)),
            FieldKind::Map => matches!(value, Value::Map(_)),
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Accepted value kind.
    pub kind: FieldKind,
    /// Whether inserts must provide a non-null value.
    pub required: bool,
    /// Whether values must be unique across the table.
    pub unique: bool,
    /// Whether the column is part of the secondary index.
    pub indexed: bool,
}

impl Column {
    /// Creates an optional, indexed, non-unique column.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            indexed: true,
        }
    }

    /// Makes the column required on insert.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Makes the column unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Leaves the column out of the secondary index.
    #[must_use]
    pub fn not_indexed(mut self) -> Self {
        self.indexed = false;
        self
    }
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// At most one related record.
    One,
    /// Any number of related records.
    Many,
}

/// A named link from records of this table to records of `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Field name the relationship is written and populated under.
    pub name: String,
    /// Target table name.
    pub target: String,
    /// Cardinality.
    pub kind: RelationKind,
}

impl Relationship {
    /// Declares a to-one relationship.
    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::One,
        }
    }

    /// Declares a to-many relationship.
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::Many,
        }
    }
}

/// Whether a record is being created or patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Full record on insert: required columns are checked.
    Insert,
    /// Partial patch on update.
    Update,
}

/// Static description of a table.
///
/// A schema without columns is schemaless: any field is accepted and every
/// scalar field is indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    relationships: Vec<Relationship>,
}

impl TableSchema {
    /// Creates a schemaless table description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.retain(|c| c.name != column.name);
        self.columns.push(column);
        self
    }

    /// Adds a relationship.
    #[must_use]
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.retain(|r| r.name != relationship.name);
        self.relationships.push(relationship);
        self
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared columns.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Declared relationships.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Looks up a relationship by name.
    #[must_use]
    pub fn find_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Columns covered by the secondary index, or `None` for "every scalar field".
    #[must_use]
    pub fn indexed_columns(&self) -> Option<BTreeSet<String>> {
        if self.columns.is_empty() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .filter(|c| c.indexed)
                .map(|c| c.name.clone())
                .collect(),
        )
    }

    /// Names of unique columns.
    #[must_use]
    pub fn unique_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.unique)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Validates `fields` and returns them as they will be stored.
    ///
    /// Relationship fields are rewritten to their stored form: null, an id,
    /// or an array of distinct ids.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the table and field when a
    /// value has the wrong kind, a required column is missing on insert, a
    /// field is not declared, or a relationship value is not an id.
    pub fn prepare(&self, mut fields: Fields, mode: WriteMode) -> CoreResult<Fields> {
        fields.remove(ID_FIELD);

        for rel in &self.relationships {
            if let Some(value) = fields.get_mut(&rel.name) {
                let link = Link::parse(rel.kind, value)
                    .ok_or_else(|| self.invalid(format!("relationship {} expects record ids", rel.name)))?;
                *value = link.to_value();
            }
        }

        for column in &self.columns {
            match fields.get(&column.name) {
                Some(Value::Null) | None => {
                    if column.required && mode == WriteMode::Insert {
                        return Err(self.invalid(format!("field {} is required", column.name)));
                    }
                    if column.required && fields.contains_key(&column.name) {
                        return Err(self.invalid(format!("field {} cannot be null", column.name)));
                    }
                }
                Some(value) if !column.kind.accepts(value) => {
                    return Err(self.invalid(format!(
                        "field {} expects {:?}, got {}",
                        column.name,
                        column.kind,
                        value.kind_name()
                    )));
                }
                Some(_) => {}
            }
        }

        if !self.columns.is_empty() {
            let declared = |name: &String| {
                self.columns.iter().any(|c| &c.name == name) || self.find_relationship(name).is_some()
            };
            if let Some(name) = fields.keys().find(|name| !declared(name)) {
                return Err(self.invalid(format!("field {name} is not declared")));
            }
        }

        Ok(fields)
    }

    fn invalid(&self, message: String) -> CoreError {
        CoreError::validation(self.name.clone(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::RecordId;

    fn users() -> TableSchema {
        TableSchema::new("users")
            .column(Column::new("name", FieldKind::Text).required())
            .column(Column::new("email", FieldKind::Text).unique())
            .column(Column::new("age", FieldKind::Integer))
            .column(Column::new("bio", FieldKind::Text).not_indexed())
            .relationship(Relationship::one("team", "teams"))
            .relationship(Relationship::many("friends", "users"))
    }

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn accepts_valid_insert() {
        let stored = users()
            .prepare(
                fields(&[("name", Value::from("ann")), ("age", Value::from(4))]),
                WriteMode::Insert,
            )
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn required_only_on_insert() {
        let schema = users();
        let patch = fields(&[("age", Value::from(5))]);

        assert!(matches!(
            schema.prepare(patch.clone(), WriteMode::Insert),
            Err(CoreError::Validation { .. })
        ));
        assert!(schema.prepare(patch, WriteMode::Update).is_ok());
        assert!(schema
            .prepare(fields(&[("name", Value::Null)]), WriteMode::Update)
            .is_err());
    }

    #[test]
    fn wrong_kind_names_field() {
        let err = users()
            .prepare(
                fields(&[("name", Value::from("a")), ("age", Value::from("old"))]),
                WriteMode::Insert,
            )
            .unwrap_err();
        assert!(err.to_string().contains("age"));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn undeclared_field_rejected() {
        assert!(users()
            .prepare(
                fields(&[("name", Value::from("a")), ("zip", Value::from(1))]),
                WriteMode::Insert,
            )
            .is_err());
    }

    #[test]
    fn schemaless_accepts_anything() {
        let schema = TableSchema::new("notes");
        assert!(schema.indexed_columns().is_none());
        assert!(schema
            .prepare(fields(&[("anything", Value::from(1.5))]), WriteMode::Insert)
            .is_ok());
    }

    #[test]
    fn relationships_are_stored_as_ids() {
        let a = RecordId::new();
        let b = RecordId::new();
        let stored = users()
            .prepare(
                fields(&[
                    ("name", Value::from("ann")),
                    ("team", Value::from(a.to_string())),
                    (
                        "friends",
                        Value::Array(vec![
                            Value::from(b.to_string()),
                            Value::from(b.to_string()),
                        ]),
                    ),
                ]),
                WriteMode::Insert,
            )
            .unwrap();

        assert_eq!(stored.get("team"), Some(&Value::from(a.to_string())));
        assert_eq!(
            stored.get("friends"),
            Some(&Value::Array(vec![Value::from(b.to_string())]))
        );
    }

    #[test]
    fn bad_relationship_value_rejected() {
        assert!(users()
            .prepare(
                fields(&[("name", Value::from("ann")), ("team", Value::from(7))]),
                WriteMode::Insert,
            )
            .is_err());
    }

    #[test]
    fn index_and_unique_columns() {
        let schema = users();
        let indexed = schema.indexed_columns().unwrap();
        assert!(indexed.contains("name"));
        assert!(!indexed.contains("bio"));
        assert_eq!(schema.unique_columns(), vec!["email".to_string()]);
    }
}
