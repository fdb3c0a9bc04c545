//! Query descriptors and their results.

use crate::id::RecordId;
use crate::record::{Fields, Record};
use logdb_codec::Value;

/// Field/value pairs, visited in the order given.
pub type QueryFields = Vec<(String, Value)>;

/// Which records a select reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every record, in file creation order then id order.
    All,
    /// One record by id.
    Id(RecordId),
}

/// The operation of a [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    /// Read one or all records.
    Select(Selector),
    /// Insert a new record; an `_id` field is ignored.
    Insert(Fields),
    /// Merge fields over the record named by the `_id` field.
    Update(Fields),
    /// Delete one record.
    Delete(RecordId),
    /// Records matching any field (substring match for text).
    Search(QueryFields),
    /// The record holding a unique value.
    Unique(QueryFields),
    /// Number of matches, or of all records when empty.
    Count(QueryFields),
}

/// A normalized operation plus paging and population options.
///
/// # Example
///
/// ```rust,ignore
/// let query = Query::search(vec![("name".into(), "john".into())])
///     .skip(10)
///     .take(5)
///     .populate(true);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The operation.
    pub op: QueryOp,
    /// Results to drop from the front.
    pub skip: usize,
    /// Maximum results to return.
    pub take: Option<usize>,
    /// Whether to replace relationship links with the linked records.
    pub populate: bool,
}

impl Query {
    /// Wraps `op` with default options.
    #[must_use]
    pub fn new(op: QueryOp) -> Self {
        Self {
            op,
            skip: 0,
            take: None,
            populate: false,
        }
    }

    /// Selects every record.
    #[must_use]
    pub fn select_all() -> Self {
        Self::new(QueryOp::Select(Selector::All))
    }

    /// Selects one record by id.
    #[must_use]
    pub fn select(id: RecordId) -> Self {
        Self::new(QueryOp::Select(Selector::Id(id)))
    }

    /// Inserts a record.
    #[must_use]
    pub fn insert(fields: Fields) -> Self {
        Self::new(QueryOp::Insert(fields))
    }

    /// Updates the record named by `fields["_id"]`.
    #[must_use]
    pub fn update(fields: Fields) -> Self {
        Self::new(QueryOp::Update(fields))
    }

    /// Deletes a record.
    #[must_use]
    pub fn delete(id: RecordId) -> Self {
        Self::new(QueryOp::Delete(id))
    }

    /// Searches the secondary index.
    #[must_use]
    pub fn search(fields: QueryFields) -> Self {
        Self::new(QueryOp::Search(fields))
    }

    /// Looks up a unique value.
    #[must_use]
    pub fn unique(fields: QueryFields) -> Self {
        Self::new(QueryOp::Unique(fields))
    }

    /// Counts matches.
    #[must_use]
    pub fn count(fields: QueryFields) -> Self {
        Self::new(QueryOp::Count(fields))
    }

    /// Counts every record.
    #[must_use]
    pub fn count_all() -> Self {
        Self::new(QueryOp::Count(Vec::new()))
    }

    /// Sets the number of results to skip.
    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of results.
    #[must_use]
    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    /// Sets whether relationships are populated.
    #[must_use]
    pub fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Applies `skip` and `take` to `items`.
    pub(crate) fn page<T>(&self, items: Vec<T>) -> Vec<T> {
        let rest = items.into_iter().skip(self.skip);
        match self.take {
            Some(take) => rest.take(take).collect(),
            None => rest.collect(),
        }
    }
}

/// Result of running a [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// A single record, or `None` if it does not exist.
    Record(Option<Record>),
    /// A list of records.
    Records(Vec<Record>),
    /// A count.
    Count(usize),
    /// The operation produced nothing.
    Done,
}

impl QueryOutput {
    /// Returns the single record, if any.
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            QueryOutput::Record(record) => record,
            _ => None,
        }
    }

    /// Returns the records; a single record becomes a one-element list.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            QueryOutput::Record(record) => record.into_iter().collect(),
            QueryOutput::Records(records) => records,
            QueryOutput::Count(_) | QueryOutput::Done => Vec::new(),
        }
    }

    /// Returns the count, if this is one.
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        match self {
            QueryOutput::Count(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_and_paging() {
        let query = Query::select_all().skip(2).take(3);
        assert_eq!(query.op, QueryOp::Select(Selector::All));
        assert!(!query.populate);
        assert_eq!(query.page((0..10).collect()), vec![2, 3, 4]);
        assert_eq!(Query::count_all().page(vec![1, 2]), vec![1, 2]);
    }

    #[test]
    fn output_accessors() {
        assert_eq!(QueryOutput::Count(4).count(), Some(4));
        assert!(QueryOutput::Done.into_records().is_empty());
        assert!(QueryOutput::Record(None).into_record().is_none());
    }
}
