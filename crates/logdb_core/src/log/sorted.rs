//! Binary-search mutation of an id-sorted log.
//!
//! A log is a `Vec<Record>` strictly ascending by id. Every function here
//! keeps it that way.

use crate::id::RecordId;
use crate::record::{Fields, Record};

/// Inserts `record` at the leftmost position that keeps `log` sorted.
///
/// Returns `Ok(position)`, or `Err(position)` of the existing record if
/// the id is already present, in which case `log` is unchanged.
pub fn binary_insert(log: &mut Vec<Record>, record: Record) -> Result<usize, usize> {
    let id = record.id();
    let pos = log.partition_point(|r| r.id() < id);
    if log.get(pos).is_some_and(|r| r.id() == id) {
        return Err(pos);
    }
    log.insert(pos, record);
    Ok(pos)
}

/// Position of `id` in `log`.
#[must_use]
pub fn binary_find(log: &[Record], id: &RecordId) -> Option<usize> {
    log.binary_search_by(|r| r.id().cmp(id)).ok()
}

/// Change applied by [`binary_mutate`].
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    /// Merge these fields over the stored record.
    Update(&'a Fields),
    /// Remove the record.
    Delete,
}

/// Outcome of a successful [`binary_mutate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mutated {
    /// The record before the change.
    pub old: Record,
    /// The record after an update; `None` after a delete.
    pub new: Option<Record>,
}

/// Finds `id` by binary search and updates it in place or removes it.
///
/// Returns `None`, leaving `log` unchanged, if `id` is absent.
pub fn binary_mutate(log: &mut Vec<Record>, id: &RecordId, mutation: Mutation<'_>) -> Option<Mutated> {
    let pos = binary_find(log, id)?;
    match mutation {
        Mutation::Update(patch) => {
            let new = log[pos].merged(patch);
            let old = std::mem::replace(&mut log[pos], new.clone());
            Some(Mutated { old, new: Some(new) })
        }
        Mutation::Delete => Some(Mutated {
            old: log.remove(pos),
            new: None,
        }),
    }
}

/// Returns true if `log` is strictly ascending by id.
#[must_use]
pub fn is_sorted(log: &[Record]) -> bool {
    log.windows(2).all(|w| w[0].id() < w[1].id())
}
