//! Table manager.
//!
//! A table owns one [`FileStore`] holding its files:
//!
//! ```text
//! LOG-1, LOG-2, ...   # id-sorted record arrays
//! XINDEX              # secondary index
//! UINDEX              # unique values (tables with unique columns)
//! FINDEX              # relationship links (tables with relationships)
//! ```
//!
//! The log files are the source of truth. On open every index file is
//! checked against the decoded logs and rebuilt from them if it disagrees.
//!
//! # Writes
//!
//! A write is validated, its unique values are claimed, and it is routed to
//! a log file: the insert target chosen by size, or the file holding the
//! record for updates and deletes. The [`WriteCoordinator`] then commits it
//! with the other writes queued for that file:
//!
//! 1. Load the log (cache first) and apply the batch to a copy, claiming
//!    the unique values of each resulting record again
//! 2. Write the log durably
//! 3. Apply the batch to the indexes, publish the copy to the cache
//! 4. Persist the indexes
//! 5. Answer the waiters
//!
//! If step 2 fails nothing changes and every waiter gets the error.
//!
//! # Reads
//!
//! Reads never take the write queue. They see the last published copy of
//! each log file.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::index::{Claim, ForeignIndex, Link, UniqueIndex, XTree};
use crate::log::{
    binary_find, binary_insert, binary_mutate, is_sorted, parse_log_name, LogCache, LogFileSet, Mutated, Mutation,
};
use crate::query::{Query, QueryFields, QueryOp, QueryOutput, Selector};
use crate::record::{Fields, Record, ID_FIELD};
use crate::schema::{TableSchema, WriteMode};
use crate::stats::{LogStats, TableCounters, TableStats};
use crate::writer::{BatchCommit, WriteCoordinator};
use logdb_codec::Value;
use logdb_storage::FileStore;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Secondary index file.
pub const XINDEX_FILE: &str = "XINDEX";
/// Unique value file.
pub const UINDEX_FILE: &str = "UINDEX";
/// Relationship file.
pub const FINDEX_FILE: &str = "FINDEX";

/// A queued change to one log file.
#[derive(Debug)]
pub enum WriteOp {
    /// Add a new record.
    Insert {
        /// The record, id assigned.
        record: Record,
        /// Unique values reserved for it.
        claims: Vec<Claim>,
    },
    /// Merge a patch over a stored record.
    Update {
        /// Target record.
        id: RecordId,
        /// Fields to write.
        patch: Fields,
        /// Unique values reserved for the patch.
        claims: Vec<Claim>,
    },
    /// Remove a record.
    Delete {
        /// Target record.
        id: RecordId,
    },
    /// Completes once every earlier entry for the file has committed.
    Noop,
}

/// What a write op did to the log copy.
enum Applied {
    Inserted {
        record: Record,
        claims: Vec<Claim>,
    },
    Updated {
        old: Record,
        new: Record,
        claims: Vec<Claim>,
    },
    Deleted(Record),
    /// The op changed nothing; its claims go back.
    Skipped {
        id: RecordId,
        claims: Vec<Claim>,
        error: Option<CoreError>,
    },
    Nothing,
}

impl Applied {
    fn changes_log(&self) -> bool {
        matches!(
            self,
            Applied::Inserted { .. } | Applied::Updated { .. } | Applied::Deleted(_)
        )
    }

    fn claims(&self) -> Option<(RecordId, &[Claim])> {
        match self {
            Applied::Inserted { record, claims, .. } => Some((record.id(), claims.as_slice())),
            Applied::Updated { new, claims, .. } => Some((new.id(), claims.as_slice())),
            Applied::Skipped { id, claims, .. } => Some((*id, claims.as_slice())),
            Applied::Deleted(_) | Applied::Nothing => None,
        }
    }

    fn into_output(self) -> CoreResult<Option<Record>> {
        match self {
            Applied::Inserted { record, .. } => Ok(Some(record)),
            Applied::Updated { new, .. } => Ok(Some(new)),
            Applied::Deleted(record) => Ok(Some(record)),
            Applied::Skipped { error: Some(err), .. } => Err(err),
            Applied::Skipped { error: None, .. } | Applied::Nothing => Ok(None),
        }
    }
}

fn decode_log(name: &str, bytes: &[u8]) -> CoreResult<Vec<Record>> {
    logdb_codec::decode(bytes).map_err(|e| CoreError::invalid_format(format!("log file {name}: {e}")))
}

/// Shared state of one table.
#[derive(Debug)]
pub struct TableCore {
    schema: TableSchema,
    store: Arc<dyn FileStore>,
    config: Config,
    cache: LogCache,
    files: Mutex<LogFileSet>,
    xtree: RwLock<XTree>,
    unique: Mutex<UniqueIndex>,
    foreign: RwLock<ForeignIndex>,
    persist_lock: Mutex<()>,
    counters: TableCounters,
}

impl TableCore {
    fn open(schema: TableSchema, store: Arc<dyn FileStore>, config: Config) -> CoreResult<Self> {
        let table = schema.name().to_string();
        store.sweep_temp()?;

        let cache = LogCache::new();
        let mut files = LogFileSet::new(config.log_capacity);
        let mut logs = Vec::new();
        for name in store.list()? {
            if parse_log_name(&name).is_none() {
                continue;
            }
            let bytes = store.read(&name)?.unwrap_or_default();
            let mut log = decode_log(&name, &bytes)?;
            if !is_sorted(&log) {
                tracing::warn!(table = %table, file = %name, "log file out of order, re-sorting");
                log.sort_by_key(Record::id);
                log.dedup_by_key(|r| r.id());
            }
            files.register(&name, &log);
            logs.push(cache.fill(&name, log));
        }
        let records = || logs.iter().flat_map(|log| log.iter());
        let total = files.total_records();
        let mut dirty = false;

        let columns = schema.indexed_columns();
        let restored = match store.read(XINDEX_FILE)? {
            Some(bytes) => match XTree::restore(&bytes, columns.clone()) {
                Ok(tree) if tree.confirm(records()) => Some(tree),
                Ok(tree) => {
                    tracing::warn!(table = %table, indexed = tree.len(), records = total, "index out of date, rebuilding");
                    None
                }
                Err(err) => {
                    tracing::warn!(table = %table, error = %err, "index file unreadable, rebuilding");
                    None
                }
            },
            None => None,
        };
        let xtree = restored.unwrap_or_else(|| {
            dirty = true;
            let mut tree = XTree::new(columns);
            tree.rebuild(records());
            tree
        });

        let unique_columns = schema.unique_columns();
        let restored = match store.read(UINDEX_FILE)? {
            Some(bytes) => UniqueIndex::restore(&bytes, unique_columns.clone())
                .ok()
                .filter(|index| index.confirm(records())),
            None => None,
        };
        let unique = restored.unwrap_or_else(|| {
            if !unique_columns.is_empty() {
                dirty = true;
                tracing::warn!(table = %table, "unique index out of date, rebuilding");
            }
            let mut index = UniqueIndex::new(unique_columns);
            index.rebuild(records());
            index
        });

        let mut foreign = ForeignIndex::new();
        foreign.rebuild(schema.relationships(), records());
        if !schema.relationships().is_empty() {
            let restored = store
                .read(FINDEX_FILE)?
                .and_then(|bytes| ForeignIndex::restore(&bytes).ok());
            if restored.as_ref() != Some(&foreign) {
                tracing::warn!(table = %table, "relationship index out of date, rebuilding");
                dirty = true;
            }
        }

        tracing::info!(
            table = %table,
            files = files.len(),
            records = total,
            linked = foreign.len(),
            "table opened"
        );

        let core = Self {
            schema,
            store,
            config,
            cache,
            files: Mutex::new(files),
            xtree: RwLock::new(xtree),
            unique: Mutex::new(unique),
            foreign: RwLock::new(foreign),
            persist_lock: Mutex::new(()),
            counters: TableCounters::default(),
        };
        if dirty && core.config.persist_index {
            core.persist_indexes()?;
        }
        Ok(core)
    }

    fn name(&self) -> &str {
        self.schema.name()
    }

    /// Returns the published copy of `name`, loading it on a miss.
    fn load_log(&self, name: &str) -> CoreResult<Arc<Vec<Record>>> {
        if let Some(log) = self.cache.get(name) {
            return Ok(log);
        }
        let log = match self.store.read(name)? {
            Some(bytes) => decode_log(name, &bytes)?,
            None => Vec::new(),
        };
        Ok(self.cache.fill(name, log))
    }

    /// Finds a record and the log file holding it.
    fn find(&self, id: &RecordId) -> CoreResult<Option<(String, Record)>> {
        let candidates = self.files.lock().locate(id);
        for name in candidates {
            let log = self.load_log(&name)?;
            if let Some(pos) = binary_find(&log, id) {
                return Ok(Some((name, log[pos].clone())));
            }
        }
        Ok(None)
    }

    fn get(&self, id: &RecordId) -> CoreResult<Option<Record>> {
        self.counters.record_read();
        Ok(self.find(id)?.map(|(_, record)| record))
    }

    fn all(&self) -> CoreResult<Vec<Record>> {
        self.counters.record_read();
        let names = self.files.lock().select_all();
        let mut records = Vec::new();
        for name in names {
            records.extend(self.load_log(&name)?.iter().cloned());
        }
        Ok(records)
    }

    fn search(&self, fields: &[(String, Value)], skip: usize, take: Option<usize>) -> CoreResult<Vec<Record>> {
        let ids = self.xtree.read().search(fields, skip, take);
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn unique(&self, fields: &[(String, Value)]) -> CoreResult<Option<Record>> {
        for (column, value) in fields {
            let owner = self.unique.lock().lookup(column, value);
            if let Some(id) = owner {
                return self.get(&id);
            }
        }
        Ok(None)
    }

    fn count(&self, fields: &[(String, Value)]) -> usize {
        if fields.is_empty() {
            return self.files.lock().total_records();
        }
        self.xtree.read().count(fields)
    }

    /// Claims the unique values of `record` again, adding new claims to `claims`.
    ///
    /// Values claimed at enqueue time can have been handed back since by a
    /// failed batch and taken by another record.
    fn reclaim(&self, record: &Record, claims: &mut Vec<Claim>) -> CoreResult<()> {
        let extra = self.unique.lock().claim(self.name(), record.id(), record.fields())?;
        claims.extend(extra);
        Ok(())
    }

    fn apply(&self, log: &mut Vec<Record>, op: WriteOp) -> Applied {
        match op {
            WriteOp::Insert { record, mut claims } => {
                if let Err(err) = self.reclaim(&record, &mut claims) {
                    return Applied::Skipped {
                        id: record.id(),
                        claims,
                        error: Some(err),
                    };
                }
                match binary_insert(log, record.clone()) {
                    Ok(_) => Applied::Inserted { record, claims },
                    Err(_) => Applied::Skipped {
                        id: record.id(),
                        claims,
                        error: Some(CoreError::validation(
                            self.name(),
                            format!("record {} already exists", record.id()),
                        )),
                    },
                }
            }
            WriteOp::Update { id, patch, mut claims } => {
                let Some(pos) = binary_find(log, &id) else {
                    return Applied::Skipped {
                        id,
                        claims,
                        error: None,
                    };
                };
                if let Err(err) = self.reclaim(&log[pos].merged(&patch), &mut claims) {
                    return Applied::Skipped {
                        id,
                        claims,
                        error: Some(err),
                    };
                }
                match binary_mutate(log, &id, Mutation::Update(&patch)) {
                    Some(Mutated { old, new: Some(new) }) => Applied::Updated { old, new, claims },
                    Some(Mutated { old, new: None }) => Applied::Deleted(old),
                    None => Applied::Skipped {
                        id,
                        claims,
                        error: None,
                    },
                }
            }
            WriteOp::Delete { id } => match binary_mutate(log, &id, Mutation::Delete) {
                Some(mutated) => Applied::Deleted(mutated.old),
                None => Applied::Nothing,
            },
            WriteOp::Noop => Applied::Nothing,
        }
    }

    fn release_claims(&self, applied: &[Applied]) {
        let mut unique = self.unique.lock();
        for (id, claims) in applied.iter().filter_map(Applied::claims) {
            unique.release(id, claims);
        }
    }

    fn publish(&self, applied: &[Applied]) {
        let relationships = self.schema.relationships();
        let mut xtree = self.xtree.write();
        let mut unique = self.unique.lock();
        let mut foreign = self.foreign.write();
        for change in applied {
            match change {
                Applied::Inserted { record, .. } => {
                    xtree.insert(record);
                    if !unique.record(record) {
                        tracing::warn!(table = %self.name(), id = %record.id(), "unique value held by another record");
                    }
                    foreign.record(relationships, record);
                }
                Applied::Updated { old, new, .. } => {
                    xtree.upsert(old, new);
                    if !unique.replace(old, new) {
                        tracing::warn!(table = %self.name(), id = %new.id(), "unique value held by another record");
                    }
                    foreign.record(relationships, new);
                }
                Applied::Deleted(record) => {
                    xtree.disert(record);
                    unique.remove_record(record);
                    foreign.remove(&record.id());
                }
                Applied::Skipped { id, claims, .. } => unique.release(*id, claims),
                Applied::Nothing => {}
            }
        }
    }

    /// Writes `XINDEX`, and `UINDEX`/`FINDEX` where the schema needs them.
    fn persist_indexes(&self) -> CoreResult<()> {
        let _guard = self.persist_lock.lock();
        let xindex = self.xtree.read().persist()?;
        self.store.write(XINDEX_FILE, &xindex)?;
        if !self.schema.unique_columns().is_empty() {
            let uindex = self.unique.lock().persist()?;
            self.store.write(UINDEX_FILE, &uindex)?;
        }
        if !self.schema.relationships().is_empty() {
            let findex = self.foreign.read().persist()?;
            self.store.write(FINDEX_FILE, &findex)?;
        }
        Ok(())
    }

    fn stats(&self) -> TableStats {
        let files = self.files.lock();
        let logs = files
            .iter()
            .map(|(filename, meta)| LogStats {
                filename,
                first_id: meta.first_id,
                last_id: meta.last_id,
                size: meta.size,
            })
            .collect();
        let mut stats = TableStats::new(
            self.name().to_string(),
            files.total_records(),
            self.xtree.read().len(),
            logs,
            &self.counters,
        );
        stats.cached_logs = self.cache.len();
        stats
    }
}

impl BatchCommit for TableCore {
    type Op = WriteOp;
    type Output = CoreResult<Option<Record>>;

    fn commit(&self, file: &str, batch: Vec<WriteOp>) -> CoreResult<Vec<Self::Output>> {
        let inserts = batch.iter().filter(|op| matches!(op, WriteOp::Insert { .. })).count();
        let abort = |applied: &[Applied], err: CoreError| {
            self.release_claims(applied);
            self.files.lock().release_pending(file, inserts);
            self.counters.record_failed_batch();
            Err(err)
        };

        let snapshot = match self.load_log(file) {
            Ok(log) => log,
            Err(err) => {
                let applied: Vec<Applied> = batch.into_iter().map(|op| self.claims_only(op)).collect();
                return abort(&applied, err);
            }
        };
        let mut log = (*snapshot).clone();
        let applied: Vec<Applied> = batch.into_iter().map(|op| self.apply(&mut log, op)).collect();

        if applied.iter().any(Applied::changes_log) {
            let written = logdb_codec::encode(&log)
                .map_err(CoreError::from)
                .and_then(|bytes| self.store.write(file, &bytes).map_err(CoreError::from));
            if let Err(err) = written {
                return abort(&applied, err);
            }

            self.publish(&applied);
            let log = Arc::new(log);
            self.files.lock().record_write_result(file, &log, inserts);
            self.cache.put(file, log);

            if self.config.persist_index {
                if let Err(err) = self.persist_indexes() {
                    // The log is committed. Open checks every index file
                    // against the logs; dropping XINDEX just skips the check.
                    tracing::warn!(table = %self.name(), error = %err, "index persistence failed");
                    if let Err(err) = self.store.remove(XINDEX_FILE) {
                        tracing::warn!(table = %self.name(), error = %err, "failed to remove stale index");
                    }
                }
            }
        } else {
            self.publish(&applied);
            self.files.lock().release_pending(file, inserts);
        }

        let count = |f: fn(&Applied) -> bool| applied.iter().filter(|a| f(a)).count() as u64;
        self.counters.record_batch(
            count(|a| matches!(a, Applied::Inserted { .. })),
            count(|a| matches!(a, Applied::Updated { .. })),
            count(|a| matches!(a, Applied::Deleted(_))),
        );
        Ok(applied.into_iter().map(Applied::into_output).collect())
    }
}

impl TableCore {
    /// An op that never reached the log, reduced to the claims it holds.
    fn claims_only(&self, op: WriteOp) -> Applied {
        match op {
            WriteOp::Insert { record, claims } => Applied::Skipped {
                id: record.id(),
                claims,
                error: None,
            },
            WriteOp::Update { id, claims, .. } => Applied::Skipped {
                id,
                claims,
                error: None,
            },
            WriteOp::Delete { .. } | WriteOp::Noop => Applied::Nothing,
        }
    }
}

/// Handle to one table. Cheap to clone; clones share all state.
///
/// Every method that touches files must run inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct Table {
    core: Arc<TableCore>,
    writer: Arc<WriteCoordinator<TableCore>>,
}

impl Table {
    /// Opens a table over `store`.
    ///
    /// Leftover temporary files are removed, the log files are decoded and
    /// the indexes are restored, or rebuilt from the logs if stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or a log file does not
    /// decode.
    pub async fn open(schema: TableSchema, store: Arc<dyn FileStore>, config: Config) -> CoreResult<Self> {
        let core = tokio::task::spawn_blocking(move || TableCore::open(schema, store, config)).await??;
        let core = Arc::new(core);
        let writer = Arc::new(WriteCoordinator::new(core.name(), Arc::clone(&core)));
        Ok(Self { core, writer })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Table schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.core.schema
    }

    async fn blocking<T, F>(&self, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TableCore) -> CoreResult<T> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || f(&core)).await?
    }

    async fn submit(&self, file: &str, op: WriteOp) -> CoreResult<Option<Record>> {
        self.writer.submit(file, op).await?
    }

    /// Inserts a record and returns it with its new id.
    ///
    /// Any `_id` in `fields` is ignored. Relationship fields are stored as
    /// ids and mirrored in the relationship index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] or [`CoreError::UniqueViolation`]
    /// before anything is queued, or [`CoreError::CommitFailed`] if the log
    /// could not be written.
    pub async fn insert(&self, fields: Fields) -> CoreResult<Record> {
        let fields = self.core.schema.prepare(fields, WriteMode::Insert)?;
        let id = RecordId::new();
        let claims = self.core.unique.lock().claim(self.name(), id, &fields)?;
        let record = Record::new(id, fields);
        let file = self.core.files.lock().select_for_insert();

        self.submit(&file, WriteOp::Insert { record, claims })
            .await?
            .ok_or_else(|| CoreError::TaskFailed {
                message: format!("insert into {file} produced no record"),
            })
    }

    /// Merges `patch` over record `id` and returns the result.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert). A rejected update leaves the record
    /// unchanged.
    pub async fn update(&self, id: RecordId, patch: Fields) -> CoreResult<Option<Record>> {
        let patch = self.core.schema.prepare(patch, WriteMode::Update)?;
        let Some((file, _)) = self.blocking(move |core| core.find(&id)).await? else {
            return Ok(None);
        };
        let claims = self.core.unique.lock().claim(self.name(), id, &patch)?;
        self.submit(&file, WriteOp::Update { id, patch, claims }).await
    }

    /// Deletes record `id` and returns it, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommitFailed`] if the log could not be written.
    pub async fn delete(&self, id: RecordId) -> CoreResult<Option<Record>> {
        let Some((file, _)) = self.blocking(move |core| core.find(&id)).await? else {
            return Ok(None);
        };
        self.submit(&file, WriteOp::Delete { id }).await
    }

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns an error only if a log file cannot be read.
    pub async fn get(&self, id: RecordId) -> CoreResult<Option<Record>> {
        self.blocking(move |core| core.get(&id)).await
    }

    /// Reads every record, in file creation order then id order.
    ///
    /// # Errors
    ///
    /// Returns an error only if a log file cannot be read.
    pub async fn all(&self) -> CoreResult<Vec<Record>> {
        self.blocking(TableCore::all).await
    }

    /// Records matching any of `fields`, see [`XTree::search`].
    ///
    /// # Errors
    ///
    /// Returns an error only if a log file cannot be read.
    pub async fn search(&self, fields: QueryFields, skip: usize, take: Option<usize>) -> CoreResult<Vec<Record>> {
        self.blocking(move |core| core.search(&fields, skip, take)).await
    }

    /// The record holding the first of `fields` found in a unique column.
    ///
    /// # Errors
    ///
    /// Returns an error only if a log file cannot be read.
    pub async fn unique(&self, fields: QueryFields) -> CoreResult<Option<Record>> {
        self.blocking(move |core| core.unique(&fields)).await
    }

    /// Number of matches of `fields`, or of all records when empty.
    #[must_use]
    pub fn count(&self, fields: &[(String, Value)]) -> usize {
        self.core.count(fields)
    }

    /// Relationship links of record `id`.
    #[must_use]
    pub fn links_of(&self, id: &RecordId) -> BTreeMap<String, Link> {
        self.core.foreign.read().links_of(id).cloned().unwrap_or_default()
    }

    /// Waits until every write queued so far has committed.
    ///
    /// # Errors
    ///
    /// Returns an error if a drain died.
    pub async fn flush(&self) -> CoreResult<()> {
        let files = self.core.files.lock().select_all();
        for file in files {
            self.submit(&file, WriteOp::Noop).await?;
        }
        Ok(())
    }

    /// Writes the index files now.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub async fn persist_indexes(&self) -> CoreResult<()> {
        self.blocking(TableCore::persist_indexes).await
    }

    /// Flushes pending writes and persists the indexes.
    ///
    /// # Errors
    ///
    /// As [`flush`](Self::flush) and [`persist_indexes`](Self::persist_indexes).
    pub async fn close(&self) -> CoreResult<()> {
        self.flush().await?;
        self.persist_indexes().await?;
        tracing::debug!(table = %self.name(), "table closed");
        Ok(())
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> TableStats {
        self.core.stats()
    }

    /// Runs a query descriptor.
    ///
    /// `populate` is ignored here; [`crate::Database::run_query`] resolves
    /// links across tables.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an update without a valid
    /// `_id`, and otherwise the errors of the operation run.
    pub async fn run_query(&self, query: Query) -> CoreResult<QueryOutput> {
        let output = match query.op {
            QueryOp::Select(Selector::All) => {
                let records = self.all().await?;
                QueryOutput::Records(query.page(records))
            }
            QueryOp::Select(Selector::Id(id)) => QueryOutput::Record(self.get(id).await?),
            QueryOp::Insert(fields) => QueryOutput::Record(Some(self.insert(fields).await?)),
            QueryOp::Update(mut fields) => {
                let id = fields
                    .remove(ID_FIELD)
                    .and_then(|v| v.as_text().and_then(|s| s.parse::<RecordId>().ok()))
                    .ok_or_else(|| CoreError::validation(self.name(), "update requires a valid _id"))?;
                QueryOutput::Record(self.update(id, fields).await?)
            }
            QueryOp::Delete(id) => {
                self.delete(id).await?;
                QueryOutput::Done
            }
            QueryOp::Search(fields) => QueryOutput::Records(self.search(fields, query.skip, query.take).await?),
            QueryOp::Unique(fields) => QueryOutput::Record(self.unique(fields).await?),
            QueryOp::Count(fields) => QueryOutput::Count(self.count(&fields)),
        };
        Ok(output)
    }

    /// Checks the secondary and unique indexes against every committed record.
    ///
    /// Reads every log file; meant for tests and diagnostics.
    #[must_use]
    pub fn index_consistent(&self) -> bool {
        let Ok(records) = self.core.all() else {
            return false;
        };
        self.core.xtree.read().confirm(&records) && self.core.unique.lock().confirm(&records)
    }
}
