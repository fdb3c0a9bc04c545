//! Database context.

use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::index::Link;
use crate::query::{Query, QueryOutput};
use crate::record::Record;
use crate::schema::{RelationKind, TableSchema};
use crate::table::Table;
use logdb_codec::Value;
use logdb_storage::{DirStore, FileStore, InMemoryStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The main database handle: a registry of tables.
///
/// Tables are declared each session with [`create_table`](Self::create_table),
/// which loads whatever the table directory already holds.
///
/// # Opening a Database
///
/// ```rust,ignore
/// use logdb_core::{Column, Config, Database, FieldKind, Query, TableSchema};
///
/// let db = Database::open(Path::new("my_database")).await?;
/// let users = db
///     .create_table(TableSchema::new("users").column(Column::new("name", FieldKind::Text)))
///     .await?;
/// let ann = users.insert(fields).await?;
///
/// let found = db
///     .run_query("users", Query::search(vec![("name".into(), "ann".into())]))
///     .await?;
/// db.close().await?;
/// ```
///
/// # In-Memory Databases
///
/// ```rust,ignore
/// let db = Database::open_in_memory();
/// ```
#[derive(Debug)]
pub struct Database {
    config: Config,
    /// `None` for in-memory databases.
    dir: Option<DatabaseDir>,
    tables: RwLock<HashMap<String, Table>>,
    is_open: AtomicBool,
}

impl Database {
    /// Opens or creates a database at `path` with the default config.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or is locked.
    pub async fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default()).await
    }

    /// Opens or creates a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or is locked by
    /// another process.
    pub async fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let path = path.to_path_buf();
        let create = config.create_if_missing;
        let dir = tokio::task::spawn_blocking(move || DatabaseDir::open(&path, create)).await??;
        tracing::info!(path = %dir.path().display(), "database opened");
        Ok(Self {
            config,
            dir: Some(dir),
            tables: RwLock::new(HashMap::new()),
            is_open: AtomicBool::new(true),
        })
    }

    /// Creates a database whose tables live in memory.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            config: Config::default(),
            dir: None,
            tables: RwLock::new(HashMap::new()),
            is_open: AtomicBool::new(true),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Declares a table and opens its files.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableExists`] if a table of that name was
    /// already declared, [`CoreError::Validation`] for an unusable name, or
    /// an error loading the table's files.
    pub async fn create_table(&self, schema: TableSchema) -> CoreResult<Table> {
        self.ensure_open()?;
        let name = schema.name().to_string();
        if self.tables.read().contains_key(&name) {
            return Err(CoreError::TableExists { name });
        }

        let store: Arc<dyn FileStore> = match &self.dir {
            Some(dir) => {
                let path = dir.table_path(&name)?;
                let sync = self.config.sync_directory;
                let store = tokio::task::spawn_blocking(move || DirStore::open(&path)).await??;
                Arc::new(store.with_directory_sync(sync))
            }
            None => Arc::new(InMemoryStore::new()),
        };
        let table = Table::open(schema, store, self.config.clone()).await?;

        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return Err(CoreError::TableExists { name });
        }
        tables.insert(name, table.clone());
        Ok(table)
    }

    /// Returns a declared table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`] if no table of that name was declared.
    pub fn table(&self, name: &str) -> CoreResult<Table> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    /// Names of the declared tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs a query against table `name`, populating links if requested.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`] for an unknown table, and
    /// otherwise the errors of [`Table::run_query`].
    pub async fn run_query(&self, name: &str, query: Query) -> CoreResult<QueryOutput> {
        self.ensure_open()?;
        let table = self.table(name)?;
        let populate = query.populate;
        let output = table.run_query(query).await?;
        if !populate {
            return Ok(output);
        }
        Ok(match output {
            QueryOutput::Record(Some(record)) => QueryOutput::Record(Some(self.populate(&table, record).await?)),
            QueryOutput::Records(records) => {
                let mut populated = Vec::with_capacity(records.len());
                for record in records {
                    populated.push(self.populate(&table, record).await?);
                }
                QueryOutput::Records(populated)
            }
            other => other,
        })
    }

    /// Writes each relationship of `record` as the linked record(s).
    ///
    /// A to-one link becomes the record or null, a to-many link an array of
    /// the records that still exist.
    async fn populate(&self, table: &Table, mut record: Record) -> CoreResult<Record> {
        let links = table.links_of(&record.id());
        for rel in table.schema().relationships() {
            let link = links.get(&rel.name).cloned().unwrap_or(Link::None);
            let target = self.table(&rel.target).ok();
            let mut found = Vec::new();
            if let Some(target) = &target {
                for id in link.ids() {
                    if let Some(linked) = target.get(id).await? {
                        found.push(linked.into_value());
                    }
                }
            }
            let value = match rel.kind {
                RelationKind::One => found.into_iter().next().unwrap_or(Value::Null),
                RelationKind::Many => Value::Array(found),
            };
            record.set(rel.name.clone(), value);
        }
        Ok(record)
    }

    /// Flushes every table, persists its indexes, and closes the database.
    ///
    /// # Errors
    ///
    /// Returns the first error a table reports; the database is closed
    /// regardless.
    pub async fn close(&self) -> CoreResult<()> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let tables: Vec<Table> = self.tables.read().values().cloned().collect();
        let mut first_error = None;
        for table in tables {
            if let Err(err) = table.close().await {
                tracing::error!(table = %table.name(), error = %err, "failed to close table");
                first_error.get_or_insert(err);
            }
        }
        tracing::info!("database closed");
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, FieldKind, Relationship};
    use crate::record::Fields;

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn table_registry() {
        let db = Database::open_in_memory();
        db.create_table(TableSchema::new("notes")).await.unwrap();

        assert!(matches!(
            db.create_table(TableSchema::new("notes")).await,
            Err(CoreError::TableExists { .. })
        ));
        assert!(matches!(db.table("missing"), Err(CoreError::TableNotFound { .. })));
        assert_eq!(db.table_names(), vec!["notes".to_string()]);
    }

    #[tokio::test]
    async fn populate_resolves_links() {
        let db = Database::open_in_memory();
        let teams = db
            .create_table(TableSchema::new("teams").column(Column::new("title", FieldKind::Text)))
            .await
            .unwrap();
        let users = db
            .create_table(
                TableSchema::new("users")
                    .column(Column::new("name", FieldKind::Text))
                    .relationship(Relationship::one("team", "teams"))
                    .relationship(Relationship::many("friends", "users")),
            )
            .await
            .unwrap();

        let red = teams.insert(fields(&[("title", Value::from("red"))])).await.unwrap();
        let bob = users.insert(fields(&[("name", Value::from("bob"))])).await.unwrap();
        let ann = users
            .insert(fields(&[
                ("name", Value::from("ann")),
                ("team", Value::from(red.id().to_string())),
                ("friends", Value::Array(vec![Value::from(bob.id().to_string())])),
            ]))
            .await
            .unwrap();
        let team_id = Value::from(red.id().to_string());
        assert_eq!(ann.get("team"), Some(team_id.clone()));

        let plain = db.run_query("users", Query::select(ann.id())).await.unwrap();
        assert_eq!(plain.into_record().unwrap().get("team"), Some(team_id));

        let populated = db
            .run_query("users", Query::select(ann.id()).populate(true))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(populated.get("team"), Some(red.into_value()));
        assert_eq!(populated.get("friends"), Some(Value::Array(vec![bob.clone().into_value()])));

        // Links to deleted records resolve to nothing.
        users.delete(bob.id()).await.unwrap();
        let populated = db
            .run_query("users", Query::select(ann.id()).populate(true))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(populated.get("friends"), Some(Value::Array(Vec::new())));
    }

    #[tokio::test]
    async fn closed_database_rejects_queries() {
        let db = Database::open_in_memory();
        db.create_table(TableSchema::new("notes")).await.unwrap();
        db.close().await.unwrap();

        assert!(!db.is_open());
        assert!(matches!(
            db.run_query("notes", Query::count_all()).await,
            Err(CoreError::DatabaseClosed)
        ));
        assert!(matches!(
            db.create_table(TableSchema::new("later")).await,
            Err(CoreError::DatabaseClosed)
        ));
        assert!(db.close().await.is_ok());
    }
}
