//! End-to-end behavior of tables on disk.

use logdb_core::{
    Column, Config, CoreError, Database, FieldKind, Fields, Query, Record, RecordId, TableSchema, Value, XTree,
};
use logdb_storage::{temp_name, SYNC_SUFFIX};
use std::path::Path;
use tempfile::tempdir;

fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn people() -> TableSchema {
    TableSchema::new("people")
        .column(Column::new("name", FieldKind::Text))
        .column(Column::new("email", FieldKind::Text).unique())
        .column(Column::new("age", FieldKind::Integer))
}

fn read_log(dir: &Path, table: &str, file: &str) -> Vec<Record> {
    let bytes = std::fs::read(dir.join(table).join(file)).unwrap();
    logdb_codec::decode(&bytes).unwrap()
}

#[test]
fn scenario_a_fresh_tree_search() {
    let john = Record::new(RecordId::new(), fields(&[("name", Value::from("john"))]));
    let mut tree = XTree::new(None);
    tree.insert(&john);

    let query = vec![("name".to_string(), Value::from("john"))];
    assert_eq!(tree.search(&query, 0, None), vec![john.id()]);
}

#[tokio::test]
async fn scenario_a_insert_then_search() {
    let db = Database::open_in_memory();
    let table = db.create_table(TableSchema::new("notes")).await.unwrap();

    let john = table.insert(fields(&[("name", Value::from("john"))])).await.unwrap();
    assert_eq!(john.get("_id").and_then(|v| v.as_text().map(str::len)), Some(24));

    let found = table
        .search(vec![("name".to_string(), Value::from("john"))], 0, None)
        .await
        .unwrap();
    assert_eq!(found, vec![john]);
}

#[tokio::test]
async fn scenario_b_count_and_delete() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).await.unwrap();
    let table = db.create_table(people()).await.unwrap();

    let mut ids = Vec::new();
    for age in 0..5 {
        ids.push(table.insert(fields(&[("age", Value::from(age))])).await.unwrap().id());
    }
    assert_eq!(table.count(&[]), 5);

    let gone = ids[2];
    assert!(table.delete(gone).await.unwrap().is_some());
    assert_eq!(table.count(&[]), 4);
    assert_eq!(
        db.run_query("people", Query::count_all()).await.unwrap().count(),
        Some(4)
    );

    assert!(read_log(dir.path(), "people", "LOG-1").iter().all(|r| r.id() != gone));
    assert!(table
        .search(vec![("age".to_string(), Value::from(2))], 0, None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(table.stats().indexed, 4);
    assert!(table.index_consistent());
}

#[tokio::test]
async fn scenario_c_unique_update_rejected() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).await.unwrap();
    let table = db.create_table(people()).await.unwrap();

    table
        .insert(fields(&[("email", Value::from("ann@x"))]))
        .await
        .unwrap();
    let bob = table
        .insert(fields(&[("email", Value::from("bob@x")), ("age", Value::from(1))]))
        .await
        .unwrap();
    let before = read_log(dir.path(), "people", "LOG-1");

    let err = table
        .update(bob.id(), fields(&[("email", Value::from("ann@x")), ("age", Value::from(2))]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UniqueViolation { ref column, .. } if column == "email"));
    assert!(err.to_string().contains("people"));

    assert_eq!(read_log(dir.path(), "people", "LOG-1"), before);
    assert_eq!(table.get(bob.id()).await.unwrap(), Some(bob.clone()));

    // Re-saving a record's own unique value is fine.
    let same = table
        .update(bob.id(), fields(&[("email", Value::from("bob@x"))]))
        .await
        .unwrap();
    assert!(same.is_some());

    // A released value can be taken.
    table
        .update(bob.id(), fields(&[("email", Value::from("bee@x"))]))
        .await
        .unwrap();
    table
        .insert(fields(&[("email", Value::from("bob@x"))]))
        .await
        .unwrap();
}

#[tokio::test]
async fn scenario_d_interrupted_write_is_discarded() {
    let dir = tempdir().unwrap();
    let table_dir = dir.path().join("people");

    let committed = {
        let db = Database::open(dir.path()).await.unwrap();
        let table = db.create_table(people()).await.unwrap();
        for age in 0..3 {
            table.insert(fields(&[("age", Value::from(age))])).await.unwrap();
        }
        db.close().await.unwrap();
        std::fs::read(table_dir.join("LOG-1")).unwrap()
    };

    // A crash mid-write leaves a truncated temporary next to the intact file.
    let temp = table_dir.join(temp_name("LOG-1"));
    std::fs::write(&temp, &committed[..committed.len() / 2]).unwrap();
    std::fs::write(table_dir.join(format!("XINDEX{SYNC_SUFFIX}")), b"x").unwrap();

    let db = Database::open(dir.path()).await.unwrap();
    let table = db.create_table(people()).await.unwrap();

    assert_eq!(std::fs::read(table_dir.join("LOG-1")).unwrap(), committed);
    assert!(!temp.exists());
    assert!(std::fs::read_dir(&table_dir)
        .unwrap()
        .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(SYNC_SUFFIX)));
    assert_eq!(table.count(&[]), 3);
}

#[tokio::test]
async fn validation_names_table_and_field() {
    let db = Database::open_in_memory();
    let table = db.create_table(people()).await.unwrap();

    let err = table
        .insert(fields(&[("age", Value::from("old"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(err.to_string().contains("people"));
    assert!(err.to_string().contains("age"));
    assert_eq!(table.count(&[]), 0);
}

#[tokio::test]
async fn reads_of_missing_records_are_empty() {
    let db = Database::open_in_memory();
    let table = db.create_table(people()).await.unwrap();

    assert_eq!(table.get(RecordId::new()).await.unwrap(), None);
    assert!(table.all().await.unwrap().is_empty());
    assert!(table
        .unique(vec![("email".to_string(), Value::from("nobody"))])
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unique_query_finds_owner() {
    let db = Database::open_in_memory();
    let table = db.create_table(people()).await.unwrap();
    let ann = table
        .insert(fields(&[("email", Value::from("ann@x"))]))
        .await
        .unwrap();

    let found = db
        .run_query(
            "people",
            Query::unique(vec![("email".to_string(), Value::from("ann@x"))]),
        )
        .await
        .unwrap()
        .into_record();
    assert_eq!(found, Some(ann));
}

#[tokio::test]
async fn select_all_pages_across_files() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_config(dir.path(), Config::default().log_capacity(3))
        .await
        .unwrap();
    let table = db.create_table(people()).await.unwrap();

    let mut inserted = Vec::new();
    for age in 0..7 {
        inserted.push(table.insert(fields(&[("age", Value::from(age))])).await.unwrap());
    }
    assert_eq!(table.stats().logs.len(), 3);

    let page = db
        .run_query("people", Query::select_all().skip(2).take(3))
        .await
        .unwrap()
        .into_records();
    assert_eq!(page, inserted[2..5].to_vec());
}
