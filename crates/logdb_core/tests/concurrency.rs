//! Concurrent writers against one table.

use logdb_core::{Column, Config, CoreError, Database, FieldKind, Fields, RecordId, TableSchema, Value};
use std::collections::BTreeSet;
use tempfile::tempdir;
use tokio::task::JoinSet;

fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn accounts() -> TableSchema {
    TableSchema::new("accounts")
        .column(Column::new("n", FieldKind::Integer))
        .column(Column::new("email", FieldKind::Text).unique())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_are_all_committed() {
    const N: i64 = 100;
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).await.unwrap();
    let table = db.create_table(accounts()).await.unwrap();

    let mut tasks = JoinSet::new();
    for n in 0..N {
        let table = table.clone();
        tasks.spawn(async move { table.insert(fields(&[("n", Value::from(n))])).await });
    }
    let mut ids = BTreeSet::new();
    while let Some(joined) = tasks.join_next().await {
        ids.insert(joined.unwrap().unwrap().id());
    }
    assert_eq!(ids.len(), N as usize);

    let stats = table.stats();
    assert_eq!(stats.logs.len(), 1);
    assert_eq!(stats.logs[0].size, N as usize);
    assert_eq!(stats.logs[0].last_id, ids.iter().next_back().copied());
    assert_eq!(stats.inserts, N as u64);

    let stored: BTreeSet<RecordId> = table.all().await.unwrap().iter().map(|r| r.id()).collect();
    assert_eq!(stored, ids);
    assert!(table.index_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_across_files() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_config(dir.path(), Config::default().log_capacity(8))
        .await
        .unwrap();
    let table_small = db.create_table(accounts()).await.unwrap();

    let mut tasks = JoinSet::new();
    for n in 0..50i64 {
        let table = table_small.clone();
        tasks.spawn(async move { table.insert(fields(&[("n", Value::from(n))])).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let stats = table_small.stats();
    assert_eq!(stats.records, 50);
    assert!(stats.logs.iter().all(|log| log.size <= 8));
    assert_eq!(stats.logs.len(), 7);
    assert!(table_small.index_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_unique_values_admit_one_winner() {
    let db = Database::open_in_memory();
    let table = db.create_table(accounts()).await.unwrap();

    let mut tasks = JoinSet::new();
    for n in 0..20i64 {
        let table = table.clone();
        tasks.spawn(async move {
            table
                .insert(fields(&[("n", Value::from(n)), ("email", Value::from("same@x"))]))
                .await
        });
    }
    let mut won = 0;
    let mut lost = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => won += 1,
            Err(CoreError::UniqueViolation { .. }) => lost += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((won, lost), (1, 19));
    assert_eq!(table.count(&[]), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_writes_keep_index_and_logs_in_step() {
    let db = Database::open_in_memory();
    let table = db.create_table(accounts()).await.unwrap();

    let mut ids = Vec::new();
    for n in 0..30i64 {
        ids.push(table.insert(fields(&[("n", Value::from(n % 5))])).await.unwrap().id());
    }

    let mut tasks = JoinSet::new();
    for (i, id) in ids.iter().copied().enumerate() {
        let table = table.clone();
        tasks.spawn(async move {
            if i % 3 == 0 {
                table.delete(id).await.map(|_| ())
            } else {
                table.update(id, fields(&[("n", Value::from(7))])).await.map(|_| ())
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }
    table.flush().await.unwrap();

    assert_eq!(table.count(&[]), 20);
    assert!(table.index_consistent());
    let sevens = table
        .search(vec![("n".to_string(), Value::from(7))], 0, None)
        .await
        .unwrap();
    assert_eq!(sevens.len(), 20);
    assert_eq!(table.count(&[("n".to_string(), Value::from(7))]), 20);
    for n in 0..5 {
        assert_eq!(table.count(&[("n".to_string(), Value::from(n))]), 0);
    }
}
