//! §8 scenarios: "an upsert on a rowid table" and "a batch that rolls back
//! after a failing operation partway through".

mod support;

use gateway_core::batch::{run_batch, BatchOperation, BatchOperationKind};
use gateway_core::executor::QueryExecutor;
use gateway_core::schema::discover_schema;
use serde_json::json;

async fn seed_counters(conn: &libsql::Connection) {
    conn.execute(
        "CREATE TABLE counters (name TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        (),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn upsert_on_rowid_table_updates_existing_row() {
    let (_dir, primary, config) = support::open_primary().await;
    let conn = primary.connect().await.unwrap();
    seed_counters(&conn).await;
    conn.execute("INSERT INTO counters (name, value) VALUES ('hits', 1)", ())
        .await
        .unwrap();

    let schema = discover_schema(&conn).await.unwrap();
    let executor = QueryExecutor::new(&conn, &schema, &config, false);

    let mut row = serde_json::Map::new();
    row.insert("name".to_string(), json!("hits"));
    row.insert("value".to_string(), json!(42));
    executor.upsert("counters", &[row]).await.unwrap();

    let order = serde_json::Map::new();
    let (data, _) = executor
        .select("counters", &[json!("value")], &[], &order, None, None, false)
        .await
        .unwrap();
    assert_eq!(data.as_array().unwrap()[0]["value"], 42);
}

#[tokio::test]
async fn batch_rolls_back_entirely_on_mid_batch_failure() {
    let (_dir, primary, config) = support::open_primary().await;
    let conn = primary.connect().await.unwrap();
    seed_counters(&conn).await;

    let operations = vec![
        BatchOperation {
            operation: BatchOperationKind::Insert,
            table: "counters".to_string(),
            body: json!({ "data": { "name": "a", "value": 1 } }),
        },
        BatchOperation {
            operation: BatchOperationKind::Insert,
            table: "counters".to_string(),
            body: json!({ "data": { "name": "a", "value": 2 } }), // duplicate primary key
        },
    ];

    let schema = discover_schema(&conn).await.unwrap();
    let result = run_batch(&conn, &schema, &config, &operations, false).await;
    assert!(result.is_err());

    let executor = QueryExecutor::new(&conn, &schema, &config, false);
    let order = serde_json::Map::new();
    let (data, _) = executor
        .select("counters", &[json!("name")], &[], &order, None, None, false)
        .await
        .unwrap();
    assert_eq!(
        data.as_array().unwrap().len(),
        0,
        "first insert must have been rolled back alongside the failing second one"
    );
}

#[tokio::test]
async fn batch_exceeding_max_operations_is_rejected_before_any_execute() {
    let (_dir, primary, mut config) = support::open_primary().await;
    let conn = primary.connect().await.unwrap();
    seed_counters(&conn).await;
    config.max_batch_operations = 1;

    let operations = vec![
        BatchOperation {
            operation: BatchOperationKind::Insert,
            table: "counters".to_string(),
            body: json!({ "data": { "name": "a", "value": 1 } }),
        },
        BatchOperation {
            operation: BatchOperationKind::Insert,
            table: "counters".to_string(),
            body: json!({ "data": { "name": "b", "value": 2 } }),
        },
    ];

    let schema = discover_schema(&conn).await.unwrap();
    let err = run_batch(&conn, &schema, &config, &operations, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        gateway_core::error::GatewayError::BatchTooLarge { size: 2, max: 1 }
    ));
}
