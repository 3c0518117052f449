//! Performance benchmarks for gateway-core's hot path: row insertion and
//! select planning against a real SQLite file.
//!
//! Run with: `cargo bench -p gateway-core`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gateway_core::config::GatewayConfig;
use gateway_core::db::PrimaryConnection;
use gateway_core::executor::QueryExecutor;
use gateway_core::schema::{discover_schema, SchemaSnapshot};
use serde_json::json;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn bench_config() -> GatewayConfig {
    GatewayConfig {
        primary_db_path: std::path::PathBuf::new(),
        turso_organization: None,
        turso_api_key: None,
        max_batch_operations: 1000,
        max_query_depth: 5,
        max_query_limit: 10_000,
        default_limit: 100,
        max_body_bytes: 10 * 1024 * 1024,
        token_expiry_seconds: None,
        fts_suffix: gateway_core::FTS_TABLE_SUFFIX.to_string(),
        internal_table_prefix: gateway_core::INTERNAL_TABLE_PREFIX.to_string(),
        http_addr: "127.0.0.1:0".to_string(),
    }
}

async fn setup_widgets() -> (TempDir, PrimaryConnection, SchemaSnapshot) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.db");
    let primary = PrimaryConnection::open(&path).await.unwrap();
    let conn = primary.connect().await.unwrap();
    conn.execute(
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price INTEGER NOT NULL)",
        (),
    )
    .await
    .unwrap();
    let schema = discover_schema(&conn).await.unwrap();
    (dir, primary, schema)
}

/// Sequential single-row inserts, one `QueryExecutor::insert` call per row.
fn bench_sequential_inserts(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = bench_config();

    c.bench_function("insert_50_rows_sequential", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let (_dir, primary, schema) = setup_widgets().await;
                    let conn = primary.connect().await.unwrap();
                    let executor = QueryExecutor::new(&conn, &schema, &config, true);

                    let start = std::time::Instant::now();
                    for i in 0..50 {
                        let mut row = serde_json::Map::new();
                        row.insert("name".to_string(), json!(format!("widget-{i}")));
                        row.insert("price".to_string(), json!(i));
                        black_box(executor.insert("widgets", &[row], &[], false).await.unwrap());
                    }
                    total += start.elapsed();
                }
                total
            })
        });
    });
}

/// Fifty rows in a single `QueryExecutor::insert` call, mirroring the
/// batch-vs-sequential comparison pattern.
fn bench_batched_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = bench_config();

    c.bench_function("insert_50_rows_batched", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let (_dir, primary, schema) = setup_widgets().await;
                    let conn = primary.connect().await.unwrap();
                    let executor = QueryExecutor::new(&conn, &schema, &config, true);

                    let rows: Vec<_> = (0..50)
                        .map(|i| {
                            let mut row = serde_json::Map::new();
                            row.insert("name".to_string(), json!(format!("widget-{i}")));
                            row.insert("price".to_string(), json!(i));
                            row
                        })
                        .collect();

                    let start = std::time::Instant::now();
                    black_box(executor.insert("widgets", &rows, &[], false).await.unwrap());
                    total += start.elapsed();
                }
                total
            })
        });
    });
}

/// Select-with-filter latency once the table holds a few hundred rows.
fn bench_filtered_select(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = bench_config();

    let mut group = c.benchmark_group("select");
    group.sample_size(20);

    group.bench_function("filtered_select_500_rows", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (_dir, primary, schema) = setup_widgets().await;
                let conn = primary.connect().await.unwrap();
                let executor = QueryExecutor::new(&conn, &schema, &config, true);

                let rows: Vec<_> = (0..500)
                    .map(|i| {
                        let mut row = serde_json::Map::new();
                        row.insert("name".to_string(), json!(format!("widget-{i}")));
                        row.insert("price".to_string(), json!(i));
                        row
                    })
                    .collect();
                executor.insert("widgets", &rows, &[], false).await.unwrap();

                let select_items = vec![json!("id"), json!("name")];
                let where_items = vec![json!({"price": {"gt": 250}})];
                let order = serde_json::Map::new();

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(
                        executor
                            .select("widgets", &select_items, &where_items, &order, Some(50), None, false)
                            .await
                            .unwrap(),
                    );
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_inserts,
    bench_batched_insert,
    bench_filtered_select
);
criterion_main!(benches);
