//! §8 scenario: "a nested select with a join" executed end to end against a
//! real SQLite file, exercising `QueryExecutor::select` rather than just the
//! SQL-string builders in `query::select`'s own unit tests.

mod support;

use gateway_core::executor::QueryExecutor;
use gateway_core::schema::discover_schema;
use serde_json::json;

#[tokio::test]
async fn nested_select_returns_joined_child_rows() {
    let (_dir, primary, config) = support::open_primary().await;
    let conn = primary.connect().await.unwrap();

    conn.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        (),
    )
    .await
    .unwrap();
    conn.execute(
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL REFERENCES users(id), title TEXT NOT NULL)",
        (),
    )
    .await
    .unwrap();
    conn.execute("INSERT INTO users (id, name) VALUES (1, 'Ada')", ())
        .await
        .unwrap();
    conn.execute("INSERT INTO users (id, name) VALUES (2, 'Grace')", ())
        .await
        .unwrap();
    conn.execute(
        "INSERT INTO posts (id, user_id, title) VALUES (1, 1, 'Engine notes')",
        (),
    )
    .await
    .unwrap();
    conn.execute(
        "INSERT INTO posts (id, user_id, title) VALUES (2, 1, 'Second post')",
        (),
    )
    .await
    .unwrap();

    let schema = discover_schema(&conn).await.unwrap();
    let executor = QueryExecutor::new(&conn, &schema, &config, false);

    let select_items = vec![json!("id"), json!("name"), json!({"posts": ["title"]})];
    let order = serde_json::Map::new();
    let (data, total) = executor
        .select("users", &select_items, &[], &order, None, None, false)
        .await
        .unwrap();

    assert!(total.is_none());
    let rows = data.as_array().expect("array of rows");
    assert_eq!(rows.len(), 2);

    let ada = rows
        .iter()
        .find(|r| r["name"] == "Ada")
        .expect("Ada row present");
    let posts = ada["posts"].as_array().expect("posts array");
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().any(|p| p["title"] == "Engine notes"));

    let grace = rows
        .iter()
        .find(|r| r["name"] == "Grace")
        .expect("Grace row present");
    assert_eq!(grace["posts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn count_exact_reports_total_independent_of_limit() {
    let (_dir, primary, config) = support::open_primary().await;
    let conn = primary.connect().await.unwrap();

    conn.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL)", ())
        .await
        .unwrap();
    for i in 1i64..=5 {
        conn.execute(
            "INSERT INTO items (id, label) VALUES (?, ?)",
            libsql::params![i, format!("item-{i}")],
        )
        .await
        .unwrap();
    }

    let schema = discover_schema(&conn).await.unwrap();
    let executor = QueryExecutor::new(&conn, &schema, &config, false);

    let select_items = vec![json!("id")];
    let order = serde_json::Map::new();
    let (data, total) = executor
        .select("items", &select_items, &[], &order, Some(2), None, true)
        .await
        .unwrap();

    assert_eq!(total, Some(5));
    assert_eq!(data.as_array().unwrap().len(), 2);
}
