//! §4.3 "Reserved table guard" — direct `/query` operations against the
//! tenant registry's own bookkeeping tables must fail with `ReservedTable`
//! rather than leak their contents (`__gateway_databases` carries each
//! daughter's bearer token).

mod support;

use std::sync::Arc;

use gateway_core::error::GatewayError;
use gateway_core::executor::QueryExecutor;
use gateway_core::schema::discover_schema;
use gateway_core::tenant::TenantRegistry;
use serde_json::json;
use support::FakeProvider;

#[tokio::test]
async fn select_against_the_registry_table_is_rejected() {
    let (_dir, primary, config) = support::open_primary().await;
    let config = Arc::new(config);
    TenantRegistry::open(primary.clone(), Arc::new(FakeProvider), config.clone())
        .await
        .unwrap();

    let conn = primary.connect().await.unwrap();
    let schema = discover_schema(&conn).await.unwrap();
    let executor = QueryExecutor::new(&conn, &schema, &config, true);

    let order = serde_json::Map::new();
    let err = executor
        .select("__gateway_databases", &[json!("*")], &[], &order, None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ReservedTable { .. }));
}

#[tokio::test]
async fn any_table_named_with_the_internal_prefix_is_reserved() {
    let (_dir, primary, config) = support::open_primary().await;
    let conn = primary.connect().await.unwrap();
    conn.execute(
        "CREATE TABLE __gateway_anything (id INTEGER PRIMARY KEY)",
        (),
    )
    .await
    .unwrap();
    let schema = discover_schema(&conn).await.unwrap();
    let executor = QueryExecutor::new(&conn, &schema, &config, true);

    let order = serde_json::Map::new();
    let err = executor
        .select("__gateway_anything", &[json!("*")], &[], &order, None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ReservedTable { .. }));
}
