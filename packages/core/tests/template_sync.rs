//! Template lifecycle against the primary database: create, update, list,
//! associate/disassociate with a daughter, and the "still in use" delete
//! guard. The additive schema-diff half of sync (`sync_one_fallible`)
//! requires an actual daughter connection (a remote LibSQL/Turso database)
//! and so isn't exercised here — `query::ddl`'s own unit tests cover the SQL
//! it emits, and `tenant_registry.rs` covers the bookkeeping this relies on.

mod support;

use std::sync::Arc;

use gateway_core::error::GatewayError;
use gateway_core::schema::{Column, ColumnType, Table};
use gateway_core::tenant::{TemplateEngine, TenantRegistry};
use support::FakeProvider;

fn users_table() -> Table {
    let mut table = Table::new("users");
    table.primary_key = Some("id".to_string());
    table.columns.push(Column::new("id", ColumnType::Integer));
    table.columns.push(Column::new("name", ColumnType::Text));
    table
}

#[tokio::test]
async fn create_get_and_update_round_trip_table_list() {
    let (_dir, primary, _config) = support::open_primary().await;
    let templates = TemplateEngine::new(primary.clone());

    let created = templates.create("starter", vec![users_table()]).await.unwrap();
    assert_eq!(created.name, "starter");
    assert_eq!(created.tables.len(), 1);

    let mut updated_tables = created.tables.clone();
    updated_tables.push({
        let mut t = Table::new("posts");
        t.columns.push(Column::new("id", ColumnType::Integer));
        t
    });
    let updated = templates.update("starter", updated_tables).await.unwrap();
    assert_eq!(updated.tables.len(), 2);

    let fetched = templates.get("starter").await.unwrap();
    assert_eq!(fetched.tables.len(), 2);

    let all = templates.list().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn get_unknown_template_is_not_found() {
    let (_dir, primary, _config) = support::open_primary().await;
    let templates = TemplateEngine::new(primary);

    let err = templates.get("ghost").await.unwrap_err();
    assert!(matches!(err, GatewayError::TemplateNotFound { .. }));
}

#[tokio::test]
async fn deleting_a_template_in_use_is_rejected() {
    let (_dir, primary, config) = support::open_primary().await;
    let registry = Arc::new(
        TenantRegistry::open(primary.clone(), Arc::new(FakeProvider), Arc::new(config))
            .await
            .unwrap(),
    );
    let templates = TemplateEngine::new(primary);

    templates.create("starter", vec![users_table()]).await.unwrap();
    registry.create_daughter("tenant-a", None).await.unwrap();
    templates.associate(&registry, "tenant-a", "starter").await.unwrap();

    let err = templates.delete(&registry, "starter").await.unwrap_err();
    assert!(matches!(err, GatewayError::TemplateInUse { .. }));

    let inspected = templates.inspect(&registry, "tenant-a").await.unwrap();
    assert_eq!(inspected.unwrap().name, "starter");

    templates.disassociate(&registry, "tenant-a").await.unwrap();
    templates.delete(&registry, "starter").await.unwrap();
}
