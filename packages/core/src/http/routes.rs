//! §6 "HTTP surface" — a thin route table. Request/response JSON contracts
//! only: no auth, CORS, or rate-limiting layers live here (those stay
//! external per spec's Non-goals).

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::batch::{self, BatchOperation};
use crate::error::GatewayError;
use crate::executor::QueryExecutor;
use crate::fts;
use crate::query::ddl;
use crate::schema::{Column, Table};

use super::extract::{tenant_from_headers, ApiError};
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route("/query/:table", post(query_post).patch(query_patch).delete(query_delete))
        .route("/batch", post(batch_post))
        .route("/schema", get(schema_get))
        .route("/schema/invalidate", post(schema_invalidate_post))
        .route(
            "/schema/table/:table",
            get(schema_table_get)
                .post(schema_table_post)
                .delete(schema_table_delete)
                .patch(schema_table_patch),
        )
        .route("/schema/fts", get(schema_fts_list).post(schema_fts_create))
        .route("/schema/fts/:table", axum::routing::delete(schema_fts_drop))
        .route("/tenants", get(tenants_list).post(tenants_create))
        .route("/tenants/:name", axum::routing::delete(tenants_delete).patch(tenants_patch))
        .route(
            "/tenants/:name/template",
            get(tenants_template_get)
                .post(tenants_template_post)
                .delete(tenants_template_delete),
        )
        .route("/templates", get(templates_list).post(templates_create))
        .route(
            "/templates/:name",
            get(templates_get).put(templates_put).delete(templates_delete),
        )
        .route("/templates/:name/sync", post(templates_sync))
        .route("/health", get(health_get))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

fn prefer_directives(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').map(|d| d.trim().to_ascii_lowercase()).collect())
        .unwrap_or_default()
}

async fn refresh_schema_cache(state: &AppState, tenant: Option<&str>) -> Result<(), GatewayError> {
    match tenant {
        None | Some("primary") => state.broker.refresh_primary_schema().await,
        Some(name) => {
            let (daughter, _old) = state.broker.registry().open_daughter(name).await?;
            let conn = daughter.connect().await?;
            let snapshot = crate::schema::discover_schema(&conn).await?;
            state.broker.registry().persist_schema(name, &snapshot).await
        }
    }
}

async fn query_post(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    let schema = acquired.schema();
    let executor = QueryExecutor::new(&conn, schema, &state.config, acquired.is_primary());
    let prefer = prefer_directives(&headers);

    if prefer.contains("operation=select") {
        let select_items = batch::array_field(&body, "select");
        let where_items = batch::array_field(&body, "where");
        let order_map = batch::object_field(&body, "order");
        let limit = body.get("limit").and_then(JsonValue::as_i64);
        let offset = body.get("offset").and_then(JsonValue::as_i64);
        let count_exact = prefer.contains("count=exact");

        let (data, total_count) = executor
            .select(&table, &select_items, &where_items, &order_map, limit, offset, count_exact)
            .await
            .map_err(ApiError::from)?;

        let mut response = Json(data).into_response();
        if let Some(count) = total_count {
            if let Ok(value) = HeaderValue::from_str(&count.to_string()) {
                response.headers_mut().insert("x-total-count", value);
            }
        }
        return Ok(response);
    }

    let rows = batch::rows_field(&body).map_err(ApiError::from)?;
    let returning = batch::string_array_field(&body, "returning");

    if prefer.contains("on-conflict=replace") {
        let result = executor.upsert(&table, &rows).await.map_err(ApiError::from)?;
        return Ok(Json(result).into_response());
    }

    let ignore = prefer.contains("on-conflict=ignore");
    let result = executor
        .insert(&table, &rows, &returning, ignore)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(result).into_response())
}

async fn query_patch(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    let executor = QueryExecutor::new(&conn, acquired.schema(), &state.config, acquired.is_primary());

    let data = body
        .get("data")
        .and_then(JsonValue::as_object)
        .cloned()
        .ok_or_else(|| GatewayError::internal("update requires a data object"))?;
    let where_items = batch::array_field(&body, "where");

    let result = executor.update(&table, &data, &where_items).await?;
    Ok(Json(result))
}

async fn query_delete(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    let executor = QueryExecutor::new(&conn, acquired.schema(), &state.config, acquired.is_primary());

    let where_items = batch::array_field(&body, "where");
    let result = executor.delete(&table, &where_items).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct BatchRequest {
    operations: Vec<BatchOperation>,
}

async fn batch_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;

    let results = batch::run_batch(
        &conn,
        acquired.schema(),
        &state.config,
        &request.operations,
        acquired.is_primary(),
    )
    .await?;
    Ok(Json(json!({ "results": results })))
}

async fn schema_get(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<JsonValue>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    Ok(Json(serde_json::to_value(acquired.schema()).map_err(GatewayError::from)?))
}

async fn schema_invalidate_post(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_from_headers(&headers);
    refresh_schema_cache(&state, tenant.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn schema_table_get(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Table>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    Ok(Json(acquired.schema().find_table(&table)?.clone()))
}

async fn schema_table_post(
    State(state): State<AppState>,
    Path(_table): Path<String>,
    headers: HeaderMap,
    Json(table): Json<Table>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    let sql = ddl::create_table_sql(&table)?;
    conn.execute(&sql, ()).await.map_err(crate::db::DbError::from)?;
    drop(acquired);
    refresh_schema_cache(&state, tenant.as_deref()).await?;
    Ok(StatusCode::CREATED)
}

async fn schema_table_delete(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    let sql = ddl::drop_table_sql(&table)?;
    conn.execute(&sql, ()).await.map_err(crate::db::DbError::from)?;
    drop(acquired);
    refresh_schema_cache(&state, tenant.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn schema_table_patch(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(column): Json<Column>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    let sql = ddl::add_column_sql(&table, &column)?;
    conn.execute(&sql, ()).await.map_err(crate::db::DbError::from)?;
    drop(acquired);
    refresh_schema_cache(&state, tenant.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn schema_fts_list(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<JsonValue>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let tables: Vec<&String> = acquired.schema().fts_indexed_tables.iter().collect();
    Ok(Json(json!(tables)))
}

#[derive(Deserialize)]
struct FtsCreateRequest {
    table: String,
    columns: Vec<String>,
}

async fn schema_fts_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FtsCreateRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    fts::create_fts_index(&conn, acquired.schema(), &request.table, &request.columns).await?;
    drop(acquired);
    refresh_schema_cache(&state, tenant.as_deref()).await?;
    Ok(StatusCode::CREATED)
}

async fn schema_fts_drop(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let acquired = state.broker.acquire(tenant.as_deref()).await?;
    let conn = acquired.connection().await?;
    fts::drop_fts_index(&conn, acquired.schema(), &table).await?;
    drop(acquired);
    refresh_schema_cache(&state, tenant.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tenants_list(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.broker.registry().list_names().await?))
}

#[derive(Deserialize)]
struct CreateTenantRequest {
    name: String,
    group: Option<String>,
}

async fn tenants_create(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<Json<crate::tenant::DaughterRecord>, ApiError> {
    let record = state
        .broker
        .registry()
        .create_daughter(&request.name, request.group.as_deref())
        .await?;
    Ok(Json(record))
}

async fn tenants_delete(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state.broker.registry().delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct TenantTemplatePatch {
    template: Option<String>,
}

async fn tenants_patch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<TenantTemplatePatch>,
) -> Result<StatusCode, ApiError> {
    match request.template {
        Some(template_name) => {
            state
                .templates
                .associate(state.broker.registry(), &name, &template_name)
                .await?
        }
        None => state.templates.disassociate(state.broker.registry(), &name).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn tenants_template_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Option<crate::tenant::Template>>, ApiError> {
    Ok(Json(state.templates.inspect(state.broker.registry(), &name).await?))
}

#[derive(Deserialize)]
struct AssociateTemplateRequest {
    template: String,
}

async fn tenants_template_post(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AssociateTemplateRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .templates
        .associate(state.broker.registry(), &name, &request.template)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tenants_template_delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.templates.disassociate(state.broker.registry(), &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn templates_list(State(state): State<AppState>) -> Result<Json<Vec<crate::tenant::Template>>, ApiError> {
    Ok(Json(state.templates.list().await?))
}

#[derive(Deserialize)]
struct CreateTemplateRequest {
    name: String,
    tables: Vec<Table>,
}

async fn templates_create(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<Json<crate::tenant::Template>, ApiError> {
    Ok(Json(state.templates.create(&request.name, request.tables).await?))
}

async fn templates_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<crate::tenant::Template>, ApiError> {
    Ok(Json(state.templates.get(&name).await?))
}

#[derive(Deserialize)]
struct UpdateTemplateRequest {
    tables: Vec<Table>,
}

async fn templates_put(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<crate::tenant::Template>, ApiError> {
    Ok(Json(state.templates.update(&name, request.tables).await?))
}

async fn templates_delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.templates.delete(state.broker.registry(), &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn templates_sync(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<Json<Vec<crate::tenant::SyncResult>>, ApiError> {
    let drop_extra = body.get("dropExtra").and_then(JsonValue::as_bool).unwrap_or(false);
    let results = state
        .templates
        .sync(state.broker.registry(), &name, drop_extra)
        .await?;
    Ok(Json(results))
}

async fn health_get(State(state): State<AppState>) -> Response {
    match state.broker.primary().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        )
            .into_response(),
    }
}
