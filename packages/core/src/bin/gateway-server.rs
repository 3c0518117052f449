//! Gateway server binary: loads configuration, opens the primary database,
//! wires the connection broker and template engine, and serves the HTTP
//! surface described in §6.

use std::sync::Arc;

use gateway_core::config::GatewayConfig;
use gateway_core::db::PrimaryConnection;
use gateway_core::http::{build_router, AppState};
use gateway_core::schema::{discover_schema, SchemaCache};
use gateway_core::tenant::{TemplateEngine, TenantRegistry, TursoProvider};
use gateway_core::ConnectionBroker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(GatewayConfig::from_env());
    tracing::info!(path = %config.primary_db_path.display(), "starting gateway server");

    let primary = Arc::new(PrimaryConnection::open(&config.primary_db_path).await?);

    let provider: Arc<dyn gateway_core::tenant::RemoteProvider> = Arc::new(TursoProvider::new(
        config.turso_organization.clone().unwrap_or_default(),
        config.turso_api_key.clone().unwrap_or_default(),
    ));

    let registry = Arc::new(TenantRegistry::open(primary.clone(), provider, config.clone()).await?);
    let templates = Arc::new(TemplateEngine::new(primary.clone()));

    let initial_snapshot = discover_schema(&primary.connect().await?).await?;
    let schema_cache = Arc::new(SchemaCache::new(initial_snapshot));

    let broker = Arc::new(ConnectionBroker::new(primary, schema_cache, registry));

    let state = AppState {
        broker,
        config: config.clone(),
        templates,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "gateway server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
