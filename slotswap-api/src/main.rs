//! SlotSwap API Server Entry Point
//!
//! Picks a storage backend from the environment, builds the router and
//! serves until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use slotswap_api::telemetry::{init_tracing, TelemetryConfig};
use slotswap_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, DbConfig, PgStore,
    StorageBackend,
};
use slotswap_storage::{InMemoryStore, SlotStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let store = open_store(api_config.storage).await?;
    let app: Router = create_api_router(AppState::new(store), &api_config, auth_config)?;

    let addr = resolve_bind_addr()?;
    tracing::info!(
        %addr,
        storage = ?api_config.storage,
        environment = %telemetry_config.environment,
        "Starting SlotSwap API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn open_store(backend: StorageBackend) -> ApiResult<Arc<dyn SlotStore>> {
    match backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let store = PgStore::from_config(&DbConfig::from_env())?;
            store.migrate().await?;
            tracing::info!(pool_size = store.pool_size(), "PostgreSQL storage ready");
            Ok(Arc::new(store))
        }
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("SLOTSWAP_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("SLOTSWAP_API_PORT").ok())
        .unwrap_or_else(|| "4000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
