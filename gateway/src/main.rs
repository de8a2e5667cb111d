mod api;
mod config;
mod handlers;
mod store;

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Internal imports
use crate::config::GatewayConfig;
use crate::store::{FsSnippetStore, SnippetStore};
use snipline_core::{SecretString, ToolCatalog};

// 1. Application State
// The snippet store (Memory), the shared catalog (Menu) and the optional access key (Door).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnippetStore>,
    pub catalog: Arc<ToolCatalog>,
    pub access_key: Option<SecretString>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 2. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("Snipline Tool Server Initializing...");
    let config = GatewayConfig::from_env();

    // 3. Load the Catalog (the same tools.json the agent advertises)
    let catalog = match &config.catalog_path {
        Some(path) => ToolCatalog::load(path).await?,
        None => ToolCatalog::builtin()?,
    };
    info!("Serving {} tools: {}", catalog.len(), catalog.names().join(", "));

    // 4. Open the Snippet Store
    let store = FsSnippetStore::open(&config.snippet_dir).await?;
    info!("Snippet store at: {}", store.root().display());

    if config.access_key.is_none() {
        warn!("MCP_EXTENSION_KEY not set; /api endpoints are open");
    }

    // 5. Bundle State
    let state = AppState {
        store: Arc::new(store),
        catalog: Arc::new(catalog),
        access_key: config.access_key,
    };

    // 6. Start Server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Gateway listening on {}...", config.bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

// Routes: one POST endpoint per catalog tool the server knows how to run.
fn app(state: AppState) -> Router {
    let mut api = Router::new().route("/api/tools", get(handlers::list_tools));
    for tool in state.catalog.iter() {
        match handlers::tool_handler(&tool.name) {
            Some(handler) => api = api.route(&format!("/api/{}", tool.name), handler),
            None => warn!("Catalog tool '{}' has no handler; not exposed", tool.name),
        }
    }
    let api = api.route_layer(middleware::from_fn_with_state(
        state.clone(),
        handlers::require_access_key,
    ));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Snipline Tool Server: Operational"
}
