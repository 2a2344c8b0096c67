mod error;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use parrita_core::config::ParritaConfig;
use parrita_core::llm::GatewayClient;
use parrita_core::storage::{self, SqliteStorage};

pub struct AppState {
    pub storage: SqliteStorage,
    pub gateway: GatewayClient,
    /// Client for best-effort webhook deliveries.
    pub http: reqwest::Client,
    pub config: ParritaConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parrita_web=info,parrita_core=info".parse().unwrap()),
        )
        .init();

    let config = ParritaConfig::load(Some(std::path::Path::new(".")))
        .unwrap_or_else(|_| ParritaConfig::default_config());

    let storage = storage::open_from_config(&config)?;
    let gateway = GatewayClient::from_config(&config.gateway)?;

    let state = Arc::new(AppState {
        storage,
        gateway,
        http: reqwest::Client::new(),
        config: config.clone(),
    });

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("parrita-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
