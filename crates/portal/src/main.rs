//! Portal API server.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use portal_api::{AppState, Config, routes};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting portal API");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        port = config.port,
        page_size = config.download_page_size,
        max_pages = config.download_max_pages,
        "Configuration loaded"
    );

    let state = AppState::new(&config).context("failed to initialize application state")?;

    let cors = build_cors_layer(&config);

    // Middleware layers (last added = first executed in request flow):
    // TraceLayer → CORS → routes
    let app = routes::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Wildcard headers cannot be combined with credentials.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
