mod auth;
mod config;
mod contacts;
mod db;
mod notify;
mod push;
mod routes;
mod sos;
mod state;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use push::transport::HttpPushTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "lifeline_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "lifeline_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!(
        "Lifeline server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    let push_config = config.push.clone().unwrap_or_default();
    let push_timeout = Duration::from_secs(push_config.timeout_secs.max(1));

    // Build application state
    let app_state = state::AppState {
        db,
        jwt_secret,
        connections: Arc::new(ws::registry::ConnectionRegistry::new()),
        rooms: Arc::new(ws::rooms::RoomManager::new()),
        push: Arc::new(HttpPushTransport::new(push_timeout)?),
        push_enabled: push_config.enabled,
        push_timeout,
    };

    if !push_config.enabled {
        tracing::warn!("Push delivery disabled by config");
    }

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
