use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrumpoker::{config::ServerConfig, state, store::InMemorySessionStore};

#[tokio::main]
async fn main() -> io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrumpoker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scrumpoker...");

    let config = ServerConfig::from_env();
    tracing::debug!("Configuration: {:?}", config);

    let state = Arc::new(state::AppState::new(
        Arc::new(InMemorySessionStore::new()),
        config.engine.clone(),
    ));

    // Reclaim sessions nobody came back to
    let reaper = state::spawn_session_reaper(state.clone());

    let app = scrumpoker::app(state, &config.static_dir);
    let listener = bind_with_fallback(&config).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

/// Bind the configured port, moving on to the next ones while they are taken
async fn bind_with_fallback(config: &ServerConfig) -> io::Result<TcpListener> {
    let mut last_err = None;
    for offset in 0..config.port_search_attempts {
        let Some(port) = config.port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::new(config.bind_addr, port);
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::warn!("Port {} is in use, trying {}", port, port.wrapping_add(1));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrInUse, "no free port in search range")
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
