//! Arena Shooter Server - Authoritative multiplayer game server
//!
//! This is the main entry point for the game server. It handles:
//! - Loading the level collision geometry
//! - Running the fixed-rate arena simulation
//! - WebSocket connections for real-time gameplay

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_shooter_server::app::AppState;
use arena_shooter_server::collision::{CollisionWorld, GeometryError, LevelGeometry};
use arena_shooter_server::config::Config;
use arena_shooter_server::game::{Arena, World};
use arena_shooter_server::http::build_router;
use arena_shooter_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Arena Shooter Server");
    info!("Server address: {}", config.server_addr);

    // The simulation runs without terrain until the geometry is installed
    let collision = CollisionWorld::new();
    spawn_geometry_loader(&config, collision.clone());

    let seed = config.world_seed.unwrap_or_else(rand::random);
    info!(seed, "World seed");

    let (arena, arena_handle) = Arena::new(World::new(collision.clone(), seed));
    tokio::spawn(arena.run());

    // Create application state
    let state = AppState::new(config.clone(), arena_handle, collision);

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Build the level geometry off the async runtime and install it when ready
fn spawn_geometry_loader(config: &Config, collision: CollisionWorld) {
    let mesh_path = config.level_mesh_path.clone();

    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || -> Result<LevelGeometry, GeometryError> {
            match &mesh_path {
                Some(path) => {
                    info!(path = %path.display(), "Loading level mesh");
                    LevelGeometry::from_mesh_file(path)
                }
                None => Ok(LevelGeometry::default_arena()),
            }
        })
        .await;

        match result {
            Ok(Ok(level)) => {
                info!(brushes = level.brush_count(), "Level geometry ready");
                collision.install(Arc::new(level));
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to build level geometry, falling back to the built-in arena");
                collision.install(Arc::new(LevelGeometry::default_arena()));
            }
            Err(e) => error!(error = %e, "Geometry loader task failed"),
        }
    });
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
