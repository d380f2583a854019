//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the given comma-separated origin list; any origin when `None`
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connections: usize,
    geometry_ready: bool,
    live_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connections: state.sessions.len(),
        geometry_ready: state.collision.is_ready(),
        live_players: state.arena.player_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionWorld;
    use crate::config::Config;
    use crate::game::{Arena, World};

    fn test_state(collision: CollisionWorld) -> AppState {
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            log_json: false,
            level_mesh_path: None,
            world_seed: None,
            client_origin: Some("http://localhost:5173, https://play.example.com".to_string()),
        };
        let (_arena, handle) = Arena::new(World::new(collision.clone(), 0));
        AppState::new(config, handle, collision)
    }

    #[tokio::test]
    async fn health_reports_geometry_and_sessions() {
        let state = test_state(CollisionWorld::new());
        state.sessions.register(uuid::Uuid::new_v4());

        let Json(health) = health_handler(State(state.clone())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.connections, 1);
        assert!(!health.geometry_ready);
        assert_eq!(health.live_players, 0);

        state
            .collision
            .install(std::sync::Arc::new(crate::collision::LevelGeometry::flat_floor(0.0, 10.0)));
        let Json(health) = health_handler(State(state)).await;
        assert!(health.geometry_ready);
    }

    #[test]
    fn router_builds_with_origin_list() {
        let _router = build_router(test_state(CollisionWorld::new()));
    }
}
