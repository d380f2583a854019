//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::collision::CollisionWorld;
use crate::config::Config;
use crate::game::ArenaHandle;
use crate::util::time::unix_millis;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
    pub collision: CollisionWorld,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config, arena: ArenaHandle, collision: CollisionWorld) -> Self {
        Self {
            config: Arc::new(config),
            arena,
            collision,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

/// Open WebSocket session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub player_id: Uuid,
    pub connected_at: u64,
}

impl SessionInfo {
    /// Session length in milliseconds as of `now` (unix millis)
    pub fn duration_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.connected_at)
    }
}

/// Registry of open WebSocket sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn register(&self, player_id: Uuid) {
        self.sessions.insert(
            player_id,
            SessionInfo {
                player_id,
                connected_at: unix_millis(),
            },
        );
    }

    pub fn unregister(&self, player_id: &Uuid) -> Option<SessionInfo> {
        self.sessions.remove(player_id).map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
