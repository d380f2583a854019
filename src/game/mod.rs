//! Game simulation modules

pub mod arena;
pub mod combat;
pub mod physics;
pub mod pickups;
pub mod player;
pub mod snapshot;
pub mod world;

pub use arena::{Arena, ArenaHandle};
pub use world::World;

use uuid::Uuid;

use player::{MoveKeys, Orientation};

/// Session event forwarded from the WebSocket layer to the arena task
#[derive(Debug, Clone)]
pub struct PlayerCommand {
    pub player_id: Uuid,
    pub kind: CommandKind,
    pub received_at: u64,
}

impl PlayerCommand {
    /// Milliseconds spent in the queue as of `now` (unix millis)
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.received_at)
    }
}

/// Validated client intent
#[derive(Debug, Clone)]
pub enum CommandKind {
    Connect,
    Disconnect,
    Join { name: String },
    Input {
        orientation: Option<Orientation>,
        keys: Option<MoveKeys>,
    },
    Shoot,
    Reload,
}
