//! Snapshot building and encoding

use std::sync::Arc;

use crate::ws::protocol::{BulletSnapshot, MedkitSnapshot, PlayerSnapshot, ServerMsg};

use super::player::{Player, MAX_AMMO, MAX_HEALTH};
use super::world::World;

/// Builds per-tick world snapshots for network transmission
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the update message for the current world state
    pub fn build(&self, world: &World) -> ServerMsg {
        let players = world.players().values().map(player_snapshot).collect();

        let bullets = world
            .projectiles()
            .iter()
            .map(|p| BulletSnapshot {
                id: p.id,
                position: p.center.into(),
            })
            .collect();

        let medkits = world
            .pickups()
            .iter()
            .map(|p| MedkitSnapshot {
                id: p.id,
                position: p.position.into(),
            })
            .collect();

        ServerMsg::Update {
            players,
            bullets,
            medkits,
        }
    }

    /// Build and serialize once, ready to fan out to every session
    pub fn encode(&mut self, world: &World) -> Result<Arc<str>, serde_json::Error> {
        let json = serde_json::to_string(&self.build(world))?;
        self.stats.record(world.players().len(), json.len());
        Ok(Arc::from(json))
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

fn player_snapshot(p: &Player) -> PlayerSnapshot {
    PlayerSnapshot {
        id: p.id,
        name: p.name.clone(),
        position: p.position().into(),
        rotation: p.orientation.into(),
        health: p.health,
        max_health: MAX_HEALTH,
        ammo: p.ammo,
        max_ammo: MAX_AMMO,
        is_reloading: p.is_reloading(),
        kills: p.kills,
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}
