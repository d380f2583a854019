//! Simulation context: owns every live collection and runs one tick at a time

use std::collections::HashMap;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::collision::CollisionWorld;
use crate::util::ids::{EntityId, IdGenerator};
use crate::util::time::{substep_delta, SimClock, PHYSICS_SUBSTEPS};

use super::combat::{CombatSystem, FireError, HitResult, Projectile, WeaponStats};
use super::physics::{PhysicsSystem, StepOutcome};
use super::pickups::{Pickup, PickupSystem, Placement};
use super::player::{MoveKeys, Orientation, PendingRespawn, Player, DEFAULT_NAME};

/// Everything that happened during one tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub reloads_completed: Vec<Uuid>,
    pub hits: Vec<HitResult>,
    pub resets: Vec<Uuid>,
    pub respawned: Vec<Uuid>,
    pub pickups_claimed: Vec<(EntityId, Vec<Uuid>)>,
    pub pickup_spawned: Option<Placement>,
}

impl TickReport {
    pub fn kills(&self) -> impl Iterator<Item = &HitResult> {
        self.hits.iter().filter(|h| h.target_killed)
    }
}

/// Authoritative world state.
///
/// Only the arena task holds a `World`; every mutation goes through `&mut self`.
pub struct World {
    players: HashMap<Uuid, Player>,
    projectiles: Vec<Projectile>,
    respawns: HashMap<Uuid, PendingRespawn>,
    pickups: Vec<Pickup>,
    last_pickup_spawn: Duration,
    clock: SimClock,
    tick: u64,
    ids: IdGenerator,
    rng: ChaCha8Rng,
    collision: CollisionWorld,
    stats: WeaponStats,
}

impl World {
    pub fn new(collision: CollisionWorld, seed: u64) -> Self {
        Self {
            players: HashMap::new(),
            projectiles: Vec::new(),
            respawns: HashMap::new(),
            pickups: Vec::new(),
            last_pickup_spawn: Duration::ZERO,
            clock: SimClock::new(),
            tick: 0,
            ids: IdGenerator::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            collision,
            stats: WeaponStats::STANDARD,
        }
    }

    /// Add a freshly spawned player for a new session
    pub fn connect(&mut self, id: Uuid) {
        if self.players.contains_key(&id) || self.respawns.contains_key(&id) {
            debug!(player_id = %id, "Player already connected");
            return;
        }
        self.players.insert(id, Player::spawn(id, DEFAULT_NAME.to_string(), 0));
        info!(player_id = %id, live_players = self.players.len(), "Player connected");
    }

    /// Forget a session: live entity and any pending respawn.
    /// Projectiles already in flight keep flying.
    pub fn disconnect(&mut self, id: Uuid) -> bool {
        let was_live = self.players.remove(&id).is_some();
        let was_pending = self.respawns.remove(&id).is_some();
        if was_live || was_pending {
            info!(player_id = %id, live_players = self.players.len(), "Player disconnected");
        }
        was_live || was_pending
    }

    /// Rename a player, live or waiting to respawn
    pub fn set_name(&mut self, id: Uuid, name: String) {
        if let Some(player) = self.players.get_mut(&id) {
            info!(player_id = %id, name = %name, "Player joined");
            player.set_name(name);
        } else if let Some(pending) = self.respawns.get_mut(&id) {
            pending.name = name;
        }
    }

    /// Replace the pending input of a live player. `None` fields keep the previous value.
    pub fn apply_input(&mut self, id: Uuid, orientation: Option<Orientation>, keys: Option<MoveKeys>) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if let Some(orientation) = orientation {
            player.orientation = orientation;
        }
        if let Some(keys) = keys {
            player.keys = keys;
        }
    }

    /// Fire the player's weapon at the current simulated time
    pub fn fire(&mut self, id: Uuid) -> Result<EntityId, FireError> {
        let player = self.players.get_mut(&id).ok_or(FireError::NotAlive)?;
        let projectile = CombatSystem::fire(player, &mut self.ids, self.clock.now(), &self.stats)?;
        let projectile_id = projectile.id;
        self.projectiles.push(projectile);
        Ok(projectile_id)
    }

    /// Begin a reload. Returns false when refused.
    pub fn reload(&mut self, id: Uuid) -> bool {
        let now = self.clock.now();
        self.players
            .get_mut(&id)
            .map(|p| CombatSystem::start_reload(p, now))
            .unwrap_or(false)
    }

    /// Run one fixed-duration tick
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.advance();
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        for player in self.players.values_mut() {
            if CombatSystem::update_reload(player, now, &self.stats) {
                report.reloads_completed.push(player.id);
            }
        }

        let dt = substep_delta();
        for _ in 0..PHYSICS_SUBSTEPS {
            for player in self.players.values_mut() {
                if PhysicsSystem::step_player(player, &self.collision, dt) == StepOutcome::ResetToSpawn {
                    debug!(player_id = %player.id, "Player fell out of the level, reset to spawn");
                    report.resets.push(player.id);
                }
            }

            CombatSystem::advance_projectiles(&mut self.projectiles, &self.collision, dt, now, &self.stats);

            let hits = CombatSystem::resolve_hits(
                &mut self.players,
                &mut self.projectiles,
                &mut self.respawns,
                now,
                &self.stats,
            );
            report.hits.extend(hits);
        }

        for kill in report.kills() {
            info!(
                shooter_id = %kill.shooter_id,
                target_id = %kill.target_id,
                "Player killed"
            );
        }

        self.process_respawns(now, &mut report);

        report.pickups_claimed = PickupSystem::claim(&mut self.players, &mut self.pickups);
        report.pickup_spawned = PickupSystem::maintain(
            &mut self.pickups,
            &mut self.last_pickup_spawn,
            now,
            &self.collision,
            &self.players,
            &mut self.ids,
            &mut self.rng,
        );
        if let Some(placement) = &report.pickup_spawned {
            debug!(
                strategy = ?placement.strategy,
                attempts = placement.attempts,
                "Pickup spawned"
            );
        }

        report
    }

    fn process_respawns(&mut self, now: Duration, report: &mut TickReport) {
        let due: Vec<Uuid> = self
            .respawns
            .iter()
            .filter(|(_, pending)| now >= pending.respawn_at)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            if let Some(pending) = self.respawns.remove(&id) {
                self.players.insert(id, Player::spawn(id, pending.name, pending.kills));
                info!(player_id = %id, kills = pending.kills, "Player respawned");
                report.respawned.push(id);
            }
        }
    }

    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn players(&self) -> &HashMap<Uuid, Player> {
        &self.players
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn pending_respawn(&self, id: &Uuid) -> Option<&PendingRespawn> {
        self.respawns.get(id)
    }

    pub fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    /// Simulated time
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}
