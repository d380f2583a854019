//! Combat system - firing, reloading, projectiles, hit detection

use std::collections::HashMap;
use std::time::Duration;

use glam::Vec3;
use uuid::Uuid;

use crate::collision::CollisionWorld;
use crate::util::ids::{EntityId, IdGenerator};

use super::player::{PendingRespawn, Player, ReloadState, MAX_AMMO};

/// Weapon constants
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Projectile speed (units/s)
    pub projectile_speed: f32,
    /// Projectile hitbox radius
    pub projectile_radius: f32,
    /// Projectiles older than this are removed
    pub projectile_lifetime: Duration,
    /// Projectiles farther than this from their muzzle are removed
    pub max_range: f32,
    /// Time from starting a reload to a full magazine
    pub reload_duration: Duration,
    /// Muzzle offset from the head, along the view axes
    pub muzzle_forward: f32,
    pub muzzle_up: f32,
    pub muzzle_right: f32,
}

impl WeaponStats {
    pub const STANDARD: Self = Self {
        damage: 20.0,
        projectile_speed: 80.0,
        projectile_radius: 0.1,
        projectile_lifetime: Duration::from_millis(3000),
        max_range: 200.0,
        reload_duration: Duration::from_millis(2000),
        muzzle_forward: 0.4,
        muzzle_up: -0.1,
        muzzle_right: 0.15,
    };
}

/// How long a dead player waits before re-entering the arena
pub const RESPAWN_DELAY: Duration = Duration::from_millis(3000);

/// Active projectile in the arena
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub owner_id: Uuid,
    pub center: Vec3,
    pub radius: f32,
    pub velocity: Vec3,
    /// Muzzle position, for the range limit
    pub origin: Vec3,
    pub spawned_at: Duration,
}

/// Why a projectile stopped existing (or didn't)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileFate {
    InFlight,
    HitWorld,
    OutOfRange,
    Expired,
}

impl Projectile {
    pub fn new(id: EntityId, owner_id: Uuid, origin: Vec3, direction: Vec3, now: Duration, stats: &WeaponStats) -> Self {
        Self {
            id,
            owner_id,
            center: origin,
            radius: stats.projectile_radius,
            velocity: direction * stats.projectile_speed,
            origin,
            spawned_at: now,
        }
    }

    /// Move by one substep and check the termination conditions
    pub fn advance(&mut self, collision: &CollisionWorld, dt: f32, now: Duration, stats: &WeaponStats) -> ProjectileFate {
        let displacement = self.velocity * dt;
        let from = self.center;
        self.center += displacement;

        let travel = displacement.length();
        if travel > 0.0 {
            if let Some(hit) = collision.cast_ray(from, displacement) {
                if hit.distance <= travel {
                    return ProjectileFate::HitWorld;
                }
            }
        }

        if self.center.distance(self.origin) > stats.max_range {
            return ProjectileFate::OutOfRange;
        }
        if now.saturating_sub(self.spawned_at) >= stats.projectile_lifetime {
            return ProjectileFate::Expired;
        }
        ProjectileFate::InFlight
    }
}

/// Why a fire request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FireError {
    #[error("weapon is reloading")]
    Reloading,

    #[error("magazine is empty")]
    OutOfAmmo,

    #[error("player is not in the live set")]
    NotAlive,
}

/// Hit result from combat resolution
#[derive(Debug, Clone)]
pub struct HitResult {
    pub projectile_id: EntityId,
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub damage: f32,
    pub position: Vec3,
    pub target_killed: bool,
}

/// Combat system for weapons and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Fire the player's weapon, spawning a projectile from the muzzle.
    /// Emptying the magazine starts a reload immediately.
    pub fn fire(
        player: &mut Player,
        ids: &mut IdGenerator,
        now: Duration,
        stats: &WeaponStats,
    ) -> Result<Projectile, FireError> {
        if player.is_reloading() {
            return Err(FireError::Reloading);
        }
        if player.ammo == 0 {
            return Err(FireError::OutOfAmmo);
        }

        player.ammo -= 1;
        if player.ammo == 0 {
            player.reload = ReloadState::Reloading { started_at: now };
        }

        let origin = Self::muzzle_position(player, stats);
        let direction = player.orientation.aim_direction();
        Ok(Projectile::new(ids.next_id(), player.id, origin, direction, now, stats))
    }

    /// Head position shifted by the muzzle offsets in the full view frame
    pub fn muzzle_position(player: &Player, stats: &WeaponStats) -> Vec3 {
        let rotation = player.orientation.quat();
        let forward = rotation * Vec3::NEG_Z;
        let up = rotation * Vec3::Y;
        let right = rotation * Vec3::X;

        player.head()
            + forward * stats.muzzle_forward
            + up * stats.muzzle_up
            + right * stats.muzzle_right
    }

    /// Start a reload. Refused while already reloading or with a full magazine.
    pub fn start_reload(player: &mut Player, now: Duration) -> bool {
        if player.is_reloading() || player.ammo >= MAX_AMMO {
            return false;
        }
        player.reload = ReloadState::Reloading { started_at: now };
        true
    }

    /// Finish a reload whose time is up. Returns true when the magazine was refilled.
    pub fn update_reload(player: &mut Player, now: Duration, stats: &WeaponStats) -> bool {
        match player.reload {
            ReloadState::Reloading { started_at }
                if now.saturating_sub(started_at) >= stats.reload_duration =>
            {
                player.ammo = MAX_AMMO;
                player.reload = ReloadState::Ready;
                true
            }
            _ => false,
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = current_health - damage;
        (new_health, new_health <= 0.0)
    }

    /// Move every projectile one substep, dropping the ones that terminated
    pub fn advance_projectiles(
        projectiles: &mut Vec<Projectile>,
        collision: &CollisionWorld,
        dt: f32,
        now: Duration,
        stats: &WeaponStats,
    ) {
        projectiles.retain_mut(|p| p.advance(collision, dt, now, stats) == ProjectileFate::InFlight);
    }

    /// Test every projectile against every live player except its owner.
    ///
    /// A projectile resolves at most one hit: the first overlapping player in
    /// iteration order. Players reduced to zero health leave the live set and
    /// are scheduled for respawn; their killer is credited even while dead.
    pub fn resolve_hits(
        players: &mut HashMap<Uuid, Player>,
        projectiles: &mut Vec<Projectile>,
        respawns: &mut HashMap<Uuid, PendingRespawn>,
        now: Duration,
        stats: &WeaponStats,
    ) -> Vec<HitResult> {
        let mut hits = Vec::new();
        let mut i = 0;

        while i < projectiles.len() {
            let projectile = &projectiles[i];
            let target_id = players
                .values()
                .find(|p| {
                    p.id != projectile.owner_id
                        && p.capsule.intersects_sphere(projectile.center, projectile.radius)
                })
                .map(|p| p.id);

            let Some(target_id) = target_id else {
                i += 1;
                continue;
            };

            let projectile = projectiles.remove(i);
            let mut hit = HitResult {
                projectile_id: projectile.id,
                shooter_id: projectile.owner_id,
                target_id,
                damage: stats.damage,
                position: projectile.center,
                target_killed: false,
            };

            if let Some(target) = players.get_mut(&target_id) {
                let (health, killed) = Self::apply_damage(target.health, stats.damage);
                target.health = health;
                hit.target_killed = killed;
            }

            if hit.target_killed {
                if let Some(victim) = players.remove(&target_id) {
                    respawns.insert(
                        target_id,
                        PendingRespawn {
                            name: victim.name,
                            respawn_at: now + RESPAWN_DELAY,
                            kills: victim.kills,
                        },
                    );
                }

                if let Some(shooter) = players.get_mut(&hit.shooter_id) {
                    shooter.kills += 1;
                } else if let Some(pending) = respawns.get_mut(&hit.shooter_id) {
                    pending.kills += 1;
                }
            }

            hits.push(hit);
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::LevelGeometry;
    use crate::game::player::{Orientation, MAX_HEALTH};
    use std::sync::Arc;

    const STATS: WeaponStats = WeaponStats::STANDARD;

    fn player_at(feet: Vec3) -> Player {
        let mut p = Player::spawn(Uuid::new_v4(), "p".to_string(), 0);
        p.set_feet_position(feet);
        p
    }

    fn dt() -> f32 {
        crate::util::time::substep_delta()
    }

    #[test]
    fn firing_spends_ammo_and_empty_magazine_starts_reload() {
        let mut ids = IdGenerator::new();
        let mut p = player_at(Vec3::ZERO);
        p.ammo = 2;

        CombatSystem::fire(&mut p, &mut ids, Duration::ZERO, &STATS).unwrap();
        assert_eq!(p.ammo, 1);
        assert!(!p.is_reloading());

        let now = Duration::from_millis(500);
        CombatSystem::fire(&mut p, &mut ids, now, &STATS).unwrap();
        assert_eq!(p.ammo, 0);
        assert_eq!(p.reload, ReloadState::Reloading { started_at: now });

        assert_eq!(
            CombatSystem::fire(&mut p, &mut ids, now, &STATS).unwrap_err(),
            FireError::Reloading
        );
    }

    #[test]
    fn firing_with_empty_magazine_is_rejected() {
        let mut ids = IdGenerator::new();
        let mut p = player_at(Vec3::ZERO);
        p.ammo = 0;
        assert_eq!(
            CombatSystem::fire(&mut p, &mut ids, Duration::ZERO, &STATS).unwrap_err(),
            FireError::OutOfAmmo
        );
    }

    #[test]
    fn reload_rules() {
        let mut p = player_at(Vec3::ZERO);
        assert!(!CombatSystem::start_reload(&mut p, Duration::ZERO), "full magazine");

        p.ammo = 5;
        let start = Duration::from_secs(10);
        assert!(CombatSystem::start_reload(&mut p, start));
        assert!(!CombatSystem::start_reload(&mut p, start), "already reloading");

        let almost = start + STATS.reload_duration - Duration::from_millis(1);
        assert!(!CombatSystem::update_reload(&mut p, almost, &STATS));
        assert_eq!(p.ammo, 5);

        assert!(CombatSystem::update_reload(&mut p, start + STATS.reload_duration, &STATS));
        assert_eq!(p.ammo, MAX_AMMO);
        assert!(!p.is_reloading());
    }

    #[test]
    fn projectile_leaves_from_muzzle_along_aim() {
        let mut ids = IdGenerator::new();
        let mut p = player_at(Vec3::ZERO);
        p.orientation = Orientation { pitch: 0.0, yaw: 0.0, roll: 0.0 };
        let shot = CombatSystem::fire(&mut p, &mut ids, Duration::ZERO, &STATS).unwrap();

        let expected = p.head() + Vec3::new(STATS.muzzle_right, STATS.muzzle_up, -STATS.muzzle_forward);
        assert!(shot.center.abs_diff_eq(expected, 1e-5));
        assert!(shot.velocity.normalize().abs_diff_eq(Vec3::NEG_Z, 1e-5));
        assert_eq!(shot.owner_id, p.id);
    }

    #[test]
    fn projectile_expires_without_collision() {
        let world = CollisionWorld::new();
        let mut stats = STATS;
        stats.max_range = f32::MAX;
        let mut projectile = Projectile::new(
            IdGenerator::new().next_id(),
            Uuid::new_v4(),
            Vec3::ZERO,
            Vec3::X,
            Duration::ZERO,
            &stats,
        );

        let mut now = Duration::ZERO;
        let step = Duration::from_millis(10);
        let fate = loop {
            now += step;
            let fate = projectile.advance(&world, 0.01, now, &stats);
            if fate != ProjectileFate::InFlight {
                break fate;
            }
            assert!(now < stats.projectile_lifetime);
        };
        assert_eq!(fate, ProjectileFate::Expired);
        assert_eq!(now, stats.projectile_lifetime);
    }

    #[test]
    fn projectile_stops_at_max_range() {
        let world = CollisionWorld::new();
        let mut stats = STATS;
        stats.projectile_lifetime = Duration::from_secs(3600);
        let mut projectile = Projectile::new(
            IdGenerator::new().next_id(),
            Uuid::new_v4(),
            Vec3::ZERO,
            Vec3::Z,
            Duration::ZERO,
            &stats,
        );

        let mut steps = 0;
        while projectile.advance(&world, dt(), Duration::ZERO, &stats) == ProjectileFate::InFlight {
            steps += 1;
            assert!(steps < 100_000);
        }
        assert!(projectile.center.length() > stats.max_range);
        assert!(projectile.center.length() < stats.max_range + 1.0);
    }

    #[test]
    fn projectile_terminates_on_world_geometry() {
        let mut level = LevelGeometry::new();
        level.add_box(Vec3::new(0.0, 0.0, -5.0), Vec3::new(2.0, 2.0, 0.5));
        let world = CollisionWorld::with_provider(Arc::new(level));

        let mut projectiles = vec![Projectile::new(
            IdGenerator::new().next_id(),
            Uuid::new_v4(),
            Vec3::ZERO,
            Vec3::NEG_Z,
            Duration::ZERO,
            &STATS,
        )];

        let mut substeps = 0;
        while !projectiles.is_empty() {
            CombatSystem::advance_projectiles(&mut projectiles, &world, dt(), Duration::ZERO, &STATS);
            substeps += 1;
            assert!(substeps < 100);
        }
        // Wall face at z = -4.5; 80 units/s covers ~0.27 per substep
        assert!(substeps >= 16 && substeps <= 18, "took {substeps} substeps");
    }

    #[test]
    fn hits_skip_owner_and_damage_target() {
        let shooter = player_at(Vec3::ZERO);
        let target = player_at(Vec3::new(0.0, 0.0, -5.0));
        let (shooter_id, target_id) = (shooter.id, target.id);
        let mut players: HashMap<Uuid, Player> =
            [(shooter_id, shooter), (target_id, target)].into_iter().collect();
        let mut respawns = HashMap::new();

        let mut ids = IdGenerator::new();
        let inside_owner = Projectile::new(ids.next_id(), shooter_id, Vec3::new(0.0, 1.0, 0.0), Vec3::X, Duration::ZERO, &STATS);
        let inside_target = Projectile::new(ids.next_id(), shooter_id, Vec3::new(0.0, 1.0, -5.0), Vec3::X, Duration::ZERO, &STATS);
        let mut projectiles = vec![inside_owner, inside_target];

        let hits = CombatSystem::resolve_hits(&mut players, &mut projectiles, &mut respawns, Duration::ZERO, &STATS);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target_id, target_id);
        assert!(!hits[0].target_killed);
        assert_eq!(projectiles.len(), 1, "projectile inside its owner survives");
        assert_eq!(players[&target_id].health, MAX_HEALTH - STATS.damage);
        assert_eq!(players[&shooter_id].health, MAX_HEALTH);
    }

    #[test]
    fn lethal_hit_moves_victim_to_respawn_and_credits_shooter() {
        let shooter = player_at(Vec3::ZERO);
        let mut target = player_at(Vec3::new(3.0, 0.0, 0.0));
        target.health = STATS.damage;
        target.kills = 4;
        let (shooter_id, target_id) = (shooter.id, target.id);
        let mut players: HashMap<Uuid, Player> =
            [(shooter_id, shooter), (target_id, target)].into_iter().collect();
        let mut respawns = HashMap::new();

        let mut ids = IdGenerator::new();
        // Two projectiles in the same body; only the first can land
        let mut projectiles = vec![
            Projectile::new(ids.next_id(), shooter_id, Vec3::new(3.0, 1.0, 0.0), Vec3::X, Duration::ZERO, &STATS),
            Projectile::new(ids.next_id(), shooter_id, Vec3::new(3.0, 0.8, 0.0), Vec3::X, Duration::ZERO, &STATS),
        ];

        let now = Duration::from_secs(7);
        let hits = CombatSystem::resolve_hits(&mut players, &mut projectiles, &mut respawns, now, &STATS);

        assert_eq!(hits.len(), 1);
        assert!(hits[0].target_killed);
        assert!(!players.contains_key(&target_id));
        assert_eq!(projectiles.len(), 1);
        assert_eq!(players[&shooter_id].kills, 1);

        let pending = &respawns[&target_id];
        assert_eq!(pending.respawn_at, now + RESPAWN_DELAY);
        assert_eq!(pending.kills, 4);
    }

    #[test]
    fn dead_shooter_is_still_credited() {
        let shooter_id = Uuid::new_v4();
        let mut target = player_at(Vec3::ZERO);
        target.health = 1.0;
        let target_id = target.id;
        let mut players: HashMap<Uuid, Player> = [(target_id, target)].into_iter().collect();
        let mut respawns: HashMap<Uuid, PendingRespawn> = [(
            shooter_id,
            PendingRespawn {
                name: "ghost".to_string(),
                respawn_at: Duration::from_secs(1),
                kills: 2,
            },
        )]
        .into_iter()
        .collect();

        let mut projectiles = vec![Projectile::new(
            IdGenerator::new().next_id(),
            shooter_id,
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::X,
            Duration::ZERO,
            &STATS,
        )];
        CombatSystem::resolve_hits(&mut players, &mut projectiles, &mut respawns, Duration::ZERO, &STATS);

        assert_eq!(respawns[&shooter_id].kills, 3);
        assert!(respawns.contains_key(&target_id));
    }
}
