//! Health pickups: placement search, claiming and population upkeep

use std::collections::HashMap;
use std::time::Duration;

use glam::Vec3;
use rand::Rng;
use uuid::Uuid;

use crate::collision::{CollisionWorld, RayHit};
use crate::util::ids::{EntityId, IdGenerator};

use super::player::{Player, MAX_HEALTH};

/// Population and effect
pub const MAX_PICKUPS: usize = 3;
pub const SPAWN_INTERVAL: Duration = Duration::from_secs(10);
pub const HEAL_AMOUNT: f32 = 25.0;
pub const PICKUP_RADIUS: f32 = 0.5;
/// Body center to pickup distance at which it is picked up
pub const CLAIM_DISTANCE: f32 = 1.2;

/// Placement search area and ground ray start height
pub const PLACEMENT_HALF_EXTENT: f32 = 40.0;
pub const RAY_START_HEIGHT: f32 = 50.0;
pub const MIN_GROUND_HEIGHT: f32 = -10.0;
pub const MAX_GROUND_HEIGHT: f32 = 30.0;
/// Minimum up-component of a surface normal to count as floor
pub const MIN_FLOOR_NORMAL_Y: f32 = 0.85;
pub const STRICT_ATTEMPTS: u32 = 30;
pub const GROUND_ONLY_ATTEMPTS: u32 = 20;
pub const RING_ATTEMPTS: u32 = 8;

/// Flatness corroboration
pub const CORROBORATION_OFFSET: f32 = 0.4;
pub const HEIGHT_TOLERANCE: f32 = 0.1;
pub const NORMAL_TOLERANCE: f32 = 0.05;

/// Player clearance
pub const MIN_PLAYER_DISTANCE: f32 = 2.5;
pub const UNDERFOOT_DISTANCE: f32 = 1.0;
/// How far below a player's feet still counts as their vertical band
pub const UNDERFOOT_BAND: f32 = 1.0;
pub const SAFE_RING_RADIUS: f32 = 4.0;

/// Height used when nothing better is known
pub const DEFAULT_HEIGHT: f32 = 1.0;

/// A healing item lying in the arena
#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: EntityId,
    pub position: Vec3,
    pub claimed: bool,
}

/// Which stage of the search produced a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// Flat, corroborated, clear of players and unobstructed
    Strict,
    /// Any surface a downward ray found
    GroundOnly,
    /// On a ring around a live player
    NearPlayer,
    /// Random spot at the default height
    Blind,
}

#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub position: Vec3,
    pub strategy: PlacementStrategy,
    /// Candidates sampled before a position was accepted
    pub attempts: u32,
}

/// Constrained-random placement search with layered fallbacks
pub struct PlacementEngine;

impl PlacementEngine {
    /// Find a position for a new pickup. Always returns a finite position.
    pub fn find_position<R: Rng + ?Sized>(
        collision: &CollisionWorld,
        players: &HashMap<Uuid, Player>,
        rng: &mut R,
    ) -> Placement {
        let mut attempts = 0;

        for _ in 0..STRICT_ATTEMPTS {
            attempts += 1;
            let (x, z) = Self::random_xz(rng);
            if let Some(position) = Self::strict_candidate(collision, players, x, z) {
                return Placement {
                    position,
                    strategy: PlacementStrategy::Strict,
                    attempts,
                };
            }
        }

        for _ in 0..GROUND_ONLY_ATTEMPTS {
            attempts += 1;
            let (x, z) = Self::random_xz(rng);
            if let Some(ground) = Self::ground_below(collision, x, z) {
                return Placement {
                    position: Self::resting_on(&ground),
                    strategy: PlacementStrategy::GroundOnly,
                    attempts,
                };
            }
        }

        if !players.is_empty() {
            let index = rng.gen_range(0..players.len());
            if let Some(anchor) = players.values().nth(index) {
                let feet = anchor.position();
                let mut position = None;
                for _ in 0..RING_ATTEMPTS {
                    attempts += 1;
                    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                    let x = feet.x + angle.cos() * SAFE_RING_RADIUS;
                    let z = feet.z + angle.sin() * SAFE_RING_RADIUS;
                    match Self::ground_below(collision, x, z) {
                        Some(ground) => {
                            position = Some(Self::resting_on(&ground));
                            break;
                        }
                        None => position = Some(Vec3::new(x, feet.y + PICKUP_RADIUS, z)),
                    }
                }
                if let Some(position) = position.filter(|p| p.is_finite()) {
                    return Placement {
                        position,
                        strategy: PlacementStrategy::NearPlayer,
                        attempts,
                    };
                }
            }
        }

        attempts += 1;
        let (x, z) = Self::random_xz(rng);
        Placement {
            position: Vec3::new(x, DEFAULT_HEIGHT, z),
            strategy: PlacementStrategy::Blind,
            attempts,
        }
    }

    fn random_xz<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
        (
            rng.gen_range(-PLACEMENT_HALF_EXTENT..PLACEMENT_HALF_EXTENT),
            rng.gen_range(-PLACEMENT_HALF_EXTENT..PLACEMENT_HALF_EXTENT),
        )
    }

    /// Full set of placement checks for one sampled column
    fn strict_candidate(
        collision: &CollisionWorld,
        players: &HashMap<Uuid, Player>,
        x: f32,
        z: f32,
    ) -> Option<Vec3> {
        let ground = Self::ground_below(collision, x, z)?;
        if ground.normal.y < MIN_FLOOR_NORMAL_Y {
            return None;
        }
        if !Self::is_corroborated(collision, &ground) {
            return None;
        }

        let position = Self::resting_on(&ground);
        if !Self::is_clear_of_players(position, players) {
            return None;
        }
        if !Self::has_headroom(collision, ground.point) {
            return None;
        }
        Some(position)
    }

    /// Cast straight down from the ray start height. Misses, non-finite results
    /// and heights outside the sane range are all rejected.
    pub fn ground_below(collision: &CollisionWorld, x: f32, z: f32) -> Option<RayHit> {
        let hit = collision.cast_ray(Vec3::new(x, RAY_START_HEIGHT, z), Vec3::NEG_Y)?;
        let height = hit.point.y;
        if !hit.point.is_finite() || !(MIN_GROUND_HEIGHT..=MAX_GROUND_HEIGHT).contains(&height) {
            return None;
        }
        Some(hit)
    }

    /// Re-cast at four lateral offsets; all must agree in height and slope.
    pub fn is_corroborated(collision: &CollisionWorld, ground: &RayHit) -> bool {
        let offsets = [
            Vec3::new(CORROBORATION_OFFSET, 0.0, 0.0),
            Vec3::new(-CORROBORATION_OFFSET, 0.0, 0.0),
            Vec3::new(0.0, 0.0, CORROBORATION_OFFSET),
            Vec3::new(0.0, 0.0, -CORROBORATION_OFFSET),
        ];

        offsets.iter().all(|offset| {
            let sample = ground.point + *offset;
            match Self::ground_below(collision, sample.x, sample.z) {
                Some(hit) => {
                    (hit.point.y - ground.point.y).abs() <= HEIGHT_TOLERANCE
                        && (hit.normal.y - ground.normal.y).abs() <= NORMAL_TOLERANCE
                }
                None => false,
            }
        })
    }

    /// Far enough (in the ground plane) from every live player's body, with
    /// a tighter check for spots inside a player's vertical band.
    pub fn is_clear_of_players(position: Vec3, players: &HashMap<Uuid, Player>) -> bool {
        players.values().all(|player| {
            let center = player.capsule.center();
            let planar = Vec3::new(center.x - position.x, 0.0, center.z - position.z).length();
            if planar < MIN_PLAYER_DISTANCE {
                return false;
            }

            let feet = player.position().y;
            let in_band = position.y >= feet - UNDERFOOT_BAND && position.y <= player.capsule.head_top();
            !(in_band && planar < UNDERFOOT_DISTANCE)
        })
    }

    /// Nothing overhead closer than the pickup's own radius
    pub fn has_headroom(collision: &CollisionWorld, ground: Vec3) -> bool {
        let start = ground + Vec3::new(0.0, 0.05, 0.0);
        match collision.cast_ray(start, Vec3::Y) {
            Some(hit) => hit.distance >= PICKUP_RADIUS,
            None => true,
        }
    }

    fn resting_on(ground: &RayHit) -> Vec3 {
        ground.point + Vec3::new(0.0, PICKUP_RADIUS, 0.0)
    }
}

/// Pickup claiming and population upkeep
pub struct PickupSystem;

impl PickupSystem {
    /// Heal every wounded live player touching a pickup and consume it.
    /// Returns the consumed pickups with the players they healed.
    pub fn claim(
        players: &mut HashMap<Uuid, Player>,
        pickups: &mut Vec<Pickup>,
    ) -> Vec<(EntityId, Vec<Uuid>)> {
        let mut claimed = Vec::new();

        for pickup in pickups.iter_mut() {
            let mut healed = Vec::new();
            for player in players.values_mut() {
                if player.health >= MAX_HEALTH {
                    continue;
                }
                if player.capsule.center().distance(pickup.position) <= CLAIM_DISTANCE {
                    player.health = (player.health + HEAL_AMOUNT).min(MAX_HEALTH);
                    healed.push(player.id);
                }
            }

            if !healed.is_empty() {
                pickup.claimed = true;
                claimed.push((pickup.id, healed));
            }
        }

        pickups.retain(|p| !p.claimed);
        claimed
    }

    /// Spawn one pickup when below the cap and the interval has passed
    pub fn maintain<R: Rng + ?Sized>(
        pickups: &mut Vec<Pickup>,
        last_spawn: &mut Duration,
        now: Duration,
        collision: &CollisionWorld,
        players: &HashMap<Uuid, Player>,
        ids: &mut IdGenerator,
        rng: &mut R,
    ) -> Option<Placement> {
        if pickups.len() >= MAX_PICKUPS || now.saturating_sub(*last_spawn) < SPAWN_INTERVAL {
            return None;
        }

        let placement = PlacementEngine::find_position(collision, players, rng);
        pickups.push(Pickup {
            id: ids.next_id(),
            position: placement.position,
            claimed: false,
        });
        *last_spawn = now;
        Some(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::LevelGeometry;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    fn flat() -> CollisionWorld {
        CollisionWorld::with_provider(Arc::new(LevelGeometry::flat_floor(0.0, 60.0)))
    }

    fn player_at(feet: Vec3) -> Player {
        let mut p = Player::spawn(Uuid::new_v4(), "p".to_string(), 0);
        p.set_feet_position(feet);
        p
    }

    fn roster(players: Vec<Player>) -> HashMap<Uuid, Player> {
        players.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn flat_open_plane_gets_a_strict_placement() {
        let world = flat();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let placement = PlacementEngine::find_position(&world, &HashMap::new(), &mut rng);

        assert_eq!(placement.strategy, PlacementStrategy::Strict);
        assert_eq!(placement.attempts, 1);

        let p = placement.position;
        let ground = PlacementEngine::ground_below(&world, p.x, p.z).expect("ground under pickup");
        assert!((p.y - PICKUP_RADIUS - ground.point.y).abs() < 1e-4);
        assert!(PlacementEngine::is_corroborated(&world, &ground));
    }

    #[test]
    fn empty_world_still_yields_a_finite_position() {
        let world = CollisionWorld::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let placement = PlacementEngine::find_position(&world, &HashMap::new(), &mut rng);

        assert_eq!(placement.strategy, PlacementStrategy::Blind);
        assert!(placement.position.is_finite());
        assert_eq!(placement.position.y, DEFAULT_HEIGHT);
        assert_eq!(placement.attempts, STRICT_ATTEMPTS + GROUND_ONLY_ATTEMPTS + 1);
    }

    #[test]
    fn empty_world_with_players_places_on_safe_ring() {
        let world = CollisionWorld::new();
        let players = roster(vec![player_at(Vec3::new(5.0, 2.0, -3.0))]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let placement = PlacementEngine::find_position(&world, &players, &mut rng);

        assert_eq!(placement.strategy, PlacementStrategy::NearPlayer);
        let planar = Vec3::new(placement.position.x - 5.0, 0.0, placement.position.z + 3.0).length();
        assert!((planar - SAFE_RING_RADIUS).abs() < 1e-3);
        assert!(placement.attempts <= STRICT_ATTEMPTS + GROUND_ONLY_ATTEMPTS + RING_ATTEMPTS);
    }

    #[test]
    fn steep_ground_falls_back_to_ground_only() {
        // One slope (normal.y ~ 0.82) across the whole search square
        let mut level = LevelGeometry::new();
        level
            .add_triangles(
                &[[-60.0, -32.0, -60.0], [60.0, 52.0, -60.0], [60.0, 52.0, 60.0], [-60.0, -32.0, 60.0]],
                &[[0, 1, 2], [0, 2, 3]],
            )
            .unwrap();
        let world = CollisionWorld::with_provider(Arc::new(level));
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let placement = PlacementEngine::find_position(&world, &HashMap::new(), &mut rng);
        assert_eq!(placement.strategy, PlacementStrategy::GroundOnly);
        assert!(placement.attempts > STRICT_ATTEMPTS);
        assert!((MIN_GROUND_HEIGHT..=MAX_GROUND_HEIGHT + PICKUP_RADIUS).contains(&placement.position.y));
    }

    #[test]
    fn ledge_edges_fail_corroboration() {
        let mut level = LevelGeometry::flat_floor(0.0, 60.0);
        // Step up half a unit for x in [0, 10]
        level.add_box(Vec3::new(5.0, 0.25, 0.0), Vec3::new(5.0, 0.25, 5.0));
        let world = CollisionWorld::with_provider(Arc::new(level));

        let near_edge = PlacementEngine::ground_below(&world, -0.2, 0.0).unwrap();
        assert!(!PlacementEngine::is_corroborated(&world, &near_edge));

        let open_floor = PlacementEngine::ground_below(&world, -3.0, 0.0).unwrap();
        assert!(PlacementEngine::is_corroborated(&world, &open_floor));
    }

    #[test]
    fn low_ceiling_blocks_placement() {
        let mut level = LevelGeometry::flat_floor(0.0, 60.0);
        level.add_box(Vec3::new(0.0, 0.5, 0.0), Vec3::new(2.0, 0.2, 2.0));
        let world = CollisionWorld::with_provider(Arc::new(level));

        assert!(!PlacementEngine::has_headroom(&world, Vec3::new(0.0, 0.0, 0.0)));
        assert!(PlacementEngine::has_headroom(&world, Vec3::new(5.0, 0.0, 5.0)));
    }

    #[test]
    fn player_clearance() {
        let players = roster(vec![player_at(Vec3::ZERO)]);

        assert!(!PlacementEngine::is_clear_of_players(Vec3::new(1.5, 0.5, 0.0), &players));
        assert!(PlacementEngine::is_clear_of_players(Vec3::new(4.0, 0.5, 0.0), &players));
    }

    #[test]
    fn clearance_ignores_height_difference() {
        // Player standing on a platform well above the candidate spot
        let players = roster(vec![player_at(Vec3::new(0.0, 3.0, 0.0))]);

        let beneath = Vec3::new(0.3, 0.5, 0.0);
        assert!(!PlacementEngine::is_clear_of_players(beneath, &players));

        let far_beneath = Vec3::new(0.3, -20.0, 0.0);
        assert!(!PlacementEngine::is_clear_of_players(far_beneath, &players));

        let beside = Vec3::new(3.0, 0.5, 0.0);
        assert!(PlacementEngine::is_clear_of_players(beside, &players));
    }

    #[test]
    fn wounded_player_claims_and_pickup_disappears() {
        let mut wounded = player_at(Vec3::ZERO);
        wounded.health = 90.0;
        let healthy = player_at(Vec3::new(0.5, 0.0, 0.0));
        let (wounded_id, healthy_id) = (wounded.id, healthy.id);
        let mut players = roster(vec![wounded, healthy]);

        let mut ids = IdGenerator::new();
        let mut pickups = vec![
            Pickup { id: ids.next_id(), position: Vec3::new(0.0, 0.85, 0.5), claimed: false },
            Pickup { id: ids.next_id(), position: Vec3::new(20.0, 0.5, 0.0), claimed: false },
        ];

        let claimed = PickupSystem::claim(&mut players, &mut pickups);

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].1, vec![wounded_id]);
        assert_eq!(players[&wounded_id].health, MAX_HEALTH);
        assert_eq!(players[&healthy_id].health, MAX_HEALTH);
        assert_eq!(pickups.len(), 1);
        assert_eq!(pickups[0].position.x, 20.0);
    }

    #[test]
    fn full_health_players_leave_pickups_alone() {
        let mut players = roster(vec![player_at(Vec3::ZERO)]);
        let mut pickups = vec![Pickup {
            id: IdGenerator::new().next_id(),
            position: Vec3::new(0.0, 0.85, 0.0),
            claimed: false,
        }];
        assert!(PickupSystem::claim(&mut players, &mut pickups).is_empty());
        assert_eq!(pickups.len(), 1);
    }

    #[test]
    fn maintain_respects_interval_and_cap() {
        let world = flat();
        let players = HashMap::new();
        let mut ids = IdGenerator::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut pickups = Vec::new();
        let mut last_spawn = Duration::ZERO;

        let early = SPAWN_INTERVAL - Duration::from_millis(1);
        assert!(PickupSystem::maintain(&mut pickups, &mut last_spawn, early, &world, &players, &mut ids, &mut rng).is_none());

        let mut now = Duration::ZERO;
        for _ in 0..MAX_PICKUPS + 2 {
            now += SPAWN_INTERVAL;
            PickupSystem::maintain(&mut pickups, &mut last_spawn, now, &world, &players, &mut ids, &mut rng);
        }
        assert_eq!(pickups.len(), MAX_PICKUPS);
    }
}
