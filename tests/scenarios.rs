//! End-to-end simulation scenarios driven through the public `World` API

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use uuid::Uuid;

use arena_shooter_server::collision::{CollisionWorld, LevelGeometry};
use arena_shooter_server::game::combat::{WeaponStats, RESPAWN_DELAY};
use arena_shooter_server::game::player::{Orientation, MAX_AMMO, MAX_HEALTH};
use arena_shooter_server::game::snapshot::SnapshotBuilder;
use arena_shooter_server::game::World;
use arena_shooter_server::util::time::tick_duration;
use arena_shooter_server::ws::protocol::{PlayerSnapshot, ServerMsg};

const STATS: WeaponStats = WeaponStats::STANDARD;

fn flat_world() -> World {
    let level = LevelGeometry::flat_floor(0.0, 60.0);
    World::new(CollisionWorld::with_provider(Arc::new(level)), 2024)
}

/// Shooter at the origin facing -Z, target standing 10 units ahead
fn duel() -> (World, Uuid, Uuid) {
    let mut world = flat_world();
    let shooter = Uuid::new_v4();
    let target = Uuid::new_v4();
    world.connect(shooter);
    world.connect(target);

    world.player_mut(&shooter).unwrap().set_feet_position(Vec3::ZERO);
    world.player_mut(&target).unwrap().set_feet_position(Vec3::new(0.0, 0.0, -10.0));
    world.apply_input(shooter, Orientation::sanitized(0.0, 0.0, 0.0), None);

    for _ in 0..30 {
        world.tick();
    }
    assert!(world.player(&shooter).unwrap().grounded);
    assert!(world.player(&target).unwrap().grounded);
    (world, shooter, target)
}

fn snapshot_players(world: &World) -> Vec<PlayerSnapshot> {
    match SnapshotBuilder::new().build(world) {
        ServerMsg::Update { players, .. } => players,
        other => panic!("unexpected snapshot {other:?}"),
    }
}

/// Fire once and tick until the shot lands on `target`. Returns the number of ticks.
fn shoot_and_wait_for_hit(world: &mut World, shooter: Uuid, target: Uuid) -> (u32, bool) {
    let projectile = world.fire(shooter).expect("shot refused");
    let max_ticks = STATS.projectile_lifetime.as_millis() / tick_duration().as_millis();

    for ticks in 1..=max_ticks as u32 {
        let report = world.tick();
        if let Some(hit) = report.hits.iter().find(|h| h.projectile_id == projectile) {
            assert_eq!(hit.target_id, target);
            return (ticks, hit.target_killed);
        }
    }
    panic!("projectile never hit the target");
}

#[test]
fn single_hit_deals_fixed_damage() {
    let (mut world, shooter, target) = duel();

    let (ticks, killed) = shoot_and_wait_for_hit(&mut world, shooter, target);

    assert!(!killed);
    // 10 units at 80 units/s
    assert!(ticks <= 10, "hit took {ticks} ticks");
    assert_eq!(world.player(&target).unwrap().health, MAX_HEALTH - STATS.damage);
    assert_eq!(world.player(&shooter).unwrap().kills, 0);
    assert!(world.projectiles().is_empty());

    let players = snapshot_players(&world);
    let target_snapshot = players.iter().find(|p| p.id == target).unwrap();
    assert_eq!(target_snapshot.health, 80.0);
}

#[test]
fn fifth_hit_kills_and_target_respawns_after_delay() {
    let (mut world, shooter, target) = duel();
    world.player_mut(&target).unwrap().kills = 2;

    for _ in 0..4 {
        let (_, killed) = shoot_and_wait_for_hit(&mut world, shooter, target);
        assert!(!killed);
    }
    assert_eq!(world.player(&target).unwrap().health, STATS.damage);

    let (_, killed) = shoot_and_wait_for_hit(&mut world, shooter, target);
    assert!(killed);
    let died_at = world.now();

    assert!(world.player(&target).is_none());
    assert!(snapshot_players(&world).iter().all(|p| p.id != target));
    assert_eq!(world.player(&shooter).unwrap().kills, 1);

    let pending = world.pending_respawn(&target).unwrap();
    assert_eq!(pending.respawn_at, died_at + RESPAWN_DELAY);

    let mut ticks = 0;
    while world.player(&target).is_none() {
        world.tick();
        ticks += 1;
        assert!(ticks < 400, "target never respawned");
    }

    let waited = world.now() - died_at;
    assert!(waited >= RESPAWN_DELAY);
    assert!(waited < RESPAWN_DELAY + tick_duration());

    let players = snapshot_players(&world);
    let back = players.iter().find(|p| p.id == target).unwrap();
    assert_eq!(back.health, MAX_HEALTH);
    assert_eq!(back.ammo, MAX_AMMO);
    assert_eq!(back.kills, 2);
    assert!(!back.is_reloading);
    assert!(world.pending_respawn(&target).is_none());
}

#[test]
fn empty_magazine_reload_completes_after_reload_duration() {
    let mut world = flat_world();
    let id = Uuid::new_v4();
    world.connect(id);
    // Aim straight up so nothing is hit
    world.apply_input(id, Orientation::sanitized(FRAC_PI_2, 0.0, 0.0), None);
    for _ in 0..10 {
        world.tick();
    }

    for _ in 0..MAX_AMMO {
        world.fire(id).unwrap();
    }
    let started = world.now();
    let player = world.player(&id).unwrap();
    assert_eq!(player.ammo, 0);
    assert!(player.is_reloading());
    assert!(world.fire(id).is_err());

    let mut ticks = 0;
    loop {
        // Holding reload while already reloading is refused and does not restart the timer
        assert!(!world.reload(id));
        world.tick();
        ticks += 1;
        assert!(ticks < 200);
        if !world.player(&id).unwrap().is_reloading() {
            break;
        }
        assert!(world.now() - started < STATS.reload_duration);
    }

    let elapsed = world.now() - started;
    assert!(elapsed >= STATS.reload_duration);
    assert!(elapsed < STATS.reload_duration + tick_duration());

    let players = snapshot_players(&world);
    assert!(!players[0].is_reloading);
    assert_eq!(players[0].ammo, MAX_AMMO);
}

#[test]
fn world_without_geometry_keeps_running() {
    let mut world = World::new(CollisionWorld::new(), 9);
    let id = Uuid::new_v4();
    world.connect(id);
    world.fire(id).unwrap();

    let mut resets = 0;
    for _ in 0..(Duration::from_secs(12).as_millis() / tick_duration().as_millis()) {
        resets += world.tick().resets.len();
    }

    // Falls forever and keeps getting put back
    assert!(resets > 0);
    assert!(world.projectiles().is_empty());
    // Pickups still spawn through the fallbacks
    assert_eq!(world.pickups().len(), 1);
    assert!(world.pickups()[0].position.is_finite());
}
