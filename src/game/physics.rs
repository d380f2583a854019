//! Player movement integration and world collision response

use glam::Vec3;

use crate::collision::CollisionWorld;

use super::player::Player;

/// Movement constants
pub const GRAVITY: f32 = 30.0;
/// Horizontal acceleration while a movement key is held (units/s²)
pub const MOVE_ACCELERATION: f32 = 60.0;
pub const MAX_HORIZONTAL_SPEED: f32 = 10.0;
/// Vertical speed given by a jump
pub const JUMP_IMPULSE: f32 = 10.0;
/// Exponential decay rate of horizontal velocity (1/s)
pub const DAMPING_RATE: f32 = 6.0;
/// Bodies below this height fell out of the level
pub const MIN_ALTITUDE: f32 = -25.0;

/// What happened to a body during one substep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved,
    /// Fell out of the world and was put back at the spawn point
    ResetToSpawn,
}

/// Physics system for integrating player bodies
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one player by one substep of `dt` seconds
    pub fn step_player(player: &mut Player, collision: &CollisionWorld, dt: f32) -> StepOutcome {
        Self::apply_input(player, dt);

        player.capsule.translate(player.velocity * dt);
        Self::resolve_world_collision(player, collision);

        if player.capsule.start.y < MIN_ALTITUDE {
            player.reset_to_spawn();
            return StepOutcome::ResetToSpawn;
        }
        StepOutcome::Moved
    }

    /// Update velocity from held keys, jump, gravity and damping
    pub fn apply_input(player: &mut Player, dt: f32) {
        let forward = player.orientation.ground_forward();
        let right = forward.cross(Vec3::Y);
        let accel = MOVE_ACCELERATION * dt;
        let keys = player.keys;

        let mut velocity = player.velocity;
        if keys.forward {
            velocity += forward * accel;
        }
        if keys.backward {
            velocity -= forward * accel;
        }
        if keys.right {
            velocity += right * accel;
        }
        if keys.left {
            velocity -= right * accel;
        }

        if player.grounded && keys.jump {
            velocity.y = JUMP_IMPULSE;
            player.grounded = false;
        }

        if !player.grounded {
            velocity.y -= GRAVITY * dt;
        }

        let damping = (-DAMPING_RATE * dt).exp();
        velocity.x *= damping;
        velocity.z *= damping;

        player.velocity = Self::clamp_horizontal_speed(velocity, MAX_HORIZONTAL_SPEED);
    }

    /// Rescale the horizontal part of `velocity` to at most `max_speed`
    pub fn clamp_horizontal_speed(velocity: Vec3, max_speed: f32) -> Vec3 {
        let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
        let speed = horizontal.length();
        if speed > max_speed {
            let scale = max_speed / speed;
            Vec3::new(velocity.x * scale, velocity.y, velocity.z * scale)
        } else {
            velocity
        }
    }

    /// Push the capsule out of level geometry and update the grounded flag
    fn resolve_world_collision(player: &mut Player, collision: &CollisionWorld) {
        player.grounded = false;

        let Some(contact) = collision.sweep_capsule(&player.capsule) else {
            return;
        };

        player.grounded = contact.normal.y > 0.0;
        if player.grounded {
            // Resting on a floor: stop accumulating fall speed
            player.velocity.y = player.velocity.y.max(0.0);
        } else {
            // Slide along walls and ceilings
            let into = contact.normal.dot(player.velocity);
            player.velocity = Self::clamp_horizontal_speed(
                player.velocity - contact.normal * into,
                MAX_HORIZONTAL_SPEED,
            );
        }

        player.capsule.translate(contact.normal * contact.depth);
    }
}
