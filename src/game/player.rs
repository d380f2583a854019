//! Player entity and per-player input state

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use glam::{EulerRot, Quat, Vec3};
use uuid::Uuid;

use crate::collision::Capsule;

/// Player constants
pub const MAX_HEALTH: f32 = 100.0;
pub const MAX_AMMO: u32 = 30;
pub const MAX_NAME_LEN: usize = 16;
pub const DEFAULT_NAME: &str = "Player";

pub const CAPSULE_RADIUS: f32 = 0.35;
/// Feet to top of head
pub const PLAYER_HEIGHT: f32 = 1.7;
/// Where every player enters the world (feet position)
pub const SPAWN_FEET: Vec3 = Vec3::new(0.0, 2.0, 0.0);

/// Movement actions a client can hold down. Anything else a client sends is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveAction {
    Forward,
    Backward,
    Left,
    Right,
    Jump,
}

impl MoveAction {
    /// Map a client key code onto an action
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "KeyW" | "ArrowUp" => Some(Self::Forward),
            "KeyS" | "ArrowDown" => Some(Self::Backward),
            "KeyA" | "ArrowLeft" => Some(Self::Left),
            "KeyD" | "ArrowRight" => Some(Self::Right),
            "Space" => Some(Self::Jump),
            _ => None,
        }
    }
}

/// Currently held movement actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl MoveKeys {
    pub fn press(&mut self, action: MoveAction) {
        match action {
            MoveAction::Forward => self.forward = true,
            MoveAction::Backward => self.backward = true,
            MoveAction::Left => self.left = true,
            MoveAction::Right => self.right = true,
            MoveAction::Jump => self.jump = true,
        }
    }

    pub fn with(mut self, action: MoveAction) -> Self {
        self.press(action);
        self
    }
}

/// View orientation in radians
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Orientation {
    /// Build from client values; pitch is clamped to straight up/down.
    /// Returns `None` when any component is not finite.
    pub fn sanitized(pitch: f32, yaw: f32, roll: f32) -> Option<Self> {
        if !(pitch.is_finite() && yaw.is_finite() && roll.is_finite()) {
            return None;
        }
        Some(Self {
            pitch: pitch.clamp(-FRAC_PI_2, FRAC_PI_2),
            yaw,
            roll,
        })
    }

    /// Forward direction on the ground plane (yaw only)
    pub fn ground_forward(&self) -> Vec3 {
        Vec3::new(-self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    /// Aim direction from yaw and pitch; roll does not affect where shots go
    pub fn aim_direction(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(
            -self.yaw.sin() * cos_pitch,
            sin_pitch,
            -self.yaw.cos() * cos_pitch,
        )
    }

    /// Full view rotation (yaw, then pitch, then roll)
    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, self.roll)
    }
}

/// Reload sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Ready,
    Reloading { started_at: Duration },
}

/// A live player (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub capsule: Capsule,
    pub velocity: Vec3,
    pub orientation: Orientation,
    pub keys: MoveKeys,
    pub grounded: bool,
    pub health: f32,
    pub ammo: u32,
    pub reload: ReloadState,
    pub kills: u32,
}

impl Player {
    /// Fresh player at the spawn pose with full health and ammo
    pub fn spawn(id: Uuid, name: String, kills: u32) -> Self {
        Self {
            id,
            name,
            capsule: spawn_capsule(),
            velocity: Vec3::ZERO,
            orientation: Orientation::default(),
            keys: MoveKeys::default(),
            grounded: false,
            health: MAX_HEALTH,
            ammo: MAX_AMMO,
            reload: ReloadState::Ready,
            kills,
        }
    }

    pub fn is_reloading(&self) -> bool {
        matches!(self.reload, ReloadState::Reloading { .. })
    }

    /// Body position as clients see it (horizontal center, feet height)
    pub fn position(&self) -> Vec3 {
        self.capsule.feet()
    }

    /// Move the body so its feet are at `feet`
    pub fn set_feet_position(&mut self, feet: Vec3) {
        let offset = feet - self.capsule.feet();
        self.capsule.translate(offset);
    }

    /// Back to the spawn pose, at rest. Health, ammo and kills are untouched.
    pub fn reset_to_spawn(&mut self) {
        self.capsule = spawn_capsule();
        self.velocity = Vec3::ZERO;
        self.grounded = false;
    }

    /// Eye point used as the origin of shots
    pub fn head(&self) -> Vec3 {
        self.capsule.end
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

fn spawn_capsule() -> Capsule {
    Capsule::new(
        SPAWN_FEET + Vec3::new(0.0, CAPSULE_RADIUS, 0.0),
        SPAWN_FEET + Vec3::new(0.0, PLAYER_HEIGHT - CAPSULE_RADIUS, 0.0),
        CAPSULE_RADIUS,
    )
}

/// A dead player waiting to re-enter the live set
#[derive(Debug, Clone)]
pub struct PendingRespawn {
    pub name: String,
    pub respawn_at: Duration,
    pub kills: u32,
}

/// Trim a requested display name to the allowed length. Empty names are rejected.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_NAME_LEN).collect())
}
