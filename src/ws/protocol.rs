//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::game::player::{sanitize_name, MoveAction, MoveKeys, Orientation};
use crate::util::ids::EntityId;

/// Messages sent from client to server.
///
/// Payload fields are kept loosely typed so that one malformed field can be
/// discarded without losing the rest of the message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Set the display name
    Join {
        #[serde(default)]
        name: Value,
    },

    /// Held movement keys and view orientation
    Input {
        #[serde(default)]
        rotation: Value,
        #[serde(default)]
        keys: Value,
    },

    /// Fire the weapon
    Shoot,

    /// Start reloading
    Reload,
}

/// Client message decoding errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed client message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ClientMsg {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Validated display name from a join payload; `None` if not a non-empty string
pub fn parse_name(value: &Value) -> Option<String> {
    value.as_str().and_then(sanitize_name)
}

/// Validated orientation from `{x: pitch, y: yaw, z: roll}` in radians.
/// Missing, non-numeric or non-finite components reject the whole rotation.
pub fn parse_rotation(value: &Value) -> Option<Orientation> {
    let component = |axis: &str| value.get(axis)?.as_f64().map(|v| v as f32);
    Orientation::sanitized(component("x")?, component("y")?, component("z")?)
}

/// Held movement keys from a `{code: bool}` map. Unknown codes and non-boolean
/// values are ignored; a non-object payload is rejected.
pub fn parse_keys(value: &Value) -> Option<MoveKeys> {
    let map = value.as_object()?;
    let mut keys = MoveKeys::default();
    for (code, held) in map {
        if held.as_bool() != Some(true) {
            continue;
        }
        if let Some(action) = MoveAction::from_key(code) {
            keys.press(action);
        }
    }
    Some(keys)
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once when the connection is accepted
    Init {
        #[serde(rename = "playerId")]
        player_id: Uuid,
    },

    /// World state, sent every tick
    Update {
        players: Vec<PlayerSnapshot>,
        bullets: Vec<BulletSnapshot>,
        medkits: Vec<MedkitSnapshot>,
    },
}

/// `{x, y, z}` vector on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WireVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for WireVec3 {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Orientation> for WireVec3 {
    fn from(o: Orientation) -> Self {
        Self {
            x: o.pitch,
            y: o.yaw,
            z: o.roll,
        }
    }
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    /// Horizontal body center at foot height
    pub position: WireVec3,
    pub rotation: WireVec3,
    pub health: f32,
    pub max_health: f32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub is_reloading: bool,
    pub kills: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulletSnapshot {
    pub id: EntityId,
    pub position: WireVec3,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedkitSnapshot {
    pub id: EntityId,
    pub position: WireVec3,
}
