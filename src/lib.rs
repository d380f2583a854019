//! Arena Shooter Server - authoritative simulation core of a multiplayer shooter
//!
//! - `game`: fixed-rate world simulation (movement, combat, pickups)
//! - `collision`: fault-tolerant queries against the level geometry
//! - `ws` / `http`: WebSocket sessions, health endpoint

pub mod app;
pub mod collision;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
