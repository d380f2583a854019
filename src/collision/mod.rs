//! Collision queries against static level geometry.
//!
//! The level is an opaque [`SpatialQuery`] provider that may not exist yet
//! (still loading) or may fail a query. [`CollisionWorld`] is the facade the
//! simulation talks to: every query answers `Option`, and "not loaded",
//! "provider error" and "malformed result" all collapse to `None`.

pub mod level;
pub mod shapes;

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use tracing::debug;

pub use level::LevelGeometry;
pub use shapes::Capsule;

/// Farthest distance any ray query looks
pub const MAX_RAY_DISTANCE: f32 = 1000.0;

/// Closest ray intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Surface normal facing back toward the ray origin
    pub normal: Vec3,
    pub distance: f32,
}

/// Result of overlapping a capsule with the level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleContact {
    /// Direction that moves the capsule out of the geometry
    pub normal: Vec3,
    /// Distance along `normal` needed to separate
    pub depth: f32,
}

/// Errors raised by a geometry provider
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Unsupported shape pair in collision query")]
    Unsupported,

    #[error("Invalid level mesh: {0}")]
    InvalidMesh(String),

    #[error("Failed to read level mesh: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse level mesh: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The spatial structure answering queries against static geometry.
pub trait SpatialQuery: Send + Sync {
    /// Closest hit along `direction` (unit length) within `max_distance`
    fn ray_intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<RayHit>, GeometryError>;

    /// Combined separation for a capsule overlapping the geometry
    fn capsule_intersect(&self, capsule: &Capsule) -> Result<Option<CapsuleContact>, GeometryError>;
}

/// Fault-tolerant facade over the (possibly not yet built) level geometry.
#[derive(Clone, Default)]
pub struct CollisionWorld {
    provider: Arc<RwLock<Option<Arc<dyn SpatialQuery>>>>,
}

impl CollisionWorld {
    /// A facade with no geometry installed; every query misses.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn SpatialQuery>) -> Self {
        let world = Self::new();
        world.install(provider);
        world
    }

    /// Install (or replace) the geometry provider
    pub fn install(&self, provider: Arc<dyn SpatialQuery>) {
        *self.provider.write() = Some(provider);
    }

    pub fn is_ready(&self) -> bool {
        self.provider.read().is_some()
    }

    fn provider(&self) -> Option<Arc<dyn SpatialQuery>> {
        self.provider.read().clone()
    }

    /// Cast a ray from `origin` along `direction`.
    pub fn cast_ray(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        let provider = self.provider()?;
        let direction = direction.try_normalize()?;
        if !origin.is_finite() {
            return None;
        }

        match provider.ray_intersect(origin, direction, MAX_RAY_DISTANCE) {
            Ok(Some(hit))
                if hit.point.is_finite() && hit.normal.is_finite() && hit.distance.is_finite() =>
            {
                Some(hit)
            }
            Ok(Some(hit)) => {
                debug!(?hit, "Discarding non-finite ray hit");
                None
            }
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Ray query failed, treating as miss");
                None
            }
        }
    }

    /// Overlap a capsule with the level.
    pub fn sweep_capsule(&self, capsule: &Capsule) -> Option<CapsuleContact> {
        let provider = self.provider()?;
        if !capsule.is_finite() {
            return None;
        }

        match provider.capsule_intersect(capsule) {
            Ok(Some(contact))
                if contact.normal.is_finite()
                    && contact.depth.is_finite()
                    && contact.depth >= 0.0 =>
            {
                Some(contact)
            }
            Ok(Some(contact)) => {
                debug!(?contact, "Discarding malformed capsule contact");
                None
            }
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Capsule query failed, treating as miss");
                None
            }
        }
    }
}
