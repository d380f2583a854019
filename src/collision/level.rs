//! Static level geometry backed by parry3d shapes.
//!
//! Built once at startup, immutable afterwards, so it can be shared across
//! threads behind an `Arc`.

use std::path::Path;

use glam::Vec3;
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query::{self, Ray, RayCast};
use parry3d::shape::{Capsule as ParryCapsule, SharedShape};
use serde::Deserialize;

use super::shapes::Capsule;
use super::{CapsuleContact, GeometryError, RayHit, SpatialQuery};

/// Contacts closer than this count as touching even without penetration,
/// so a capsule resting on a floor keeps reporting it.
const CONTACT_SKIN: f32 = 0.01;

/// A piece of static collision geometry
#[derive(Clone)]
struct Brush {
    shape: SharedShape,
    transform: Isometry<Real>,
}

/// Triangle soup as exported by the level tooling
#[derive(Debug, Deserialize)]
pub struct LevelMesh {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

/// Static level collision geometry
#[derive(Clone, Default)]
pub struct LevelGeometry {
    brushes: Vec<Brush>,
}

impl LevelGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single slab whose top face sits at `height`
    pub fn flat_floor(height: f32, half_extent: f32) -> Self {
        let mut level = Self::new();
        level.add_box(
            Vec3::new(0.0, height - 0.5, 0.0),
            Vec3::new(half_extent, 0.5, half_extent),
        );
        level
    }

    /// Built-in arena used when no mesh is configured: a floor, perimeter
    /// walls and a handful of cover blocks.
    pub fn default_arena() -> Self {
        let mut level = Self::flat_floor(0.0, 52.0);

        for (center, half) in [
            (Vec3::new(50.5, 3.0, 0.0), Vec3::new(0.5, 3.0, 51.0)),
            (Vec3::new(-50.5, 3.0, 0.0), Vec3::new(0.5, 3.0, 51.0)),
            (Vec3::new(0.0, 3.0, 50.5), Vec3::new(51.0, 3.0, 0.5)),
            (Vec3::new(0.0, 3.0, -50.5), Vec3::new(51.0, 3.0, 0.5)),
        ] {
            level.add_box(center, half);
        }

        for center in [
            Vec3::new(12.0, 1.0, 10.0),
            Vec3::new(-14.0, 1.0, 6.0),
            Vec3::new(6.0, 1.0, -16.0),
            Vec3::new(-8.0, 1.0, -22.0),
            Vec3::new(24.0, 1.0, -6.0),
        ] {
            level.add_box(center, Vec3::new(1.5, 1.0, 1.5));
        }

        level
    }

    /// Load a triangle mesh from a JSON file
    pub fn from_mesh_file(path: &Path) -> Result<Self, GeometryError> {
        let raw = std::fs::read_to_string(path)?;
        let mesh: LevelMesh = serde_json::from_str(&raw)?;
        Self::from_mesh(&mesh)
    }

    pub fn from_mesh(mesh: &LevelMesh) -> Result<Self, GeometryError> {
        let mut level = Self::new();
        level.add_triangles(&mesh.vertices, &mesh.triangles)?;
        Ok(level)
    }

    /// Add an axis-aligned box
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) {
        self.brushes.push(Brush {
            shape: SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            transform: Isometry::translation(center.x, center.y, center.z),
        });
    }

    /// Add a triangle mesh. Degenerate triangles are skipped; out-of-range
    /// indices or non-finite vertices reject the whole mesh.
    pub fn add_triangles(
        &mut self,
        vertices: &[[f32; 3]],
        triangles: &[[u32; 3]],
    ) -> Result<(), GeometryError> {
        if let Some(bad) = vertices.iter().position(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::InvalidMesh(format!("vertex {bad} is not finite")));
        }

        let mut parts = Vec::with_capacity(triangles.len());
        for (i, tri) in triangles.iter().enumerate() {
            let mut corners = [Point::origin(); 3];
            for (corner, &index) in corners.iter_mut().zip(tri) {
                let v = vertices.get(index as usize).ok_or_else(|| {
                    GeometryError::InvalidMesh(format!("triangle {i} references missing vertex {index}"))
                })?;
                *corner = Point::new(v[0], v[1], v[2]);
            }

            let area = (corners[1] - corners[0]).cross(&(corners[2] - corners[0])).norm();
            if area <= f32::EPSILON {
                continue;
            }
            parts.push((
                Isometry::identity(),
                SharedShape::triangle(corners[0], corners[1], corners[2]),
            ));
        }

        if parts.is_empty() {
            return Err(GeometryError::InvalidMesh("mesh has no usable triangles".to_string()));
        }

        self.brushes.push(Brush {
            shape: SharedShape::compound(parts),
            transform: Isometry::identity(),
        });
        Ok(())
    }

    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }
}

fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

impl SpatialQuery for LevelGeometry {
    fn ray_intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<RayHit>, GeometryError> {
        let ray = Ray::new(to_point(origin), Vector::new(direction.x, direction.y, direction.z));

        let mut closest: Option<(f32, &Brush)> = None;
        for brush in &self.brushes {
            if let Some(toi) = brush.shape.cast_ray(&brush.transform, &ray, max_distance, true) {
                if closest.map_or(true, |(best, _)| toi < best) {
                    closest = Some((toi, brush));
                }
            }
        }

        let Some((distance, brush)) = closest else {
            return Ok(None);
        };

        let mut normal = brush
            .shape
            .cast_ray_and_get_normal(&brush.transform, &ray, distance + 0.01, true)
            .map(|hit| from_vector(&hit.normal))
            .unwrap_or(-direction);
        if normal.dot(direction) > 0.0 {
            normal = -normal;
        }

        Ok(Some(RayHit {
            point: origin + direction * distance,
            normal,
            distance,
        }))
    }

    fn capsule_intersect(&self, capsule: &Capsule) -> Result<Option<CapsuleContact>, GeometryError> {
        let shape = ParryCapsule::new(to_point(capsule.start), to_point(capsule.end), capsule.radius);
        let identity = Isometry::identity();

        let mut push = Vec3::ZERO;
        let mut touching = Vec3::ZERO;
        let mut contacts = 0;

        for brush in &self.brushes {
            let contact = query::contact(&identity, &shape, &brush.transform, &*brush.shape, CONTACT_SKIN)
                .map_err(|_| GeometryError::Unsupported)?;

            if let Some(contact) = contact {
                // normal1 points from the capsule toward the brush
                let away = -from_vector(&contact.normal1);
                let depth = (-contact.dist).max(0.0);
                push += away * depth;
                touching += away;
                contacts += 1;
            }
        }

        if contacts == 0 {
            return Ok(None);
        }

        let depth = push.length();
        let contact = if depth > f32::EPSILON {
            CapsuleContact {
                normal: push / depth,
                depth,
            }
        } else {
            CapsuleContact {
                normal: touching.try_normalize().unwrap_or(Vec3::Y),
                depth: 0.0,
            }
        };
        Ok(Some(contact))
    }
}
