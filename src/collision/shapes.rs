//! Primitive collision volumes used by the simulation

use glam::Vec3;

/// A line segment swept by a sphere. Player bodies are capsules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    /// Lower segment endpoint (sphere center at the feet)
    pub start: Vec3,
    /// Upper segment endpoint (sphere center at the head)
    pub end: Vec3,
    pub radius: f32,
}

impl Capsule {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        Self { start, end, radius }
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.start += offset;
        self.end += offset;
    }

    /// Midpoint of the segment
    pub fn center(&self) -> Vec3 {
        (self.start + self.end) * 0.5
    }

    /// Horizontal center at foot height
    pub fn feet(&self) -> Vec3 {
        let center = self.center();
        Vec3::new(center.x, self.start.y - self.radius, center.z)
    }

    /// Top of the capsule
    pub fn head_top(&self) -> f32 {
        self.end.y + self.radius
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        closest_point_on_segment(self.start, self.end, point)
    }

    /// Capsule/sphere overlap test
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let reach = self.radius + radius;
        self.closest_point(center).distance_squared(center) < reach * reach
    }

    pub fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.radius.is_finite()
    }
}

/// Closest point to `point` on the segment `a..b`
pub fn closest_point_on_segment(a: Vec3, b: Vec3, point: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}
