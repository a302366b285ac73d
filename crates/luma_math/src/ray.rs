use crate::Vec3;

/// A ray in 3D space with origin and unit direction.
///
/// The reciprocal direction and per-axis sign flags are computed once on
/// construction so that bounding-box slab tests need no divisions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
    pub dir_is_neg: [bool; 3],
}

impl Ray {
    /// Create a new ray. `direction` is normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = direction.normalize_or_zero();
        let inv_direction = direction.recip();
        Self {
            origin,
            direction,
            inv_direction,
            dir_is_neg: [direction.x < 0.0, direction.y < 0.0, direction.z < 0.0],
        }
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the unit direction vector of the ray.
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
