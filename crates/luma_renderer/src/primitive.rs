//! Primitive trait, intersection records and light samples.

use luma_math::{Aabb, Ray, Vec3};
use rand::RngCore;

use crate::{Color, Material};

/// Minimum accepted hit distance. Hits closer than this are treated as
/// self-intersections of the surface a ray was spawned from.
pub const RAY_EPSILON: f32 = 1e-4;

/// Index of a primitive inside its owning container (scene or mesh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub usize);

/// Result of a ray-primitive query.
///
/// A miss has `happened == false` and `distance == f32::INFINITY`, so the
/// nearer of two records can be picked by distance alone.
#[derive(Debug, Clone, Copy)]
pub struct Intersection<'a> {
    pub happened: bool,
    /// Ray parameter of the hit (rays are unit length, so also the distance)
    pub distance: f32,
    pub position: Vec3,
    /// Geometric normal on the outside of the surface
    pub normal: Vec3,
    /// Emitted radiance, zero unless the material emits
    pub emission: Color,
    /// Primitive that was hit, stamped by the BVH leaf that found it
    pub primitive: Option<PrimitiveId>,
    pub material: Option<&'a Material>,
}

impl<'a> Intersection<'a> {
    /// A record for a ray that hit nothing.
    pub fn miss() -> Self {
        Self {
            happened: false,
            distance: f32::INFINITY,
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            emission: Color::ZERO,
            primitive: None,
            material: None,
        }
    }

    /// A hit at `distance` along the ray.
    pub fn hit(distance: f32, position: Vec3, normal: Vec3, material: &'a Material) -> Self {
        Self {
            happened: true,
            distance,
            position,
            normal,
            emission: material.emission(),
            primitive: None,
            material: Some(material),
        }
    }

    /// The nearer of two records; `other` wins only when strictly closer.
    pub fn nearer(self, other: Self) -> Self {
        if other.happened && other.distance < self.distance {
            other
        } else {
            self
        }
    }

    /// Tag the record with the id of the primitive that produced it.
    pub fn with_primitive(mut self, id: PrimitiveId) -> Self {
        if self.happened {
            self.primitive = Some(id);
        }
        self
    }
}

impl Default for Intersection<'_> {
    fn default() -> Self {
        Self::miss()
    }
}

/// A point drawn on an emitting surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub emission: Color,
    /// Emitter the point was drawn from
    pub primitive: Option<PrimitiveId>,
    /// Density with respect to surface area
    pub pdf: f32,
}

impl LightSample {
    pub fn with_primitive(mut self, id: PrimitiveId) -> Self {
        self.primitive = Some(id);
        self
    }
}

/// Geometry that can be placed in a scene.
///
/// Implementors must be shareable across render threads; all queries take
/// `&self` and the scene never mutates primitives once its BVH is built.
pub trait Primitive: Send + Sync {
    /// World-space bounds.
    fn bounding_box(&self) -> Aabb;

    /// Total surface area.
    fn area(&self) -> f32;

    /// Nearest hit along `ray` farther than [`RAY_EPSILON`].
    fn intersect(&self, ray: &Ray) -> Intersection<'_>;

    /// Draw a point uniformly by area; the returned pdf is `1 / area`.
    fn sample(&self, rng: &mut dyn RngCore) -> LightSample;

    fn material(&self) -> &Material;

    fn has_emission(&self) -> bool {
        self.material().has_emission()
    }
}

impl<P: Primitive + ?Sized> Primitive for Box<P> {
    fn bounding_box(&self) -> Aabb {
        (**self).bounding_box()
    }

    fn area(&self) -> f32 {
        (**self).area()
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        (**self).intersect(ray)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> LightSample {
        (**self).sample(rng)
    }

    fn material(&self) -> &Material {
        (**self).material()
    }

    fn has_emission(&self) -> bool {
        (**self).has_emission()
    }
}
