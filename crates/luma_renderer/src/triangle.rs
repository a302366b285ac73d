//! Triangle primitive.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use std::sync::Arc;

use luma_math::{Aabb, Ray, Vec3};
use rand::RngCore;

use crate::{gen_f32, Intersection, LightSample, Material, Primitive, RAY_EPSILON};

/// A single triangle.
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Edges from `v0`
    e1: Vec3,
    e2: Vec3,
    /// Unit face normal, right-handed in vertex order
    normal: Vec3,
    area: f32,
    material: Arc<Material>,
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: Arc<Material>) -> Self {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let cross = e1.cross(e2);

        let bbox = Aabb::from_points(v0, v1).union_point(v2);

        Self {
            v0,
            v1,
            v2,
            e1,
            e2,
            normal: cross.normalize_or_zero(),
            area: 0.5 * cross.length(),
            material,
            bbox,
        }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

impl Primitive for Triangle {
    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        let h = ray.direction().cross(self.e2);
        let a = self.e1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return Intersection::miss();
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return Intersection::miss();
        }

        let q = s.cross(self.e1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return Intersection::miss();
        }

        let t = f * self.e2.dot(q);
        if t <= RAY_EPSILON {
            return Intersection::miss();
        }

        Intersection::hit(t, ray.at(t), self.normal, &self.material)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> LightSample {
        // Square-root warp gives uniform density over the triangle
        let x = gen_f32(rng).sqrt();
        let y = gen_f32(rng);
        let position = self.v0 * (1.0 - x) + self.v1 * (x * (1.0 - y)) + self.v2 * (x * y);

        LightSample {
            position,
            normal: self.normal,
            emission: self.material.emission(),
            primitive: None,
            pdf: 1.0 / self.area,
        }
    }

    fn material(&self) -> &Material {
        &self.material
    }
}
