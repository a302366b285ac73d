//! Sphere primitive.

use std::f32::consts::PI;
use std::sync::Arc;

use luma_math::{Aabb, Ray, Vec3};
use rand::RngCore;

use crate::{gen_f32, Intersection, LightSample, Material, Primitive, RAY_EPSILON};

/// A sphere.
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Arc<Material>,
    bbox: Aabb,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material: Arc<Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Primitive for Sphere {
    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        let oc = self.center - ray.origin();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        // Directions are unit length, so a == 1
        let discriminant = h * h - c;
        if discriminant < 0.0 {
            return Intersection::miss();
        }

        let sqrtd = discriminant.sqrt();

        // Nearest root past the epsilon; the far root covers rays from inside
        let mut root = h - sqrtd;
        if root <= RAY_EPSILON {
            root = h + sqrtd;
            if root <= RAY_EPSILON {
                return Intersection::miss();
            }
        }

        let position = ray.at(root);
        let normal = (position - self.center).normalize_or_zero();
        Intersection::hit(root, position, normal, &self.material)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> LightSample {
        let z = 1.0 - 2.0 * gen_f32(rng);
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * gen_f32(rng);
        let normal = Vec3::new(r * phi.cos(), r * phi.sin(), z);

        LightSample {
            position: self.center + self.radius * normal,
            normal,
            emission: self.material.emission(),
            primitive: None,
            pdf: 1.0 / self.area(),
        }
    }

    fn material(&self) -> &Material {
        &self.material
    }
}
