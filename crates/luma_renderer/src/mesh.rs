//! Triangle meshes.
//!
//! A mesh is a single scene primitive backed by its own BVH over its
//! triangles. Emitting meshes are sampled through that BVH, so a point is
//! drawn uniformly over the whole mesh surface.

use std::sync::Arc;

use luma_math::{Aabb, Ray, Vec3};
use rand::RngCore;

use crate::{Bvh, Intersection, LightSample, Material, Primitive, SplitMethod, Triangle};

/// Indexed triangle mesh sharing one material.
pub struct Mesh {
    triangles: Vec<Triangle>,
    bvh: Bvh,
    area: f32,
    material: Arc<Material>,
}

impl Mesh {
    /// Build a mesh from vertex positions and triangle indices.
    ///
    /// Trailing indices that do not form a full triangle and triangles that
    /// reference missing vertices are skipped.
    pub fn new(
        positions: &[Vec3],
        indices: &[u32],
        material: Arc<Material>,
        split_method: SplitMethod,
    ) -> Self {
        let mut triangles = Vec::with_capacity(indices.len() / 3);

        for chunk in indices.chunks_exact(3) {
            let (i0, i1, i2) = (chunk[0] as usize, chunk[1] as usize, chunk[2] as usize);

            let (Some(&v0), Some(&v1), Some(&v2)) =
                (positions.get(i0), positions.get(i1), positions.get(i2))
            else {
                log::warn!(
                    "Invalid triangle indices: [{}, {}, {}], vertex count: {}",
                    i0,
                    i1,
                    i2,
                    positions.len()
                );
                continue;
            };

            triangles.push(Triangle::new(v0, v1, v2, material.clone()));
        }

        let area = triangles.iter().map(|t| t.area()).sum();
        let bvh = Bvh::build(&triangles, split_method);

        Self {
            triangles,
            bvh,
            area,
            material,
        }
    }

    /// Planar quad `a b c d`, wound so the normal is `(b - a) x (c - a)`.
    pub fn quad(a: Vec3, b: Vec3, c: Vec3, d: Vec3, material: Arc<Material>) -> Self {
        Self::new(&[a, b, c, d], &[0, 1, 2, 0, 2, 3], material, SplitMethod::Naive)
    }

    /// Several quads sharing one material, e.g. the faces of a box.
    pub fn from_quads(
        quads: &[[Vec3; 4]],
        material: Arc<Material>,
        split_method: SplitMethod,
    ) -> Self {
        let positions: Vec<Vec3> = quads.iter().flatten().copied().collect();
        let indices: Vec<u32> = (0..quads.len() as u32)
            .flat_map(|q| {
                let base = 4 * q;
                [base, base + 1, base + 2, base, base + 2, base + 3]
            })
            .collect();
        Self::new(&positions, &indices, material, split_method)
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl Primitive for Mesh {
    fn bounding_box(&self) -> Aabb {
        self.bvh.bounds()
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        let mut hit = self.bvh.intersect(ray, &self.triangles);
        // Triangle indices are internal; the owning scene stamps its own id
        hit.primitive = None;
        hit
    }

    fn sample(&self, rng: &mut dyn RngCore) -> LightSample {
        match self.bvh.sample(&self.triangles, rng) {
            Some(sample) => LightSample {
                primitive: None,
                ..sample
            },
            None => LightSample {
                position: Vec3::ZERO,
                normal: Vec3::ZERO,
                emission: self.material.emission(),
                primitive: None,
                pdf: 0.0,
            },
        }
    }

    fn material(&self) -> &Material {
        &self.material
    }
}
