//! Luma renderer - CPU Monte Carlo path tracing
//!
//! A BVH-accelerated path tracer with next-event estimation and Russian
//! roulette termination. Scenes are built from [`Primitive`]s sharing
//! [`Material`]s; the [`Renderer`] averages independent passes, each run on a
//! rayon worker with its own seeded generator.
//!
//! ```no_run
//! use std::sync::Arc;
//! use luma_renderer::{Color, Material, Renderer, Scene, Sphere, Vec3};
//!
//! let mut scene = Scene::new(64, 64);
//! let light = Arc::new(Material::emissive(Color::ONE, Color::splat(8.0)));
//! scene.add(Sphere::new(Vec3::new(278.0, 400.0, 0.0), 50.0, light));
//! scene.build_bvh()?;
//!
//! let image = Renderer::new().render(&scene, true, false)?;
//! image.save("out.ppm")?;
//! # Ok::<(), luma_renderer::RenderError>(())
//! ```

mod bvh;
mod camera;
mod config;
mod error;
mod integrator;
pub mod material;
mod mesh;
mod primitive;
mod progress;
mod renderer;
mod scene;
mod sphere;
mod triangle;

pub use bvh::{Bvh, BvhNode, SplitMethod};
pub use camera::Camera;
pub use config::RenderConfig;
pub use error::{MaterialError, MaterialResult, RenderError, RenderResult};
pub use integrator::{spawn_ray, PathIntegrator};
pub use material::{DistributionKind, Fresnel, Material, MaterialKind, MicrofacetDistribution};
pub use mesh::Mesh;
pub use primitive::{Intersection, LightSample, Primitive, PrimitiveId, RAY_EPSILON};
pub use progress::ProgressBoard;
pub use renderer::{color_to_rgb8, encode_channel, ImageBuffer, Renderer};
pub use scene::Scene;
pub use sphere::Sphere;
pub use triangle::Triangle;

/// Re-export Vec3 and common math types from luma_math
pub use luma_math::{Aabb, Interval, Ray, Vec2, Vec3};

use rand::{Rng, RngCore};

/// Linear RGB radiance.
pub type Color = Vec3;

/// Uniform sample in `[0, 1)`.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gen_f32_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let x = gen_f32(&mut rng);
            assert!((0.0..1.0).contains(&x));
        }
    }
}
