//! Monte Carlo path tracing.
//!
//! Radiance along a camera ray is estimated with next-event estimation at
//! every vertex plus one recursively traced indirect bounce. Paths end only
//! through Russian roulette; there is no depth limit, so the estimator stays
//! unbiased.
//!
//! Emitters reached by an indirect bounce contribute nothing there, since
//! their light is already accounted for by the direct term at the previous
//! vertex.

use luma_math::{Ray, Vec3};
use rand::RngCore;

use crate::{gen_f32, Color, Intersection, MaterialResult, Scene, RAY_EPSILON};

/// Relative tolerance on the shadow-ray distance to a sampled light point.
const SHADOW_TOLERANCE: f32 = 1e-3;

/// Unidirectional path tracer with next-event estimation.
#[derive(Debug, Clone, Copy)]
pub struct PathIntegrator {
    russian_roulette: f32,
}

impl PathIntegrator {
    /// `russian_roulette` is the probability that a path continues. It must
    /// be below 1 for paths to terminate.
    pub fn new(russian_roulette: f32) -> Self {
        Self { russian_roulette }
    }

    pub fn for_scene(scene: &Scene) -> Self {
        Self::new(scene.russian_roulette)
    }

    pub fn russian_roulette(&self) -> f32 {
        self.russian_roulette
    }

    /// Estimate the radiance arriving at the origin of `ray`.
    ///
    /// Misses return zero; the scene background is not composited.
    pub fn radiance(
        &self,
        scene: &Scene,
        ray: &Ray,
        rng: &mut dyn RngCore,
    ) -> MaterialResult<Color> {
        let hit = scene.intersect(ray);
        if !hit.happened {
            return Ok(Color::ZERO);
        }
        Ok(hit.emission + self.shade(scene, &hit, -ray.direction(), 0, rng)?)
    }

    /// Light reflected at `hit` toward `wo`, excluding its own emission.
    fn shade(
        &self,
        scene: &Scene,
        hit: &Intersection<'_>,
        wo: Vec3,
        depth: u32,
        rng: &mut dyn RngCore,
    ) -> MaterialResult<Color> {
        let Some(material) = hit.material else {
            return Ok(Color::ZERO);
        };
        let n = hit.normal;

        let direct = self.estimate_direct(scene, hit, wo, rng)?;

        if gen_f32(rng) >= self.russian_roulette {
            return Ok(direct);
        }

        let wi = material.sample(wo, n, rng)?;
        if wi == Vec3::ZERO {
            return Ok(direct);
        }
        let pdf = material.pdf(wo, wi, n)?;
        if !(pdf > 0.0) {
            return Ok(direct);
        }

        let next = scene.intersect(&spawn_ray(hit.position, n, wi));
        if !next.happened || next.emission.cmpgt(Color::ZERO).any() {
            return Ok(direct);
        }

        log::trace!("path continues at depth {}", depth + 1);
        let incoming = self.shade(scene, &next, -wi, depth + 1, rng)?;
        let f = material.eval(wo, wi, n)?;
        let indirect = incoming * f * wi.dot(n).abs() / (pdf * self.russian_roulette);

        Ok(direct + indirect)
    }

    /// Direct light at `hit` from one point sampled on the scene's emitters.
    ///
    /// Zero when nothing emits, the sample has no usable density, or the
    /// sampled point is occluded.
    pub fn estimate_direct(
        &self,
        scene: &Scene,
        hit: &Intersection<'_>,
        wo: Vec3,
        rng: &mut dyn RngCore,
    ) -> MaterialResult<Color> {
        let Some(material) = hit.material else {
            return Ok(Color::ZERO);
        };
        let Some(light) = scene.sample_light(rng) else {
            return Ok(Color::ZERO);
        };
        if !(light.pdf.is_finite() && light.pdf > 0.0) {
            return Ok(Color::ZERO);
        }

        let n = hit.normal;
        let to_light = light.position - hit.position;
        let distance2 = to_light.length_squared();
        if !(distance2 > 0.0) {
            return Ok(Color::ZERO);
        }
        let wi = to_light / distance2.sqrt();

        let cos_surface = wi.dot(n).abs();
        let cos_light = light.normal.dot(-wi).abs();
        if cos_surface <= 0.0 || cos_light <= 0.0 {
            return Ok(Color::ZERO);
        }

        let shadow_ray = spawn_ray(hit.position, n, wi);
        let expected = (light.position - shadow_ray.origin()).length();
        let blocker = scene.intersect(&shadow_ray);
        let visible = blocker.happened
            && blocker.primitive == light.primitive
            && (blocker.distance - expected).abs() <= SHADOW_TOLERANCE * expected;
        if !visible {
            return Ok(Color::ZERO);
        }

        let f = material.eval(wo, wi, n)?;
        Ok(light.emission * f * cos_surface * cos_light / (distance2 * light.pdf))
    }
}

/// Ray leaving `p` along `dir`, nudged off the surface with normal `n` to the
/// side `dir` points to.
pub fn spawn_ray(p: Vec3, n: Vec3, dir: Vec3) -> Ray {
    let offset = n * (RAY_EPSILON * (1.0 + p.abs().max_element()));
    let origin = if dir.dot(n) >= 0.0 { p + offset } else { p - offset };
    Ray::new(origin, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Material, MaterialKind, Mesh, Sphere, Triangle};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f32::consts::FRAC_1_PI;
    use std::sync::Arc;

    /// Unit emitting square at height 1 facing a diffuse floor of albedo 0.5.
    fn lit_floor() -> Scene {
        let mut scene = Scene::new(8, 8);
        let floor = Arc::new(Material::diffuse(Color::splat(0.5)));
        let light = Arc::new(Material::emissive(Color::ZERO, Color::ONE));

        scene.add(Mesh::quad(
            Vec3::new(-2.0, 0.0, -2.0),
            Vec3::new(-2.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, -2.0),
            floor,
        ));
        scene.add(Mesh::quad(
            Vec3::new(-0.5, 1.0, -0.5),
            Vec3::new(0.5, 1.0, -0.5),
            Vec3::new(0.5, 1.0, 0.5),
            Vec3::new(-0.5, 1.0, 0.5),
            light,
        ));
        scene.build_bvh().unwrap();
        scene
    }

    fn probe() -> Ray {
        Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y)
    }

    #[test]
    fn test_spawn_ray_leaves_surface() {
        let p = Vec3::new(1.0, 0.0, 0.0);
        let up = spawn_ray(p, Vec3::Y, Vec3::new(0.0, 1.0, 1.0));
        assert!(up.origin().y > 0.0);
        let down = spawn_ray(p, Vec3::Y, Vec3::new(0.0, -1.0, 1.0));
        assert!(down.origin().y < 0.0);
        assert!((up.direction().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_direct_light_matches_closed_form() {
        let scene = lit_floor();
        let integrator = PathIntegrator::for_scene(&scene);
        let ray = probe();
        let hit = scene.intersect(&ray);
        assert!(hit.happened);

        let mut rng = StdRng::seed_from_u64(42);
        let direct = integrator
            .estimate_direct(&scene, &hit, -ray.direction(), &mut rng)
            .unwrap();

        // Replay the same light sample
        let mut replay = StdRng::seed_from_u64(42);
        let light = scene.sample_light(&mut replay).unwrap();
        let to_light = light.position - hit.position;
        let d2 = to_light.length_squared();
        let wi = to_light / d2.sqrt();
        let cos_surface = wi.dot(hit.normal).abs();
        let cos_light = light.normal.dot(-wi).abs();
        let expected = 0.5 * FRAC_1_PI * cos_surface * cos_light / (d2 * light.pdf);

        assert!((light.pdf - 1.0).abs() < 1e-5);
        for c in direct.to_array() {
            assert!((c - expected).abs() < 1e-6, "{} vs {}", c, expected);
        }

        // Same seed, same bits
        let mut again = StdRng::seed_from_u64(42);
        let repeat = integrator
            .estimate_direct(&scene, &hit, -ray.direction(), &mut again)
            .unwrap();
        assert_eq!(direct, repeat);
    }

    #[test]
    fn test_radiance_converges_to_direct_integral() {
        let scene = lit_floor();
        let integrator = PathIntegrator::for_scene(&scene);
        let ray = probe();
        let mut rng = StdRng::seed_from_u64(42);

        // Irradiance below the center of a unit square light at height 1,
        // summed over its four quarters
        let a = 0.5f64 / 1.25f64.sqrt();
        let irradiance = 4.0 * a * a.atan();
        let expected = (0.5 / std::f64::consts::PI * irradiance) as f32;

        let mut errors = Vec::new();
        for samples in [1_000u32, 40_000] {
            let mut sum = 0.0f64;
            for _ in 0..samples {
                sum += integrator.radiance(&scene, &ray, &mut rng).unwrap().x as f64;
            }
            let mean = (sum / samples as f64) as f32;
            errors.push((mean - expected).abs());
        }

        assert!((expected - 0.1197).abs() < 1e-3);
        assert!(errors[1] < 1.5e-3, "error {} at 40k samples", errors[1]);
        assert!(errors[0] < 8e-3, "error {} at 1k samples", errors[0]);
    }

    /// Irradiance from a uniform unit-radiance polygon at `p` with normal `n`
    /// (Lambert's contour integral).
    fn polygon_irradiance(p: Vec3, n: Vec3, vertices: &[Vec3]) -> f64 {
        let mut sum = 0.0f64;
        for (i, &a) in vertices.iter().enumerate() {
            let b = vertices[(i + 1) % vertices.len()];
            let ua = (a - p).as_dvec3().normalize();
            let ub = (b - p).as_dvec3().normalize();
            let angle = ua.dot(ub).clamp(-1.0, 1.0).acos();
            sum += angle * n.as_dvec3().dot(ua.cross(ub).normalize());
        }
        0.5 * sum.abs()
    }

    #[test]
    fn test_sphere_under_triangle_light_converges() {
        let mut scene = Scene::new(8, 8);
        let grey = Arc::new(Material::diffuse(Color::splat(0.5)));
        let light = Arc::new(Material::emissive(Color::ZERO, Color::ONE));
        let corners = [
            Vec3::new(-1.0, 2.0, -1.0),
            Vec3::new(1.0, 2.0, -1.0),
            Vec3::new(0.0, 2.0, 1.0),
        ];
        scene.add(Sphere::new(Vec3::ZERO, 1.0, grey));
        scene.add(Triangle::new(corners[0], corners[1], corners[2], light));
        scene.build_bvh().unwrap();

        let integrator = PathIntegrator::for_scene(&scene);
        let ray = Ray::new(Vec3::new(0.0, 1.5, 0.0), -Vec3::Y);
        let hit = scene.intersect(&ray);
        assert!((hit.position - Vec3::Y).length() < 1e-4);

        let irradiance = polygon_irradiance(Vec3::Y, Vec3::Y, &corners);
        let expected = 0.5 / std::f64::consts::PI * irradiance;
        assert!((expected - 0.1713).abs() < 1e-3);

        let mut rng = StdRng::seed_from_u64(42);
        let mut errors = Vec::new();
        for samples in [1_000u32, 40_000] {
            let mut sum = 0.0f64;
            for _ in 0..samples {
                sum += integrator.radiance(&scene, &ray, &mut rng).unwrap().x as f64;
            }
            let mean = sum / samples as f64;
            errors.push((mean - expected).abs() / expected);
        }

        assert!(errors[1] < 0.015, "relative error {} at 40k samples", errors[1]);
        assert!(errors[0] < 0.08, "relative error {} at 1k samples", errors[0]);
    }

    #[test]
    fn test_emitter_seen_directly_adds_emission() {
        let scene = lit_floor();
        let integrator = PathIntegrator::for_scene(&scene);
        let mut rng = StdRng::seed_from_u64(42);

        // Looking up at the light from below
        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), Vec3::Y);
        let value = integrator.radiance(&scene, &ray, &mut rng).unwrap();
        // Black albedo, so nothing is reflected on top
        assert_eq!(value, Color::ONE);
    }

    #[test]
    fn test_occluded_light_gives_no_direct_term() {
        let mut scene = Scene::new(8, 8);
        let grey = Arc::new(Material::diffuse(Color::splat(0.5)));
        let light = Arc::new(Material::emissive(Color::ZERO, Color::ONE));
        scene.add(Mesh::quad(
            Vec3::new(-2.0, 0.0, -2.0),
            Vec3::new(-2.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, -2.0),
            grey.clone(),
        ));
        // Blocker between floor and light
        scene.add(Sphere::new(Vec3::new(0.0, 0.6, 0.0), 0.1, grey));
        scene.add(Sphere::new(Vec3::new(0.0, 5.0, 0.0), 1e-3, light));
        scene.build_bvh().unwrap();

        let integrator = PathIntegrator::for_scene(&scene);
        let ray = Ray::new(Vec3::new(0.3, 0.3, 0.0), Vec3::new(-0.3, -0.3, 0.0));
        let hit = scene.intersect(&ray);
        assert!((hit.position - Vec3::ZERO).length() < 1e-4);

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let direct = integrator
                .estimate_direct(&scene, &hit, -ray.direction(), &mut rng)
                .unwrap();
            assert_eq!(direct, Color::ZERO);
        }
    }

    #[test]
    fn test_far_side_of_emitter_is_not_visible() {
        let mut scene = Scene::new(8, 8);
        let grey = Arc::new(Material::diffuse(Color::splat(0.5)));
        let light = Arc::new(Material::emissive(Color::ZERO, Color::ONE));
        scene.add(Sphere::new(Vec3::new(0.0, -100.0, 0.0), 99.0, grey));
        scene.add(Sphere::new(Vec3::new(0.0, 3.0, 0.0), 1.0, light));
        scene.build_bvh().unwrap();

        let integrator = PathIntegrator::for_scene(&scene);
        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y);
        let hit = scene.intersect(&ray);
        assert!(hit.happened);

        let mut rng = StdRng::seed_from_u64(42);
        let mut lit = 0;
        for _ in 0..2000 {
            let direct = integrator
                .estimate_direct(&scene, &hit, -ray.direction(), &mut rng)
                .unwrap();
            if direct.x > 0.0 {
                lit += 1;
            }
        }
        // The cap seen from the floor point covers (1 - r/d) / 2 of the sphere
        let fraction = lit as f32 / 2000.0;
        assert!(fraction > 0.25 && fraction < 0.42, "lit fraction {}", fraction);
    }

    #[test]
    fn test_no_lights_gives_black() {
        let mut scene = Scene::new(8, 8);
        scene.add(Sphere::new(Vec3::ZERO, 1.0, Arc::new(Material::diffuse(Color::ONE))));
        scene.build_bvh().unwrap();

        let integrator = PathIntegrator::for_scene(&scene);
        let mut rng = StdRng::seed_from_u64(42);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        for _ in 0..100 {
            let value = integrator.radiance(&scene, &ray, &mut rng).unwrap();
            assert_eq!(value, Color::ZERO);
        }
    }

    #[test]
    fn test_material_error_propagates() {
        let scene = lit_floor();
        let bad = Material::new(MaterialKind::MicrofacetSpecular);
        let hit = Intersection::hit(1.0, Vec3::new(0.0, 0.5, 0.0), Vec3::Y, &bad);

        // The light is in plain view, so the direct term evaluates the material
        let integrator = PathIntegrator::for_scene(&scene);
        let mut rng = StdRng::seed_from_u64(42);
        let result = integrator.shade(&scene, &hit, Vec3::Y, 0, &mut rng);
        assert!(result.is_err());
    }
}
