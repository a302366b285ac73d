//! Surface scattering models.
//!
//! A [`Material`] is a closed set of reflection models selected by
//! [`MaterialKind`]. Each model answers three questions for a surface point
//! with outward normal `n`:
//!
//! - [`Material::sample`]: draw an incident direction `wi` given `wo`
//! - [`Material::pdf`]: solid-angle density of having drawn `wi`
//! - [`Material::eval`]: the BSDF value for the pair `(wo, wi)`
//!
//! Both `wo` and `wi` point away from the surface. `n` is the geometric
//! normal on the outside of the object; whether a direction is inside or
//! outside is decided by its sign against `n`.
//!
//! Ideal specular models are evaluated as narrow lobes: a direction counts as
//! the deterministic one when it lies within [`DIRECTION_EPSILON`] of it, and
//! their `eval` divides by `|cos(wi)|` so that `eval * |cos| / pdf` is the
//! throughput of the chosen branch.

mod fresnel;
mod microfacet;

use std::f32::consts::{FRAC_1_PI, PI};

use luma_math::{Vec2, Vec3};
use rand::RngCore;

use crate::{gen_f32, Color, MaterialError, MaterialResult};

pub use fresnel::{fr_conductor, fr_dielectric, Fresnel};
pub use microfacet::{DistributionKind, MicrofacetDistribution};

use microfacet::{abs_cos_theta, cos_theta, same_hemisphere};

/// Tolerance on `1 - dot(a, b)` when matching deterministic directions, and
/// the smallest usable `|cos(wo)|` for microfacet sampling.
pub const DIRECTION_EPSILON: f32 = 1e-2;

/// Reflection model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Lambertian reflection with uniform hemisphere sampling
    Diffuse,
    /// Perfect mirror scaled by the reflectance
    Specular,
    /// Lossless glass choosing reflection or refraction by dielectric Fresnel
    Dielectric,
    /// Mirror weighted by the material's Fresnel term
    FresnelReflection,
    /// Refraction weighted by one minus the Fresnel term
    FresnelTransmission,
    /// Fresnel-weighted stochastic choice of reflection or refraction
    FresnelSpecular,
    /// Torrance-Sparrow rough reflection
    MicrofacetReflection,
    /// Rough refraction (Walter et al.)
    MicrofacetTransmission,
    /// Fresnel-weighted choice of rough reflection or rough refraction
    MicrofacetSpecular,
}

impl MaterialKind {
    /// True for kinds that need a [`MicrofacetDistribution`].
    pub fn is_microfacet(self) -> bool {
        matches!(
            self,
            MaterialKind::MicrofacetReflection
                | MaterialKind::MicrofacetTransmission
                | MaterialKind::MicrofacetSpecular
        )
    }
}

/// Surface description shared by every primitive that uses it.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    /// Emitted radiance, zero for non-emitters
    pub emission: Color,
    /// Diffuse albedo
    pub albedo: Color,
    /// Index of refraction per channel; channel 0 drives refraction
    pub ior: Color,
    /// Scale on reflected light
    pub reflectance: Color,
    /// Scale on transmitted light
    pub transmittance: Color,
    pub fresnel: Fresnel,
    pub distribution: Option<MicrofacetDistribution>,
}

impl Material {
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            kind,
            emission: Color::ZERO,
            albedo: Color::ONE,
            ior: Color::splat(1.5),
            reflectance: Color::ONE,
            transmittance: Color::ONE,
            fresnel: Fresnel::NoOp,
            distribution: None,
        }
    }

    /// Lambertian surface.
    pub fn diffuse(albedo: Color) -> Self {
        Self::new(MaterialKind::Diffuse).with_albedo(albedo)
    }

    /// Lambertian area light.
    pub fn emissive(albedo: Color, emission: Color) -> Self {
        Self::diffuse(albedo).with_emission(emission)
    }

    pub fn with_albedo(mut self, albedo: Color) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_emission(mut self, emission: Color) -> Self {
        self.emission = emission;
        self
    }

    pub fn with_ior(mut self, ior: Color) -> Self {
        self.ior = ior;
        self
    }

    pub fn with_reflectance(mut self, reflectance: Color) -> Self {
        self.reflectance = reflectance;
        self
    }

    pub fn with_transmittance(mut self, transmittance: Color) -> Self {
        self.transmittance = transmittance;
        self
    }

    pub fn with_fresnel(mut self, fresnel: Fresnel) -> Self {
        self.fresnel = fresnel;
        self
    }

    pub fn with_distribution(mut self, distribution: MicrofacetDistribution) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn emission(&self) -> Color {
        self.emission
    }

    pub fn has_emission(&self) -> bool {
        self.emission.cmpgt(Color::ZERO).any()
    }

    /// Fail if the material cannot be evaluated.
    pub fn validate(&self) -> MaterialResult<()> {
        self.microfacet().map(|_| ())
    }

    /// The distribution, required for microfacet kinds.
    fn microfacet(&self) -> MaterialResult<Option<&MicrofacetDistribution>> {
        match (self.kind.is_microfacet(), self.distribution.as_ref()) {
            (true, None) => Err(MaterialError::MissingDistribution { kind: self.kind }),
            (true, dist) => Ok(dist),
            (false, _) => Ok(None),
        }
    }

    fn eta(&self) -> f32 {
        self.ior.x
    }

    /// Draw an incident direction for light leaving along `wo`.
    ///
    /// Returns the zero vector when no direction can be produced (degenerate
    /// `wo`, total internal reflection, a sampled facet facing away).
    pub fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> MaterialResult<Vec3> {
        let dist = self.microfacet()?;
        if wo == Vec3::ZERO {
            return Ok(Vec3::ZERO);
        }

        let wi = match self.kind {
            MaterialKind::Diffuse => {
                let z = (1.0 - 2.0 * gen_f32(rng)).abs();
                let r = (1.0 - z * z).max(0.0).sqrt();
                let phi = 2.0 * PI * gen_f32(rng);
                let z = if wo.dot(n) > 0.0 { z } else { -z };
                Frame::new(n).to_world(Vec3::new(r * phi.cos(), r * phi.sin(), z))
            }
            MaterialKind::Specular | MaterialKind::FresnelReflection => reflect(wo, n),
            MaterialKind::FresnelTransmission => refract(wo, n, self.eta()),
            MaterialKind::Dielectric => {
                if gen_f32(rng) <= fr_dielectric(wo.dot(n), self.eta()) {
                    reflect(wo, n)
                } else {
                    refract(wo, n, self.eta())
                }
            }
            MaterialKind::FresnelSpecular => {
                let refracted = refract(wo, n, self.eta());
                if gen_f32(rng) < self.reflect_probability(wo.dot(n), refracted) {
                    reflect(wo, n)
                } else {
                    refracted
                }
            }
            MaterialKind::MicrofacetReflection
            | MaterialKind::MicrofacetTransmission
            | MaterialKind::MicrofacetSpecular => match dist {
                Some(dist) => self.sample_microfacet(dist, wo, n, rng),
                None => Vec3::ZERO,
            },
        };
        Ok(wi)
    }

    fn sample_microfacet(
        &self,
        dist: &MicrofacetDistribution,
        wo: Vec3,
        n: Vec3,
        rng: &mut dyn RngCore,
    ) -> Vec3 {
        let frame = Frame::new(n);
        let wo = frame.to_local(wo);
        if abs_cos_theta(wo) < DIRECTION_EPSILON {
            return Vec3::ZERO;
        }

        let u = Vec2::new(gen_f32(rng), gen_f32(rng));
        let wh = dist.sample_wh(wo, u);
        if wo.dot(wh) < DIRECTION_EPSILON {
            return Vec3::ZERO;
        }

        let reflection = match self.kind {
            MaterialKind::MicrofacetReflection => true,
            MaterialKind::MicrofacetTransmission => false,
            _ => gen_f32(rng) < self.facet_fresnel(wo, wh),
        };

        let wi = if reflection {
            let wi = reflect(wo, wh);
            if !same_hemisphere(wo, wi) {
                return Vec3::ZERO;
            }
            wi
        } else {
            let eta = if cos_theta(wo) > 0.0 {
                1.0 / self.eta()
            } else {
                self.eta()
            };
            match refract_toward(wo, wh, eta) {
                Some(wi) if !same_hemisphere(wo, wi) && wi.z != 0.0 => wi,
                _ => return Vec3::ZERO,
            }
        };
        frame.to_world(wi)
    }

    /// Density of [`Self::sample`] returning `wi`.
    pub fn pdf(&self, wo: Vec3, wi: Vec3, n: Vec3) -> MaterialResult<f32> {
        let dist = self.microfacet()?;
        if wo == Vec3::ZERO || wi == Vec3::ZERO {
            return Ok(0.0);
        }

        let pdf = match self.kind {
            MaterialKind::Diffuse => {
                if wi.dot(n) * wo.dot(n) > 0.0 {
                    0.5 * FRAC_1_PI
                } else {
                    0.0
                }
            }
            MaterialKind::Specular | MaterialKind::FresnelReflection => {
                if matches_direction(reflect(wo, n), wi) {
                    1.0
                } else {
                    0.0
                }
            }
            MaterialKind::FresnelTransmission => {
                if matches_direction(refract(wo, n, self.eta()), wi) {
                    1.0
                } else {
                    0.0
                }
            }
            MaterialKind::Dielectric => {
                let f = fr_dielectric(wo.dot(n), self.eta());
                if matches_direction(reflect(wo, n), wi) {
                    f
                } else if matches_direction(refract(wo, n, self.eta()), wi) {
                    (1.0 - f).max(0.0)
                } else {
                    0.0
                }
            }
            MaterialKind::FresnelSpecular => {
                let refracted = refract(wo, n, self.eta());
                let f = self.reflect_probability(wo.dot(n), refracted);
                if matches_direction(reflect(wo, n), wi) {
                    f
                } else if matches_direction(refracted, wi) {
                    1.0 - f
                } else {
                    0.0
                }
            }
            MaterialKind::MicrofacetReflection
            | MaterialKind::MicrofacetTransmission
            | MaterialKind::MicrofacetSpecular => match dist {
                Some(dist) => {
                    let frame = Frame::new(n);
                    self.pdf_microfacet(dist, frame.to_local(wo), frame.to_local(wi))
                }
                None => 0.0,
            },
        };
        Ok(pdf)
    }

    fn pdf_microfacet(&self, dist: &MicrofacetDistribution, wo: Vec3, wi: Vec3) -> f32 {
        let specular = self.kind == MaterialKind::MicrofacetSpecular;

        if same_hemisphere(wo, wi) {
            if self.kind == MaterialKind::MicrofacetTransmission {
                return 0.0;
            }
            let wh = (wo + wi).normalize_or_zero();
            let cos_oh = wo.dot(wh).abs();
            if cos_oh == 0.0 {
                return 0.0;
            }
            let pdf = dist.pdf(wo, wh) / (4.0 * cos_oh);
            if specular {
                pdf * self.facet_fresnel(wo, wh)
            } else {
                pdf
            }
        } else {
            if self.kind == MaterialKind::MicrofacetReflection {
                return 0.0;
            }
            let Some(wh) = self.transmission_half_vector(wo, wi) else {
                return 0.0;
            };
            let eta = self.transmission_eta(wo);
            let denom = wo.dot(wh) + eta * wi.dot(wh);
            if denom == 0.0 {
                return 0.0;
            }
            let dwh_dwi = (eta * eta * wi.dot(wh) / (denom * denom)).abs();
            let pdf = dist.pdf(wo, wh) * dwh_dwi;
            if specular {
                pdf * (1.0 - self.facet_fresnel(wo, wh))
            } else {
                pdf
            }
        }
    }

    /// BSDF value for light arriving along `wi` and leaving along `wo`.
    pub fn eval(&self, wo: Vec3, wi: Vec3, n: Vec3) -> MaterialResult<Color> {
        let dist = self.microfacet()?;
        if wo == Vec3::ZERO || wi == Vec3::ZERO {
            return Ok(Color::ZERO);
        }

        let cos_i = wi.dot(n).abs();
        let value = match self.kind {
            MaterialKind::Diffuse => {
                if wi.dot(n) * wo.dot(n) > 0.0 {
                    self.albedo * FRAC_1_PI
                } else {
                    Color::ZERO
                }
            }
            _ if !self.kind.is_microfacet() && cos_i < f32::EPSILON => Color::ZERO,
            MaterialKind::Specular => {
                if matches_direction(reflect(wo, n), wi) {
                    self.reflectance / cos_i
                } else {
                    Color::ZERO
                }
            }
            MaterialKind::Dielectric => {
                let f = fr_dielectric(wo.dot(n), self.eta());
                if matches_direction(reflect(wo, n), wi) {
                    Color::splat(f / cos_i)
                } else if matches_direction(refract(wo, n, self.eta()), wi) {
                    Color::splat((1.0 - f).max(0.0) / cos_i)
                } else {
                    Color::ZERO
                }
            }
            MaterialKind::FresnelReflection => {
                if matches_direction(reflect(wo, n), wi) {
                    self.reflectance * self.fresnel.evaluate(wo.dot(n)) / cos_i
                } else {
                    Color::ZERO
                }
            }
            MaterialKind::FresnelTransmission => {
                if matches_direction(refract(wo, n, self.eta()), wi) {
                    self.transmitted(self.fresnel.evaluate(wo.dot(n))) / cos_i
                } else {
                    Color::ZERO
                }
            }
            MaterialKind::FresnelSpecular => {
                let refracted = refract(wo, n, self.eta());
                if matches_direction(reflect(wo, n), wi) {
                    let f = if refracted == Vec3::ZERO {
                        Color::ONE
                    } else {
                        self.fresnel.evaluate(wo.dot(n))
                    };
                    self.reflectance * f / cos_i
                } else if matches_direction(refracted, wi) {
                    self.transmitted(self.fresnel.evaluate(wo.dot(n))) / cos_i
                } else {
                    Color::ZERO
                }
            }
            MaterialKind::MicrofacetReflection
            | MaterialKind::MicrofacetTransmission
            | MaterialKind::MicrofacetSpecular => match dist {
                Some(dist) => {
                    let frame = Frame::new(n);
                    self.eval_microfacet(dist, frame.to_local(wo), frame.to_local(wi))
                }
                None => Color::ZERO,
            },
        };
        Ok(value)
    }

    fn eval_microfacet(&self, dist: &MicrofacetDistribution, wo: Vec3, wi: Vec3) -> Color {
        let cos_o = cos_theta(wo);
        let cos_i = cos_theta(wi);
        if cos_o == 0.0 || cos_i == 0.0 {
            return Color::ZERO;
        }

        if same_hemisphere(wo, wi) {
            if self.kind == MaterialKind::MicrofacetTransmission {
                return Color::ZERO;
            }
            let wh = wo + wi;
            if wh == Vec3::ZERO {
                return Color::ZERO;
            }
            let wh = wh.normalize();
            // Face the normal outward so total internal reflection is handled
            let f = self.fresnel.evaluate(wi.dot(face_forward(wh, Vec3::Z)));
            self.reflectance * dist.d(wh) * dist.g(wo, wi) * f / (4.0 * cos_i.abs() * cos_o.abs())
        } else {
            if self.kind == MaterialKind::MicrofacetReflection {
                return Color::ZERO;
            }
            let Some(wh) = self.transmission_half_vector(wo, wi) else {
                return Color::ZERO;
            };
            let eta = self.transmission_eta(wo);
            let denom = wo.dot(wh) + eta * wi.dot(wh);
            if denom == 0.0 {
                return Color::ZERO;
            }
            let f = self.fresnel.evaluate(wo.dot(wh));
            // Radiance is compressed by 1 / eta^2 entering a denser medium
            let factor = 1.0 / eta;

            let value = dist.d(wh)
                * dist.g(wo, wi)
                * eta
                * eta
                * wi.dot(wh).abs()
                * wo.dot(wh).abs()
                * factor
                * factor
                / (cos_i * cos_o * denom * denom);
            self.transmitted(f) * value.abs()
        }
    }

    /// Relative index used to form the transmission half vector.
    fn transmission_eta(&self, wo: Vec3) -> f32 {
        if cos_theta(wo) > 0.0 {
            self.eta()
        } else {
            1.0 / self.eta()
        }
    }

    /// Generalized half vector for a refraction pair, oriented to `+Z`.
    /// `None` when the pair cannot come from a single facet.
    fn transmission_half_vector(&self, wo: Vec3, wi: Vec3) -> Option<Vec3> {
        let wh = (wo + wi * self.transmission_eta(wo)).normalize_or_zero();
        if wh == Vec3::ZERO {
            return None;
        }
        let wh = face_forward(wh, Vec3::Z);
        if wo.dot(wh) * wi.dot(wh) > 0.0 {
            return None;
        }
        Some(wh)
    }

    /// Probability of picking the reflected branch on a smooth interface.
    fn reflect_probability(&self, cos_o: f32, refracted: Vec3) -> f32 {
        if refracted == Vec3::ZERO {
            1.0
        } else {
            self.fresnel.evaluate(cos_o).x.clamp(0.0, 1.0)
        }
    }

    /// Reflectance of the facet `wh` seen from `wo`, used to split rough
    /// reflection from rough refraction.
    fn facet_fresnel(&self, wo: Vec3, wh: Vec3) -> f32 {
        self.fresnel
            .evaluate(wo.dot(face_forward(wh, Vec3::Z)))
            .x
            .clamp(0.0, 1.0)
    }

    fn transmitted(&self, fresnel: Color) -> Color {
        self.transmittance * (Color::ONE - fresnel).max(Color::ZERO)
    }
}

/// Orthonormal shading basis around a unit normal.
#[derive(Debug, Clone, Copy)]
struct Frame {
    s: Vec3,
    t: Vec3,
    n: Vec3,
}

impl Frame {
    fn new(n: Vec3) -> Self {
        let (s, t) = n.any_orthonormal_pair();
        Self { s, t, n }
    }

    fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }
}

/// Mirror `wo` about `n`. Both point away from the surface.
#[inline]
pub fn reflect(wo: Vec3, n: Vec3) -> Vec3 {
    2.0 * wo.dot(n) * n - wo
}

/// Refract `wo` through a surface with outward normal `n` and relative index
/// `eta` (inside over outside). Returns zero under total internal reflection.
pub fn refract(wo: Vec3, n: Vec3, eta: f32) -> Vec3 {
    let (n, eta) = if wo.dot(n) > 0.0 {
        (n, 1.0 / eta)
    } else {
        (-n, eta)
    };
    refract_toward(wo, n, eta).unwrap_or(Vec3::ZERO)
}

/// Refract `wo` about `n`, which lies on the same side as `wo`; `eta` is the
/// ratio of the index on `wo`'s side to the index on the far side.
fn refract_toward(wo: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = wo.dot(n).clamp(-1.0, 1.0);
    let sin2_i = (1.0 - cos_i * cos_i).max(0.0);
    let sin2_t = eta * eta * sin2_i;
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(-eta * wo + (eta * cos_i - cos_t) * n)
}

#[inline]
fn face_forward(v: Vec3, reference: Vec3) -> Vec3 {
    if v.dot(reference) < 0.0 {
        -v
    } else {
        v
    }
}

#[inline]
fn matches_direction(expected: Vec3, wi: Vec3) -> bool {
    expected != Vec3::ZERO && expected.dot(wi) > 1.0 - DIRECTION_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn glass(kind: MaterialKind) -> Material {
        Material::new(kind)
            .with_ior(Color::splat(1.5))
            .with_fresnel(Fresnel::Dielectric { eta: 1.5 })
    }

    fn rough(kind: MaterialKind, dist: MicrofacetDistribution) -> Material {
        glass(kind).with_distribution(dist)
    }

    fn every_material() -> Vec<Material> {
        let tr = MicrofacetDistribution::trowbridge_reitz(0.3, 0.3);
        let beckmann = MicrofacetDistribution::beckmann(0.4, 0.2).with_visible_area(false);
        vec![
            Material::diffuse(Color::splat(0.5)),
            Material::new(MaterialKind::Specular),
            glass(MaterialKind::Dielectric),
            Material::new(MaterialKind::FresnelReflection).with_fresnel(Fresnel::Conductor {
                eta: Color::new(0.2, 0.9, 1.1),
                k: Color::new(3.9, 2.4, 2.2),
            }),
            glass(MaterialKind::FresnelTransmission),
            glass(MaterialKind::FresnelSpecular),
            rough(MaterialKind::MicrofacetReflection, tr),
            rough(MaterialKind::MicrofacetTransmission, tr),
            rough(MaterialKind::MicrofacetSpecular, tr),
            rough(MaterialKind::MicrofacetReflection, beckmann),
            rough(MaterialKind::MicrofacetSpecular, beckmann),
        ]
    }

    #[test]
    fn test_reflect_preserves_angle() {
        let n = Vec3::Y;
        let wo = Vec3::new(1.0, 1.0, 0.0).normalize();
        let wi = reflect(wo, n);
        assert!((wi - Vec3::new(-1.0, 1.0, 0.0).normalize()).length() < 1e-6);
    }

    #[test]
    fn test_refract_obeys_snell() {
        let n = Vec3::Y;
        let theta_o = 30f32.to_radians();
        let wo = Vec3::new(theta_o.sin(), theta_o.cos(), 0.0);
        let wi = refract(wo, n, 1.5);

        assert!(wi.y < 0.0);
        assert!((wi.length() - 1.0).abs() < 1e-5);
        // sin(theta_t) = sin(theta_o) / 1.5 on the opposite side
        assert!((-wi.x - theta_o.sin() / 1.5).abs() < 1e-5);

        // Reversing the path comes back out
        let back = refract(wi, n, 1.5);
        assert!((back - wo).length() < 1e-4);
    }

    #[test]
    fn test_refract_total_internal_reflection() {
        let n = Vec3::Y;
        let theta = 60f32.to_radians();
        let wo_inside = Vec3::new(theta.sin(), -theta.cos(), 0.0);
        assert_eq!(refract(wo_inside, n, 1.5), Vec3::ZERO);
    }

    #[test]
    fn test_diffuse_eval_and_pdf() {
        let material = Material::diffuse(Color::new(0.5, 0.25, 1.0));
        let n = Vec3::Z;
        let wo = Vec3::new(0.0, 0.6, 0.8);
        let wi = Vec3::new(0.6, 0.0, 0.8);

        let value = material.eval(wo, wi, n).unwrap();
        assert!((value - Color::new(0.5, 0.25, 1.0) / PI).length() < 1e-6);
        assert!((material.pdf(wo, wi, n).unwrap() - 0.5 / PI).abs() < 1e-6);
        // Opposite hemisphere
        assert_eq!(material.eval(wo, -wi, n).unwrap(), Color::ZERO);
        assert_eq!(material.pdf(wo, -wi, n).unwrap(), 0.0);
    }

    #[test]
    fn test_diffuse_samples_wo_hemisphere() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = Material::diffuse(Color::ONE);
        let n = Vec3::new(1.0, 2.0, -0.5).normalize();

        for wo in [n, -n] {
            for _ in 0..500 {
                let wi = material.sample(wo, n, &mut rng).unwrap();
                assert!((wi.length() - 1.0).abs() < 1e-4);
                assert!(wi.dot(n) * wo.dot(n) >= 0.0);
            }
        }
    }

    #[test]
    fn test_degenerate_wo_gives_zero() {
        let mut rng = StdRng::seed_from_u64(42);
        for material in every_material() {
            let n = Vec3::Z;
            assert_eq!(material.sample(Vec3::ZERO, n, &mut rng).unwrap(), Vec3::ZERO);
            assert_eq!(material.pdf(Vec3::ZERO, n, n).unwrap(), 0.0);
            assert_eq!(material.eval(Vec3::ZERO, n, n).unwrap(), Color::ZERO);
        }
    }

    #[test]
    fn test_microfacet_without_distribution_is_an_error() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = Material::new(MaterialKind::MicrofacetSpecular);
        let expected = MaterialError::MissingDistribution {
            kind: MaterialKind::MicrofacetSpecular,
        };

        assert_eq!(material.validate(), Err(expected.clone()));
        assert_eq!(material.sample(Vec3::Z, Vec3::Z, &mut rng), Err(expected.clone()));
        assert_eq!(material.pdf(Vec3::Z, Vec3::Z, Vec3::Z), Err(expected.clone()));
        assert_eq!(material.eval(Vec3::Z, Vec3::Z, Vec3::Z), Err(expected));
        assert!(Material::diffuse(Color::ONE).validate().is_ok());
    }

    #[test]
    fn test_sampled_directions_have_positive_density() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = Vec3::new(0.2, 1.0, 0.1).normalize();
        let wo_out = Vec3::new(0.4, 0.8, -0.3).normalize();
        assert!(wo_out.dot(n) > 0.0);

        for material in every_material() {
            for wo in [wo_out, -wo_out] {
                let mut produced = 0;
                for _ in 0..400 {
                    let wi = material.sample(wo, n, &mut rng).unwrap();
                    if wi == Vec3::ZERO {
                        continue;
                    }
                    produced += 1;
                    let pdf = material.pdf(wo, wi, n).unwrap();
                    assert!(pdf > 0.0, "{:?}: wo={:?} wi={:?}", material.kind, wo, wi);
                }
                assert!(produced > 0, "{:?} never produced a direction", material.kind);
            }
        }
    }

    #[test]
    fn test_specular_throughput_is_reflectance() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = Material::new(MaterialKind::Specular).with_reflectance(Color::splat(0.9));
        let n = Vec3::Z;
        let wo = Vec3::new(0.3, 0.0, 0.9).normalize();

        let wi = material.sample(wo, n, &mut rng).unwrap();
        let weight = material.eval(wo, wi, n).unwrap() * wi.dot(n).abs()
            / material.pdf(wo, wi, n).unwrap();
        assert!((weight - Color::splat(0.9)).length() < 1e-5);
    }

    #[test]
    fn test_dielectric_is_lossless() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = glass(MaterialKind::Dielectric);
        let n = Vec3::Z;
        let wo = Vec3::new(0.5, 0.0, 0.6).normalize();

        for _ in 0..100 {
            let wi = material.sample(wo, n, &mut rng).unwrap();
            let weight = material.eval(wo, wi, n).unwrap() * wi.dot(n).abs()
                / material.pdf(wo, wi, n).unwrap();
            assert!((weight - Color::ONE).length() < 1e-4);
        }
    }

    #[test]
    fn test_fresnel_specular_chooses_both_branches() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = glass(MaterialKind::FresnelSpecular);
        let n = Vec3::Z;
        let wo = Vec3::new(0.6, 0.0, 0.8);
        let f = fr_dielectric(wo.dot(n), 1.5);

        let count = 20_000;
        let reflected = (0..count)
            .filter(|_| material.sample(wo, n, &mut rng).unwrap().z > 0.0)
            .count();
        let ratio = reflected as f32 / count as f32;
        assert!((ratio - f).abs() < 0.01, "ratio {} vs fresnel {}", ratio, f);
    }

    #[test]
    fn test_microfacet_reflection_is_reciprocal() {
        let material = rough(
            MaterialKind::MicrofacetReflection,
            MicrofacetDistribution::trowbridge_reitz(0.4, 0.4),
        );
        let n = Vec3::Z;
        let wo = Vec3::new(0.3, 0.1, 0.9).normalize();
        let wi = Vec3::new(-0.5, 0.2, 0.7).normalize();

        let forward = material.eval(wo, wi, n).unwrap();
        let backward = material.eval(wi, wo, n).unwrap();
        assert!(forward.x > 0.0);
        assert!((forward - backward).length() < 1e-4 * forward.length());
    }

    #[test]
    fn test_microfacet_reflection_energy_is_bounded() {
        // White furnace: directional albedo of a rough conductor-like mirror
        let mut rng = StdRng::seed_from_u64(42);
        let material = rough(
            MaterialKind::MicrofacetReflection,
            MicrofacetDistribution::trowbridge_reitz(0.3, 0.3),
        )
        .with_fresnel(Fresnel::NoOp);
        let n = Vec3::Z;
        let wo = Vec3::new(0.4, 0.0, 0.9).normalize();

        let count = 20_000;
        let mut total = 0.0;
        for _ in 0..count {
            let wi = material.sample(wo, n, &mut rng).unwrap();
            if wi == Vec3::ZERO {
                continue;
            }
            let pdf = material.pdf(wo, wi, n).unwrap();
            total += material.eval(wo, wi, n).unwrap().x * wi.dot(n).abs() / pdf;
        }
        let albedo = total / count as f32;
        assert!(albedo > 0.85 && albedo <= 1.01, "albedo {}", albedo);
    }

    #[test]
    fn test_microfacet_transmission_crosses_surface() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = rough(
            MaterialKind::MicrofacetTransmission,
            MicrofacetDistribution::beckmann(0.2, 0.2),
        );
        let n = Vec3::Z;
        let wo = Vec3::new(0.3, 0.0, 0.9).normalize();

        for _ in 0..200 {
            let wi = material.sample(wo, n, &mut rng).unwrap();
            if wi == Vec3::ZERO {
                continue;
            }
            assert!(wi.z < 0.0);
            assert!(material.eval(wo, wi, n).unwrap().x > 0.0);
        }
    }

    #[test]
    fn test_has_emission() {
        assert!(!Material::diffuse(Color::ONE).has_emission());
        assert!(Material::emissive(Color::ONE, Color::new(0.0, 0.0, 2.0)).has_emission());
    }

    #[test]
    fn test_frame_round_trip() {
        let n = Vec3::new(-0.3, 0.2, 0.9).normalize();
        let frame = Frame::new(n);
        let v = Vec3::new(0.1, -0.7, 0.3);
        assert!((frame.to_world(frame.to_local(v)) - v).length() < 1e-5);
        assert!((frame.to_local(n) - Vec3::Z).length() < 1e-5);
    }
}
