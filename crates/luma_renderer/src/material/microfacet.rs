//! Microfacet normal distributions.
//!
//! All directions here are in the local shading frame where the surface
//! normal is `+Z`. The distributions follow the formulation in pbrt (3rd ed.,
//! section 8.4), including the visible-normal samplers of Heitz and d'Eon.

use std::f32::consts::PI;

use luma_math::{Vec2, Vec3};

/// Normal distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    Beckmann,
    TrowbridgeReitz,
}

/// An anisotropic microfacet distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MicrofacetDistribution {
    pub kind: DistributionKind,
    pub alpha_x: f32,
    pub alpha_y: f32,
    /// Sample only microfacets visible from `wo` instead of the full
    /// distribution of normals.
    pub sample_visible_area: bool,
}

impl MicrofacetDistribution {
    pub fn new(kind: DistributionKind, alpha_x: f32, alpha_y: f32) -> Self {
        Self {
            kind,
            alpha_x,
            alpha_y,
            sample_visible_area: true,
        }
    }

    pub fn beckmann(alpha_x: f32, alpha_y: f32) -> Self {
        Self::new(DistributionKind::Beckmann, alpha_x, alpha_y)
    }

    pub fn trowbridge_reitz(alpha_x: f32, alpha_y: f32) -> Self {
        Self::new(DistributionKind::TrowbridgeReitz, alpha_x, alpha_y)
    }

    /// Choose between visible-normal and full-distribution sampling.
    pub fn with_visible_area(mut self, sample_visible_area: bool) -> Self {
        self.sample_visible_area = sample_visible_area;
        self
    }

    /// Map a perceptual roughness in `[0, 1]` to an alpha value.
    ///
    /// Values near zero approach a perfect mirror.
    pub fn roughness_to_alpha(roughness: f32) -> f32 {
        let x = roughness.max(1e-3).ln();
        1.62142 + 0.819955 * x + 0.1734 * x * x + 0.0171201 * x * x * x
            + 0.000640711 * x * x * x * x
    }

    /// Differential area of microfacets oriented along `wh`.
    pub fn d(&self, wh: Vec3) -> f32 {
        let tan2 = tan2_theta(wh);
        if !tan2.is_finite() {
            return 0.0;
        }
        let cos4 = cos2_theta(wh) * cos2_theta(wh);
        let e = (cos2_phi(wh) / (self.alpha_x * self.alpha_x)
            + sin2_phi(wh) / (self.alpha_y * self.alpha_y))
            * tan2;

        match self.kind {
            DistributionKind::Beckmann => {
                (-e).exp() / (PI * self.alpha_x * self.alpha_y * cos4)
            }
            DistributionKind::TrowbridgeReitz => {
                1.0 / (PI * self.alpha_x * self.alpha_y * cos4 * (1.0 + e) * (1.0 + e))
            }
        }
    }

    /// Masked microfacet area per visible microfacet area, seen from `w`.
    pub fn lambda(&self, w: Vec3) -> f32 {
        let abs_tan = tan_theta(w).abs();
        if !abs_tan.is_finite() {
            return 0.0;
        }
        let alpha = (cos2_phi(w) * self.alpha_x * self.alpha_x
            + sin2_phi(w) * self.alpha_y * self.alpha_y)
            .sqrt();

        match self.kind {
            DistributionKind::Beckmann => {
                let a = 1.0 / (alpha * abs_tan);
                if a >= 1.6 {
                    return 0.0;
                }
                (1.0 - 1.259 * a + 0.396 * a * a) / (3.535 * a + 2.181 * a * a)
            }
            DistributionKind::TrowbridgeReitz => {
                let alpha2_tan2 = (alpha * abs_tan) * (alpha * abs_tan);
                (-1.0 + (1.0 + alpha2_tan2).sqrt()) / 2.0
            }
        }
    }

    /// Fraction of microfacets visible from `w`.
    pub fn g1(&self, w: Vec3) -> f32 {
        1.0 / (1.0 + self.lambda(w))
    }

    /// Fraction of microfacets visible from both `wo` and `wi`.
    pub fn g(&self, wo: Vec3, wi: Vec3) -> f32 {
        1.0 / (1.0 + self.lambda(wo) + self.lambda(wi))
    }

    /// Draw a microfacet normal on the same side as `wo`.
    pub fn sample_wh(&self, wo: Vec3, u: Vec2) -> Vec3 {
        if self.sample_visible_area {
            let sample11: fn(f32, f32, f32) -> (f32, f32) = match self.kind {
                DistributionKind::Beckmann => beckmann_sample11,
                DistributionKind::TrowbridgeReitz => trowbridge_reitz_sample11,
            };
            let flip = wo.z < 0.0;
            let wo = if flip { -wo } else { wo };
            let wh = sample_visible(wo, self.alpha_x, self.alpha_y, u, sample11);
            return if flip { -wh } else { wh };
        }

        let (tan2, phi) = self.sample_full(u);
        let cos_theta = 1.0 / (1.0 + tan2).sqrt();
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let wh = spherical_direction(sin_theta, cos_theta, phi);
        if same_hemisphere(wo, wh) {
            wh
        } else {
            -wh
        }
    }

    /// `tan^2(theta)` and `phi` of a normal drawn from `D(wh) cos(theta_h)`.
    fn sample_full(&self, u: Vec2) -> (f32, f32) {
        let (ax, ay) = (self.alpha_x, self.alpha_y);
        let isotropic = ax == ay;

        let phi = if isotropic {
            2.0 * PI * u.y
        } else {
            let mut phi = (ay / ax * (2.0 * PI * u.y + 0.5 * PI).tan()).atan();
            if u.y > 0.5 {
                phi += PI;
            }
            phi
        };
        let alpha2 = if isotropic {
            ax * ax
        } else {
            let (sin_phi, cos_phi) = phi.sin_cos();
            1.0 / (cos_phi * cos_phi / (ax * ax) + sin_phi * sin_phi / (ay * ay))
        };

        // u.x is in [0, 1), so neither ln(1 - u) nor u / (1 - u) diverges
        let tan2 = match self.kind {
            DistributionKind::Beckmann => -alpha2 * (1.0 - u.x).ln(),
            DistributionKind::TrowbridgeReitz => alpha2 * u.x / (1.0 - u.x),
        };
        (tan2, phi)
    }

    /// Solid-angle density of [`Self::sample_wh`] returning `wh`.
    pub fn pdf(&self, wo: Vec3, wh: Vec3) -> f32 {
        if self.sample_visible_area {
            let cos_o = abs_cos_theta(wo);
            if cos_o == 0.0 {
                return 0.0;
            }
            self.d(wh) * self.g1(wo) * wo.dot(wh).abs() / cos_o
        } else {
            self.d(wh) * abs_cos_theta(wh)
        }
    }
}

// Local-frame trigonometry. Inputs are unit vectors.

#[inline]
pub(crate) fn cos_theta(w: Vec3) -> f32 {
    w.z
}

#[inline]
pub(crate) fn abs_cos_theta(w: Vec3) -> f32 {
    w.z.abs()
}

#[inline]
fn cos2_theta(w: Vec3) -> f32 {
    w.z * w.z
}

#[inline]
fn sin2_theta(w: Vec3) -> f32 {
    (1.0 - cos2_theta(w)).max(0.0)
}

#[inline]
fn sin_theta(w: Vec3) -> f32 {
    sin2_theta(w).sqrt()
}

#[inline]
fn tan_theta(w: Vec3) -> f32 {
    sin_theta(w) / cos_theta(w)
}

#[inline]
fn tan2_theta(w: Vec3) -> f32 {
    sin2_theta(w) / cos2_theta(w)
}

#[inline]
fn cos_phi(w: Vec3) -> f32 {
    let sin_theta = sin_theta(w);
    if sin_theta == 0.0 {
        1.0
    } else {
        (w.x / sin_theta).clamp(-1.0, 1.0)
    }
}

#[inline]
fn sin_phi(w: Vec3) -> f32 {
    let sin_theta = sin_theta(w);
    if sin_theta == 0.0 {
        0.0
    } else {
        (w.y / sin_theta).clamp(-1.0, 1.0)
    }
}

#[inline]
fn cos2_phi(w: Vec3) -> f32 {
    cos_phi(w) * cos_phi(w)
}

#[inline]
fn sin2_phi(w: Vec3) -> f32 {
    sin_phi(w) * sin_phi(w)
}

#[inline]
pub(crate) fn same_hemisphere(w: Vec3, wp: Vec3) -> bool {
    w.z * wp.z > 0.0
}

#[inline]
fn spherical_direction(sin_theta: f32, cos_theta: f32, phi: f32) -> Vec3 {
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}

/// Stretch, sample unit-roughness slopes, rotate, unstretch.
fn sample_visible(
    wi: Vec3,
    alpha_x: f32,
    alpha_y: f32,
    u: Vec2,
    sample11: fn(f32, f32, f32) -> (f32, f32),
) -> Vec3 {
    let stretched = Vec3::new(alpha_x * wi.x, alpha_y * wi.y, wi.z).normalize();

    let (slope_x, slope_y) = sample11(cos_theta(stretched), u.x, u.y);

    let (cos_p, sin_p) = (cos_phi(stretched), sin_phi(stretched));
    let rotated_x = cos_p * slope_x - sin_p * slope_y;
    let rotated_y = sin_p * slope_x + cos_p * slope_y;

    Vec3::new(-alpha_x * rotated_x, -alpha_y * rotated_y, 1.0).normalize()
}

fn beckmann_sample11(cos_theta_i: f32, u1: f32, u2: f32) -> (f32, f32) {
    // Normal incidence
    if cos_theta_i > 0.9999 {
        let r = (-(1.0 - u1).ln()).sqrt();
        let (sin_phi, cos_phi) = (2.0 * PI * u2).sin_cos();
        return (r * cos_phi, r * sin_phi);
    }

    let sin_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0).sqrt();
    let tan_theta_i = sin_theta_i / cos_theta_i;
    let cot_theta_i = 1.0 / tan_theta_i;

    // Search interval, parameterized in the erf() domain
    let mut a = -1.0;
    let mut c = erf(cot_theta_i);
    let sample_x = u1.max(1e-6);

    let theta_i = cos_theta_i.acos();
    let fit = 1.0 + theta_i * (-0.876 + theta_i * (0.4265 - 0.0594 * theta_i));
    let mut b = c - (1.0 + c) * (1.0 - sample_x).powf(fit);

    let sqrt_pi_inv = 1.0 / PI.sqrt();
    let normalization =
        1.0 / (1.0 + c + sqrt_pi_inv * tan_theta_i * (-cot_theta_i * cot_theta_i).exp());

    for _ in 1..10 {
        // Bisection fallback also catches NaN
        if !(b >= a && b <= c) {
            b = 0.5 * (a + c);
        }

        let inv_erf = erf_inv(b);
        let value = normalization
            * (1.0 + b + sqrt_pi_inv * tan_theta_i * (-inv_erf * inv_erf).exp())
            - sample_x;
        let derivative = normalization * (1.0 - inv_erf * tan_theta_i);

        if value.abs() < 1e-5 {
            break;
        }

        if value > 0.0 {
            c = b;
        } else {
            a = b;
        }
        b -= value / derivative;
    }

    let slope_x = erf_inv(b);
    let slope_y = erf_inv(2.0 * u2.max(1e-6) - 1.0);
    (slope_x, slope_y)
}

fn trowbridge_reitz_sample11(cos_theta: f32, u1: f32, u2: f32) -> (f32, f32) {
    // Normal incidence
    if cos_theta > 0.9999 {
        let r = (u1 / (1.0 - u1)).sqrt();
        let (sin_phi, cos_phi) = (2.0 * PI * u2).sin_cos();
        return (r * cos_phi, r * sin_phi);
    }

    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let tan_theta = sin_theta / cos_theta;
    let a = 1.0 / tan_theta;
    let g1 = 2.0 / (1.0 + (1.0 + 1.0 / (a * a)).sqrt());

    // slope_x
    let big_a = 2.0 * u1 / g1 - 1.0;
    let tmp = (1.0 / (big_a * big_a - 1.0)).min(1e10);
    let big_b = tan_theta;
    let big_d = (big_b * big_b * tmp * tmp - (big_a * big_a - big_b * big_b) * tmp)
        .max(0.0)
        .sqrt();
    let slope_x_1 = big_b * tmp - big_d;
    let slope_x_2 = big_b * tmp + big_d;
    let slope_x = if big_a < 0.0 || slope_x_2 > 1.0 / tan_theta {
        slope_x_1
    } else {
        slope_x_2
    };

    // slope_y
    let (s, u2) = if u2 > 0.5 {
        (1.0, 2.0 * (u2 - 0.5))
    } else {
        (-1.0, 2.0 * (0.5 - u2))
    };
    let z = (u2 * (u2 * (u2 * 0.27385 - 0.73369) + 0.46341))
        / (u2 * (u2 * (u2 * 0.093073 + 0.309420) - 1.0) + 0.597999);
    let slope_y = s * z * (1.0 + slope_x * slope_x).sqrt();

    (slope_x, slope_y)
}

/// Abramowitz and Stegun 7.1.26.
fn erf(x: f32) -> f32 {
    const A1: f32 = 0.254829592;
    const A2: f32 = -0.284496736;
    const A3: f32 = 1.421413741;
    const A4: f32 = -1.453152027;
    const A5: f32 = 1.061405429;
    const P: f32 = 0.3275911;

    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Giles' single-precision inverse error function.
fn erf_inv(x: f32) -> f32 {
    let x = x.clamp(-0.99999, 0.99999);
    let mut w = -((1.0 - x) * (1.0 + x)).ln();
    let p = if w < 5.0 {
        w -= 2.5;
        let mut p = 2.81022636e-08;
        p = 3.43273939e-07 + p * w;
        p = -3.5233877e-06 + p * w;
        p = -4.39150654e-06 + p * w;
        p = 0.00021858087 + p * w;
        p = -0.00125372503 + p * w;
        p = -0.00417768164 + p * w;
        p = 0.246640727 + p * w;
        1.50140941 + p * w
    } else {
        w = w.sqrt() - 3.0;
        let mut p = -0.000200214257;
        p = 0.000100950558 + p * w;
        p = 0.00134934322 + p * w;
        p = -0.00367342844 + p * w;
        p = 0.00573950773 + p * w;
        p = -0.0076224613 + p * w;
        p = 0.00943887047 + p * w;
        p = 1.00167406 + p * w;
        2.83297682 + p * w
    };
    p * x
}
