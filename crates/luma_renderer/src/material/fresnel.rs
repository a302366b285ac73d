//! Fresnel reflectance.
//!
//! Cosines follow one convention throughout: positive when the direction lies
//! on the outside of the surface (the side the normal points to), negative
//! when it lies inside the medium.

use crate::Color;

/// Fraction of light reflected at an interface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Fresnel {
    /// Reflects everything.
    #[default]
    NoOp,
    /// Interface between vacuum and a dielectric of relative index `eta`.
    Dielectric { eta: f32 },
    /// Conductor with per-channel index `eta` and absorption `k`.
    Conductor { eta: Color, k: Color },
}

impl Fresnel {
    /// Reflectance for an incident direction with cosine `cos_theta_i`.
    pub fn evaluate(&self, cos_theta_i: f32) -> Color {
        match *self {
            Fresnel::NoOp => Color::ONE,
            Fresnel::Dielectric { eta } => Color::splat(fr_dielectric(cos_theta_i, eta)),
            Fresnel::Conductor { eta, k } => fr_conductor(cos_theta_i, eta, k),
        }
    }
}

/// Unpolarized dielectric reflectance.
///
/// Returns 1 under total internal reflection.
pub fn fr_dielectric(cos_theta_i: f32, eta: f32) -> f32 {
    let mut cos_i = cos_theta_i.clamp(-1.0, 1.0);
    let (mut eta_i, mut eta_t) = (1.0, eta);
    if cos_i <= 0.0 {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_i = cos_i.abs();
    }

    let sin_i = (1.0 - cos_i * cos_i).max(0.0).sqrt();
    let sin_t = eta_i / eta_t * sin_i;
    if sin_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin_t * sin_t).max(0.0).sqrt();

    let r_parl = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    0.5 * (r_parl * r_parl + r_perp * r_perp)
}

/// Conductor reflectance per channel. Conductors are opaque, so only the
/// magnitude of the cosine matters.
pub fn fr_conductor(cos_theta_i: f32, eta: Color, k: Color) -> Color {
    let cos_i = cos_theta_i.abs().min(1.0);
    let cos2 = cos_i * cos_i;
    let sin2 = 1.0 - cos2;
    let eta2 = eta * eta;
    let k2 = k * k;

    let t0 = eta2 - k2 - Color::splat(sin2);
    let a2_plus_b2 = (t0 * t0 + 4.0 * eta2 * k2).max(Color::ZERO).powf(0.5);
    let t1 = a2_plus_b2 + Color::splat(cos2);
    let a = (0.5 * (a2_plus_b2 + t0)).max(Color::ZERO).powf(0.5);
    let t2 = 2.0 * cos_i * a;
    let rs = (t1 - t2) / (t1 + t2);

    let t3 = cos2 * a2_plus_b2 + Color::splat(sin2 * sin2);
    let t4 = t2 * sin2;
    let rp = rs * (t3 - t4) / (t3 + t4);

    0.5 * (rp + rs)
}
