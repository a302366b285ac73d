//! Pinhole camera for primary rays.
//!
//! The camera sits at `eye` looking down `+Z` with `+Y` up. Image `x` grows
//! to the left in world space, matching the Cornell box convention where the
//! scene is viewed from negative `z`.

use luma_math::{Ray, Vec2, Vec3};

use crate::RenderConfig;

/// Sub-pixel position of the single primary ray.
const PIXEL_CENTER: [Vec2; 1] = [Vec2::new(0.5, 0.5)];

/// Sub-pixel positions of the four multisampling rays.
const PIXEL_QUADRANTS: [Vec2; 4] = [
    Vec2::new(0.25, 0.25),
    Vec2::new(0.75, 0.25),
    Vec2::new(0.25, 0.75),
    Vec2::new(0.75, 0.75),
];

/// Camera for generating rays into the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in degrees
    fov: f32,
    eye: Vec3,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let defaults = RenderConfig::default();
        Self {
            width,
            height,
            fov: defaults.fov,
            eye: defaults.eye,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.width, config.height)
            .with_fov(config.fov)
            .with_eye(config.eye)
    }

    /// Set vertical field of view in degrees.
    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = fov;
        self
    }

    /// Set camera position.
    pub fn with_eye(mut self, eye: Vec3) -> Self {
        self.eye = eye;
        self
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Sub-pixel offsets used for each pixel.
    pub fn pixel_offsets(multisampling: bool) -> &'static [Vec2] {
        if multisampling {
            &PIXEL_QUADRANTS
        } else {
            &PIXEL_CENTER
        }
    }

    /// Ray through pixel `(i, j)` at sub-pixel `offset`, where `(0, 0)` is
    /// the top-left corner of the pixel.
    pub fn get_ray(&self, i: u32, j: u32, offset: Vec2) -> Ray {
        let scale = (self.fov.to_radians() * 0.5).tan();
        let aspect = self.width as f32 / self.height as f32;

        let x = (2.0 * (i as f32 + offset.x) / self.width as f32 - 1.0) * aspect * scale;
        let y = (1.0 - 2.0 * (j as f32 + offset.y) / self.height as f32) * scale;

        Ray::new(self.eye, Vec3::new(-x, y, 1.0))
    }
}
