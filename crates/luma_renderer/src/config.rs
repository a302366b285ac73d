//! Render configuration.
//!
//! Everything a render needs besides the scene geometry itself. The struct
//! round-trips through JSON so a scene driver can keep settings in a file;
//! missing fields fall back to [`RenderConfig::default`].

use std::path::{Path, PathBuf};

use luma_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Color, RenderError, RenderResult, SplitMethod};

/// Settings shared by the scene, camera and renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Scene background color
    pub background: Color,
    /// Probability that a path continues at each bounce
    pub russian_roulette: f32,
    /// Number of independent passes averaged into the final image
    pub samples_per_pixel: u32,
    /// Camera position
    pub eye: Vec3,
    /// Render passes on a worker pool instead of the calling thread
    pub multi_thread: bool,
    /// Average four sub-pixel rays per pixel
    pub multisampling: bool,
    /// Worker count override (defaults to the detected hardware concurrency)
    pub threads: Option<usize>,
    /// Base seed for pass generators (defaults to OS entropy)
    pub seed: Option<u64>,
    /// BVH split strategy
    pub split_method: SplitMethod,
    /// Output image path
    pub output: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 784,
            height: 784,
            fov: 40.0,
            background: Color::new(0.235294, 0.67451, 0.843137),
            russian_roulette: 0.8,
            samples_per_pixel: 16,
            eye: Vec3::new(278.0, 273.0, -800.0),
            multi_thread: true,
            multisampling: false,
            threads: None,
            seed: None,
            split_method: SplitMethod::Sah,
            output: PathBuf::from("binary.ppm"),
        }
    }
}

impl RenderConfig {
    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(json: &str) -> RenderResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        log::info!("Loading render config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject settings that cannot produce an image.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::InvalidConfig(
                "samples_per_pixel must be at least 1".to_string(),
            ));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(RenderError::InvalidConfig(format!(
                "fov must be in (0, 180) degrees, got {}",
                self.fov
            )));
        }
        check_russian_roulette(self.russian_roulette)?;
        if self.threads == Some(0) {
            return Err(RenderError::InvalidConfig(
                "threads must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set samples per pixel.
    pub fn with_samples(mut self, spp: u32) -> Self {
        self.samples_per_pixel = spp;
        self
    }

    /// Fix the base seed so renders are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Paths only end through Russian roulette, so a continuation probability of
/// 1 never terminates.
pub(crate) fn check_russian_roulette(probability: f32) -> RenderResult<()> {
    if probability > 0.0 && probability < 1.0 {
        Ok(())
    } else {
        Err(RenderError::InvalidConfig(format!(
            "russian_roulette must be in (0, 1), got {}",
            probability
        )))
    }
}
