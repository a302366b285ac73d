//! Error types for scene configuration and rendering.
//!
//! Numeric corner cases (grazing angles, zero-length directions, empty
//! emitter sets) are never errors; they yield zero contributions. Only
//! misconfiguration and I/O surface here.

use thiserror::Error;

use crate::material::MaterialKind;

/// Errors raised by material evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterialError {
    #[error("{kind:?} material has no microfacet distribution")]
    MissingDistribution { kind: MaterialKind },
}

/// Result type for material operations.
pub type MaterialResult<T> = Result<T, MaterialError>;

/// Errors that can abort a render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Material error: {0}")]
    Material(#[from] MaterialError),

    #[error("Scene BVH has not been built; call Scene::build_bvh first")]
    BvhNotBuilt,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_error_converts_into_render_error() {
        let err: RenderError = MaterialError::MissingDistribution {
            kind: MaterialKind::MicrofacetReflection,
        }
        .into();

        assert!(matches!(err, RenderError::Material(_)));
        assert!(err.to_string().contains("MicrofacetReflection"));
    }

    #[test]
    fn test_invalid_config_message() {
        let err = RenderError::InvalidConfig("width must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: width must be positive");
    }
}
