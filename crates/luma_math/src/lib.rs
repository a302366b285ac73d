// Re-export glam for convenience
pub use glam::*;

// Luma math types
mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;

/// Index of a coordinate axis (0=X, 1=Y, 2=Z).
pub type Axis = usize;
