/// Closed range `[min, max]` of ray parameters accepted by a slab test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Every parameter in front of the ray origin.
    pub const FORWARD: Interval = Interval {
        min: 0.0,
        max: f32::INFINITY,
    };

    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, t: f32) -> bool {
        self.min <= t && t <= self.max
    }

    /// True when no parameter satisfies the range.
    pub fn is_empty(&self) -> bool {
        !(self.min <= self.max)
    }
}
