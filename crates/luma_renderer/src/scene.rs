//! Scene container.
//!
//! A scene owns its primitives and the BVH over them. Primitives are added
//! first, then [`Scene::build_bvh`] freezes the list; intersection and light
//! sampling are only meaningful after that.

use luma_math::Ray;
use rand::RngCore;

use crate::{
    gen_f32, Bvh, Color, Intersection, LightSample, Primitive, PrimitiveId, RenderConfig,
    RenderError, RenderResult, SplitMethod,
};

/// Emitting primitive and its surface area.
#[derive(Debug, Clone, Copy)]
struct Emitter {
    index: usize,
    area: f32,
}

/// Geometry plus the image settings it is rendered with.
pub struct Scene {
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub background: Color,
    pub russian_roulette: f32,
    split_method: SplitMethod,
    primitives: Vec<Box<dyn Primitive>>,
    bvh: Option<Bvh>,
    emitters: Vec<Emitter>,
    emitting_area: f32,
}

impl Scene {
    /// Empty scene with default settings at the given resolution.
    pub fn new(width: u32, height: u32) -> Self {
        let config = RenderConfig::default().with_resolution(width, height);
        Self::from_config(&config)
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fov: config.fov,
            background: config.background,
            russian_roulette: config.russian_roulette,
            split_method: config.split_method,
            primitives: Vec::new(),
            bvh: None,
            emitters: Vec::new(),
            emitting_area: 0.0,
        }
    }

    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Add a primitive and return its id.
    ///
    /// Adding after [`Scene::build_bvh`] discards the BVH; it must be built
    /// again before rendering.
    pub fn add<P: Primitive + 'static>(&mut self, primitive: P) -> PrimitiveId {
        self.add_boxed(Box::new(primitive))
    }

    pub fn add_boxed(&mut self, primitive: Box<dyn Primitive>) -> PrimitiveId {
        if self.bvh.take().is_some() {
            log::warn!("Primitive added after BVH build; the BVH must be rebuilt");
            self.emitters.clear();
            self.emitting_area = 0.0;
        }
        self.primitives.push(primitive);
        PrimitiveId(self.primitives.len() - 1)
    }

    /// Validate materials, build the BVH and index the emitters.
    pub fn build_bvh(&mut self) -> RenderResult<()> {
        for primitive in &self.primitives {
            primitive.material().validate()?;
        }

        self.bvh = Some(Bvh::build(&self.primitives, self.split_method));

        self.emitters = self
            .primitives
            .iter()
            .enumerate()
            .filter(|(_, p)| p.has_emission())
            .map(|(index, p)| Emitter {
                index,
                area: p.area(),
            })
            .collect();
        self.emitting_area = self.emitters.iter().map(|e| e.area).sum();

        log::info!(
            "Scene has {} primitives, {} emitters (area {:.3})",
            self.primitives.len(),
            self.emitters.len(),
            self.emitting_area
        );
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.bvh.is_some()
    }

    /// Fail unless [`Scene::build_bvh`] has run since the last change.
    pub fn ensure_built(&self) -> RenderResult<()> {
        if self.is_built() {
            Ok(())
        } else {
            Err(RenderError::BvhNotBuilt)
        }
    }

    pub fn bvh(&self) -> Option<&Bvh> {
        self.bvh.as_ref()
    }

    pub fn primitives(&self) -> &[Box<dyn Primitive>] {
        &self.primitives
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Total surface area of all emitting primitives.
    pub fn emitting_area(&self) -> f32 {
        self.emitting_area
    }

    /// Nearest hit along `ray`. Misses everything before the BVH is built.
    pub fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        match &self.bvh {
            Some(bvh) => bvh.intersect(ray, &self.primitives),
            None => Intersection::miss(),
        }
    }

    /// Draw a point uniformly by area over the union of all emitters.
    ///
    /// The returned pdf is with respect to area on that union. `None` when
    /// nothing emits or the emitters have no area.
    pub fn sample_light(&self, rng: &mut dyn RngCore) -> Option<LightSample> {
        let last = self.emitters.last()?;
        if !(self.emitting_area > 0.0) {
            return None;
        }

        let p = gen_f32(rng) * self.emitting_area;
        let mut accumulated = 0.0;
        // Rounding can leave `p` past the final sum; the last emitter takes it
        let chosen = self
            .emitters
            .iter()
            .find(|e| {
                accumulated += e.area;
                p <= accumulated
            })
            .unwrap_or(last);

        let mut sample = self.primitives[chosen.index]
            .sample(rng)
            .with_primitive(PrimitiveId(chosen.index));
        sample.pdf *= chosen.area / self.emitting_area;
        Some(sample)
    }
}
