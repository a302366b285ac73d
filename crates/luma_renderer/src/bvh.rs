//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Nodes live in a flat arena and refer to their children and primitives by
//! index. The tree does not own the primitives; every query takes the same
//! slice the tree was built from. Each node caches its bounds and the summed
//! surface area of the primitives below it, so area-weighted sampling can
//! walk the tree without touching the primitives until it reaches a leaf.

use std::time::Instant;

use luma_math::{Aabb, Axis, Interval, Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{gen_f32, Intersection, LightSample, Primitive, PrimitiveId};

/// Number of centroid buckets evaluated by the surface area heuristic.
const SAH_BUCKETS: usize = 12;

/// Cost of visiting an interior node relative to one primitive test.
const SAH_TRAVERSAL_COST: f32 = 0.125;

/// Below this many primitives SAH falls back to a median split.
const SAH_MIN_PRIMITIVES: usize = 4;

/// How interior nodes partition their primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMethod {
    /// Median split on the longest centroid axis
    Naive,
    /// Surface area heuristic over centroid buckets
    #[default]
    Sah,
}

/// A node of the tree.
///
/// Interior nodes always have exactly two children and leaves always hold
/// exactly one primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum BvhNode {
    Leaf {
        bounds: Aabb,
        area: f32,
        primitive: usize,
    },
    Interior {
        bounds: Aabb,
        area: f32,
        axis: Axis,
        left: usize,
        right: usize,
    },
}

impl BvhNode {
    pub fn bounds(&self) -> Aabb {
        match *self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Interior { bounds, .. } => bounds,
        }
    }

    /// Surface area of all primitives below this node.
    pub fn area(&self) -> f32 {
        match *self {
            BvhNode::Leaf { area, .. } | BvhNode::Interior { area, .. } => area,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }
}

/// Per-primitive data gathered once before building.
#[derive(Debug, Clone, Copy)]
struct PrimitiveInfo {
    index: usize,
    bounds: Aabb,
    centroid: Vec3,
    area: f32,
}

/// Binary BVH over a slice of primitives.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<usize>,
    split_method: SplitMethod,
}

impl Bvh {
    /// Build a tree over `primitives`. An empty slice gives an empty tree
    /// that misses every ray.
    pub fn build<P: Primitive>(primitives: &[P], split_method: SplitMethod) -> Self {
        let start = Instant::now();
        log::info!(
            "Building BVH over {} primitives ({:?} split)",
            primitives.len(),
            split_method
        );

        let mut infos: Vec<PrimitiveInfo> = primitives
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let bounds = p.bounding_box();
                PrimitiveInfo {
                    index,
                    bounds,
                    centroid: bounds.centroid(),
                    area: p.area(),
                }
            })
            .collect();

        let mut bvh = Self {
            nodes: Vec::with_capacity(primitives.len().saturating_mul(2)),
            root: None,
            split_method,
        };
        if !infos.is_empty() {
            bvh.root = Some(bvh.build_recursive(&mut infos));
        }

        log::info!(
            "BVH built in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        log::debug!(
            "BVH has {} nodes, {} leaves",
            bvh.node_count(),
            bvh.leaf_count()
        );
        bvh
    }

    /// Build the subtree over `infos` and return its node index.
    fn build_recursive(&mut self, infos: &mut [PrimitiveInfo]) -> usize {
        match infos {
            [info] => self.push(BvhNode::Leaf {
                bounds: info.bounds,
                area: info.area,
                primitive: info.index,
            }),
            [a, b] => {
                let axis = Aabb::from_point(a.centroid)
                    .union_point(b.centroid)
                    .longest_axis();
                let left = self.build_recursive(std::slice::from_mut(a));
                let right = self.build_recursive(std::slice::from_mut(b));
                self.push_interior(axis, left, right)
            }
            _ => {
                let centroid_bounds = infos
                    .iter()
                    .fold(Aabb::EMPTY, |acc, info| acc.union_point(info.centroid));
                let axis = centroid_bounds.longest_axis();

                let mid = match self.split_method {
                    SplitMethod::Naive => median_split(infos, axis),
                    SplitMethod::Sah => sah_split(infos, &centroid_bounds, axis)
                        .unwrap_or_else(|| median_split(infos, axis)),
                };

                let (lower, upper) = infos.split_at_mut(mid);
                let left = self.build_recursive(lower);
                let right = self.build_recursive(upper);
                self.push_interior(axis, left, right)
            }
        }
    }

    fn push(&mut self, node: BvhNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn push_interior(&mut self, axis: Axis, left: usize, right: usize) -> usize {
        let (l, r) = (&self.nodes[left], &self.nodes[right]);
        let node = BvhNode::Interior {
            bounds: l.bounds().union(&r.bounds()),
            area: l.area() + r.area(),
            axis,
            left,
            right,
        };
        self.push(node)
    }

    /// Nearest hit of `ray` against `primitives`, which must be the slice the
    /// tree was built from. The hit is stamped with the primitive's index.
    pub fn intersect<'a, P: Primitive>(
        &self,
        ray: &Ray,
        primitives: &'a [P],
    ) -> Intersection<'a> {
        match self.root {
            Some(root) => self.intersect_node(root, ray, primitives),
            None => Intersection::miss(),
        }
    }

    fn intersect_node<'a, P: Primitive>(
        &self,
        index: usize,
        ray: &Ray,
        primitives: &'a [P],
    ) -> Intersection<'a> {
        let node = &self.nodes[index];
        if !node.bounds().hit(ray, Interval::FORWARD) {
            return Intersection::miss();
        }

        match *node {
            BvhNode::Leaf { primitive, .. } => primitives[primitive]
                .intersect(ray)
                .with_primitive(PrimitiveId(primitive)),
            BvhNode::Interior { left, right, .. } => {
                let hit_left = self.intersect_node(left, ray, primitives);
                let hit_right = self.intersect_node(right, ray, primitives);
                hit_left.nearer(hit_right)
            }
        }
    }

    /// Draw a point uniformly by area over every primitive in the tree.
    ///
    /// The returned pdf is `1 / total area` for uniform primitives, and the
    /// sample carries the index of the primitive it came from. `None` for an
    /// empty tree or one without area.
    pub fn sample<P: Primitive>(
        &self,
        primitives: &[P],
        rng: &mut dyn RngCore,
    ) -> Option<LightSample> {
        let root = self.root?;
        let total = self.nodes[root].area();
        if !(total > 0.0) {
            return None;
        }

        let mut p = gen_f32(rng) * total;
        let mut index = root;
        loop {
            match self.nodes[index] {
                BvhNode::Leaf {
                    area, primitive, ..
                } => {
                    let mut sample = primitives[primitive]
                        .sample(rng)
                        .with_primitive(PrimitiveId(primitive));
                    sample.pdf *= area / total;
                    return Some(sample);
                }
                BvhNode::Interior { left, right, .. } => {
                    let left_area = self.nodes[left].area();
                    if p < left_area {
                        index = left;
                    } else {
                        p -= left_area;
                        index = right;
                    }
                }
            }
        }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    /// Bounds of the whole tree; [`Aabb::EMPTY`] when empty.
    pub fn bounds(&self) -> Aabb {
        self.root
            .map_or(Aabb::EMPTY, |root| self.nodes[root].bounds())
    }

    /// Total surface area of the primitives in the tree.
    pub fn area(&self) -> f32 {
        self.root.map_or(0.0, |root| self.nodes[root].area())
    }
}

/// Partition around the median centroid on `axis`; returns the split index.
fn median_split(infos: &mut [PrimitiveInfo], axis: Axis) -> usize {
    let mid = infos.len() / 2;
    infos.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
    mid
}

/// Partition by the cheapest bucket boundary; `None` asks for a median split.
fn sah_split(infos: &mut [PrimitiveInfo], centroid_bounds: &Aabb, axis: Axis) -> Option<usize> {
    if infos.len() <= SAH_MIN_PRIMITIVES || centroid_bounds.diagonal()[axis] <= 0.0 {
        return None;
    }

    let total_area = infos
        .iter()
        .fold(Aabb::EMPTY, |acc, info| acc.union(&info.bounds))
        .surface_area();
    if !(total_area > 0.0) {
        return None;
    }

    let bucket_of = |info: &PrimitiveInfo| {
        let b = (SAH_BUCKETS as f32 * centroid_bounds.offset(info.centroid)[axis]) as usize;
        b.min(SAH_BUCKETS - 1)
    };

    let mut counts = [0usize; SAH_BUCKETS];
    let mut bounds = [Aabb::EMPTY; SAH_BUCKETS];
    for info in infos.iter() {
        let b = bucket_of(info);
        counts[b] += 1;
        bounds[b] = bounds[b].union(&info.bounds);
    }

    // Suffix sums so every boundary is evaluated in one forward sweep
    let mut right_counts = [0usize; SAH_BUCKETS];
    let mut right_bounds = [Aabb::EMPTY; SAH_BUCKETS];
    let (mut count, mut bbox) = (0, Aabb::EMPTY);
    for b in (0..SAH_BUCKETS).rev() {
        count += counts[b];
        bbox = bbox.union(&bounds[b]);
        right_counts[b] = count;
        right_bounds[b] = bbox;
    }

    let mut best: Option<(usize, f32)> = None;
    let (mut left_count, mut left_bounds) = (0, Aabb::EMPTY);
    for split in 0..SAH_BUCKETS - 1 {
        left_count += counts[split];
        left_bounds = left_bounds.union(&bounds[split]);
        let right_count = right_counts[split + 1];
        if left_count == 0 || right_count == 0 {
            continue;
        }

        let cost = SAH_TRAVERSAL_COST
            + (left_count as f32 * left_bounds.surface_area()
                + right_count as f32 * right_bounds[split + 1].surface_area())
                / total_area;
        if best.map_or(true, |(_, best_cost)| cost < best_cost) {
            best = Some((split, cost));
        }
    }
    let (split, _) = best?;

    // Stable two-pointer partition keeps the build deterministic
    let mut mid = 0;
    for i in 0..infos.len() {
        if bucket_of(&infos[i]) <= split {
            infos.swap(i, mid);
            mid += 1;
        }
    }

    if mid == 0 || mid == infos.len() {
        None
    } else {
        Some(mid)
    }
}
