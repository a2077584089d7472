//! Tagged-point spatial index.
//!
//! A recursive **Octree** over 3-D points, each carrying a small tag.  The
//! semantic world stores every surface boundary vertex (in the fixed frame)
//! tagged with its surface's slot, so "which surfaces have a vertex inside
//! this box?" only visits the octants the box overlaps.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`Aabb`]      | An axis-aligned bounding box.                    |
//! | [`Octree`]    | Spatial index; insert tagged points, query tags. |
//!
//! # Example
//!
//! ```rust
//! use semworld_perception::octree::{Aabb, Octree};
//! use semworld_types::Vec3;
//!
//! let tree = Octree::from_points(
//!     [(Vec3::new(1.0, 2.0, 0.7), "kitchen"), (Vec3::new(9.0, 9.0, 0.4), "desk")],
//!     8,
//! );
//!
//! let query_box = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 3.0, 1.0));
//! assert_eq!(tree.query_aabb(&query_box), vec![&"kitchen"]);
//! ```

use semworld_types::Vec3;

/// Padding added around the data when the root box is derived from points,
/// so that flat (coplanar) input still has a non-empty volume.
const ROOT_PADDING: f64 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from two opposite corners, in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Smallest box containing every point, or `None` for no points.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |b, p| {
            Self::new(
                Vec3::new(b.min.x.min(p.x), b.min.y.min(p.y), b.min.z.min(p.z)),
                Vec3::new(b.max.x.max(p.x), b.max.y.max(p.y), b.max.z.max(p.z)),
            )
        }))
    }

    /// Grow every face outward by `margin`.
    pub fn padded(&self, margin: f64) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self::new(self.min.sub(m), self.max.add(m))
    }

    pub fn centre(&self) -> Vec3 {
        self.min.add(self.max).scale(0.5)
    }

    /// True when the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// True when `other` overlaps (intersects or touches) this box.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Octree
// ────────────────────────────────────────────────────────────────────────────

/// A recursive spatial index of tagged points.
///
/// Entries are stored in the deepest node whose box still contains them.
/// A leaf splits into eight octants once it holds more than `capacity`
/// entries, unless `max_depth` levels already exist.
#[derive(Debug, Clone)]
pub struct Octree<T> {
    root: OctreeNode<T>,
    max_depth: usize,
}

impl<T> Octree<T> {
    /// Create an empty tree covering `bounds`.
    pub fn new(bounds: Aabb, capacity: usize) -> Self {
        Self::with_max_depth(bounds, capacity, 8)
    }

    /// Create an empty tree with an explicit maximum subdivision depth.
    pub fn with_max_depth(bounds: Aabb, capacity: usize, max_depth: usize) -> Self {
        Self {
            root: OctreeNode::new(bounds, capacity.max(1)),
            max_depth,
        }
    }

    /// Build a tree whose root box encloses every given point.
    pub fn from_points(entries: impl IntoIterator<Item = (Vec3, T)>, capacity: usize) -> Self {
        let entries: Vec<(Vec3, T)> = entries.into_iter().collect();
        let bounds = Aabb::enclosing(entries.iter().map(|(p, _)| p))
            .unwrap_or_else(|| Aabb::new(Vec3::zero(), Vec3::zero()))
            .padded(ROOT_PADDING);
        let mut tree = Self::new(bounds, capacity);
        for (p, tag) in entries {
            tree.insert(p, tag);
        }
        tree
    }

    /// Insert a tagged point.  Returns `false` (and drops the entry) when the
    /// point is outside the root box.
    pub fn insert(&mut self, point: Vec3, tag: T) -> bool {
        self.root.insert(point, tag, self.max_depth, 0)
    }

    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bounds(&self) -> Aabb {
        self.root.bounds
    }

    /// Tags of every point inside `region`, in traversal order.  A tag appears
    /// once per matching point.
    pub fn query_aabb(&self, region: &Aabb) -> Vec<&T> {
        let mut out = Vec::new();
        self.root.query_aabb(region, &mut out);
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OctreeNode – internal implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct OctreeNode<T> {
    bounds: Aabb,
    capacity: usize,
    /// Entries stored at this node (only non-empty when the node is a leaf).
    entries: Vec<(Vec3, T)>,
    /// Eight children; `None` while this node is a leaf.
    children: Option<Box<[OctreeNode<T>; 8]>>,
}

impl<T> OctreeNode<T> {
    fn new(bounds: Aabb, capacity: usize) -> Self {
        Self {
            bounds,
            capacity,
            entries: Vec::new(),
            children: None,
        }
    }

    fn count(&self) -> usize {
        match &self.children {
            None => self.entries.len(),
            Some(children) => children.iter().map(|c| c.count()).sum(),
        }
    }

    fn insert(&mut self, point: Vec3, tag: T, max_depth: usize, depth: usize) -> bool {
        if !self.bounds.contains_point(point) {
            return false;
        }
        match self.children.as_mut() {
            None => {
                self.entries.push((point, tag));
                if self.entries.len() > self.capacity && depth < max_depth {
                    self.subdivide(max_depth, depth);
                }
                true
            }
            Some(children) => match children.iter_mut().find(|c| c.bounds.contains_point(point)) {
                Some(child) => child.insert(point, tag, max_depth, depth + 1),
                None => false,
            },
        }
    }

    fn query_aabb<'a>(&'a self, region: &Aabb, out: &mut Vec<&'a T>) {
        if !self.bounds.overlaps(region) {
            return;
        }
        match &self.children {
            None => out.extend(
                self.entries
                    .iter()
                    .filter(|(p, _)| region.contains_point(*p))
                    .map(|(_, tag)| tag),
            ),
            Some(children) => {
                for child in children.iter() {
                    child.query_aabb(region, out);
                }
            }
        }
    }

    /// Split this leaf into eight children and redistribute its entries.
    fn subdivide(&mut self, max_depth: usize, depth: usize) {
        let c = self.bounds.centre();
        let min = self.bounds.min;
        let max = self.bounds.max;

        let octants = [
            Aabb::new(min, c),
            Aabb::new(Vec3::new(c.x, min.y, min.z), Vec3::new(max.x, c.y, c.z)),
            Aabb::new(Vec3::new(min.x, c.y, min.z), Vec3::new(c.x, max.y, c.z)),
            Aabb::new(Vec3::new(c.x, c.y, min.z), Vec3::new(max.x, max.y, c.z)),
            Aabb::new(Vec3::new(min.x, min.y, c.z), Vec3::new(c.x, c.y, max.z)),
            Aabb::new(Vec3::new(c.x, min.y, c.z), Vec3::new(max.x, c.y, max.z)),
            Aabb::new(Vec3::new(min.x, c.y, c.z), Vec3::new(c.x, max.y, max.z)),
            Aabb::new(c, max),
        ];

        let cap = self.capacity;
        let mut children = Box::new(octants.map(|b| OctreeNode::new(b, cap)));

        for (p, tag) in std::mem::take(&mut self.entries) {
            if let Some(child) = children.iter_mut().find(|c| c.bounds.contains_point(p)) {
                child.insert(p, tag, max_depth, depth + 1);
            }
        }

        self.children = Some(children);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
