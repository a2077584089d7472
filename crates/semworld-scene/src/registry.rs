//! [`SurfaceRegistry`] – the current set of known surfaces.
//!
//! The registry holds one immutable [`SurfaceSet`] behind a single shared
//! cell.  Readers clone the `Arc` out of the cell and query their private
//! snapshot without holding any lock; writers build the next set completely
//! off to the side and then swap the `Arc`.  The lock is held only for that
//! clone or swap, so a long query never blocks an update and an update never
//! blocks a query.
//!
//! Every snapshot also carries an [`Octree`] of its surfaces' boundary
//! vertices in the fixed frame, which answers region-of-interest queries.
//!
//! # Example
//!
//! ```rust
//! use semworld_scene::registry::SurfaceRegistry;
//! use semworld_types::{Point2, Surface, Transform3D, Vec3};
//!
//! let registry = SurfaceRegistry::new();
//! let square = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! registry
//!     .apply_update(vec![Surface::new(
//!         "kitchen_table",
//!         "world",
//!         Transform3D::from_translation(2.0, 0.0, 0.75),
//!         square,
//!     )])
//!     .unwrap();
//!
//! let names = registry.query_region_names(Vec3::new(1.5, -0.5, 0.0), Vec3::new(2.5, 0.5, 1.0));
//! assert_eq!(names, vec!["kitchen_table".to_string()]);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use semworld_perception::octree::{Aabb, Octree};
use semworld_perception::polygon::{coalesce_duplicates, ensure_simple, normalize_winding};
use semworld_types::{Point2, Surface, Transform3D, Vec3, WorldError};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Leaf capacity of the per-snapshot vertex index.
const INDEX_CAPACITY: usize = 16;

/// Zero-argument observer fired after every successful update.
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

// ────────────────────────────────────────────────────────────────────────────
// RegisteredSurface
// ────────────────────────────────────────────────────────────────────────────

/// A validated surface plus the geometry derived from it at ingestion.
#[derive(Debug, Clone)]
pub struct RegisteredSurface {
    /// The surface as stored, with duplicate vertices coalesced.
    pub surface: Surface,
    /// The boundary wound counter-clockwise.
    pub outline: Vec<Point2>,
}

/// `surface.pose` with a unit rotation.
///
/// # Errors
///
/// [`WorldError::InvalidParameter`] named `pose` when the translation is not
/// finite or the rotation has a zero or non-finite norm.
pub(crate) fn unit_pose(surface: &Surface) -> Result<Transform3D, WorldError> {
    surface.pose.try_normalized().ok_or_else(|| {
        WorldError::invalid(
            "pose",
            format!(
                "surface `{}`: translation must be finite and rotation norm finite and non-zero",
                surface.name
            ),
        )
    })
}

impl RegisteredSurface {
    fn ingest(mut surface: Surface) -> Result<Self, WorldError> {
        surface.pose = unit_pose(&surface)?;
        let label = |e: WorldError| match e {
            WorldError::DegeneratePolygon(msg) => {
                WorldError::DegeneratePolygon(format!("surface `{}`: {msg}", surface.name))
            }
            other => other,
        };
        let boundary = coalesce_duplicates(&surface.boundary);
        let outline = normalize_winding(&boundary).map_err(label)?;
        ensure_simple(&outline).map_err(label)?;
        surface.boundary = boundary;
        Ok(Self { surface, outline })
    }

    pub fn name(&self) -> &str {
        &self.surface.name
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SurfaceSet
// ────────────────────────────────────────────────────────────────────────────

/// An immutable snapshot of every known surface.
///
/// Iteration order is the order of the update that installed the set; it is
/// stable for the lifetime of the snapshot.
#[derive(Debug)]
pub struct SurfaceSet {
    generation: Uuid,
    entries: Vec<RegisteredSurface>,
    by_name: HashMap<String, usize>,
    /// Fixed-frame boundary vertices tagged with their slot in `entries`.
    index: Octree<usize>,
}

impl SurfaceSet {
    /// A set with no surfaces.
    pub fn empty() -> Self {
        Self {
            generation: Uuid::new_v4(),
            entries: Vec::new(),
            by_name: HashMap::new(),
            index: Octree::from_points(std::iter::empty(), INDEX_CAPACITY),
        }
    }

    /// Validate every surface and build the snapshot.
    ///
    /// # Errors
    ///
    /// - [`WorldError::DegeneratePolygon`] when a boundary has fewer than three
    ///   distinct vertices, zero area, or crossing edges.
    /// - [`WorldError::DuplicateSurface`] when two surfaces share a name.
    /// - [`WorldError::InvalidParameter`] when a pose cannot be normalised.
    ///   Rotations are stored scaled to unit length.
    pub fn build(surfaces: Vec<Surface>) -> Result<Self, WorldError> {
        let mut entries = Vec::with_capacity(surfaces.len());
        let mut by_name = HashMap::with_capacity(surfaces.len());

        for surface in surfaces {
            if by_name.contains_key(&surface.name) {
                return Err(WorldError::DuplicateSurface(surface.name));
            }
            let entry = RegisteredSurface::ingest(surface)?;
            by_name.insert(entry.surface.name.clone(), entries.len());
            entries.push(entry);
        }

        let vertices = entries.iter().enumerate().flat_map(|(slot, e)| {
            e.surface.boundary_in_parent().map(move |v| (v, slot))
        });
        let index = Octree::from_points(vertices, INDEX_CAPACITY);

        Ok(Self {
            generation: Uuid::new_v4(),
            entries,
            by_name,
            index,
        })
    }

    /// Unique id of this snapshot.
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSurface> {
        self.entries.iter()
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.entries.iter().map(|e| &e.surface)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredSurface> {
        self.by_name.get(name).map(|&slot| &self.entries[slot])
    }

    /// Surfaces with at least one fixed-frame boundary vertex inside the box
    /// spanned by `min_corner` and `max_corner`.
    ///
    /// This is a deliberate approximation: a surface that covers the box
    /// without any vertex inside it is not reported, and one stray vertex is
    /// enough to report a surface lying mostly outside.
    pub fn query_region(&self, min_corner: Vec3, max_corner: Vec3) -> Vec<&RegisteredSurface> {
        let region = Aabb::new(min_corner, max_corner);
        let mut slots: Vec<usize> = self.index.query_aabb(&region).into_iter().copied().collect();
        slots.sort_unstable();
        slots.dedup();
        slots.into_iter().map(|slot| &self.entries[slot]).collect()
    }
}

impl Default for SurfaceSet {
    fn default() -> Self {
        Self::empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SurfaceRegistry
// ────────────────────────────────────────────────────────────────────────────

/// Sole owner of the current [`SurfaceSet`].
///
/// Safe to share across threads behind an `Arc`.
#[derive(Default)]
pub struct SurfaceRegistry {
    current: RwLock<Arc<SurfaceSet>>,
    callback: RwLock<Option<UpdateCallback>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current set.  The snapshot stays valid, and unchanged,
    /// however many updates happen after this call.
    pub fn snapshot(&self) -> Arc<SurfaceSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register the observer fired after each successful update, replacing
    /// any previous one.
    pub fn set_update_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Replace the whole set with `surfaces`.
    ///
    /// Surfaces not present in `surfaces` are gone afterwards.  Either every
    /// surface is installed or, on error, the previous set stays in place.
    /// The update callback runs once, after the new set is visible.
    ///
    /// Returns the generation id of the installed snapshot.
    #[instrument(skip_all, fields(count = surfaces.len()))]
    pub fn apply_update(&self, surfaces: Vec<Surface>) -> Result<Uuid, WorldError> {
        let next = Arc::new(SurfaceSet::build(surfaces)?);
        let generation = next.generation();
        self.install(next);
        debug!(%generation, "surface set installed");
        self.notify();
        Ok(generation)
    }

    /// Drop every surface.  Snapshots and pose lists already handed out are
    /// unaffected.
    pub fn clear(&self) {
        self.install(Arc::new(SurfaceSet::empty()));
    }

    fn install(&self, next: Arc<SurfaceSet>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn notify(&self) {
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Clone of the named surface, if registered.
    pub fn surface(&self, name: &str) -> Option<Surface> {
        self.snapshot().get(name).map(|e| e.surface.clone())
    }

    /// See [`SurfaceSet::query_region`].
    pub fn query_region(&self, min_corner: Vec3, max_corner: Vec3) -> Vec<Surface> {
        self.snapshot()
            .query_region(min_corner, max_corner)
            .into_iter()
            .map(|e| e.surface.clone())
            .collect()
    }

    /// Names of the surfaces [`query_region`][Self::query_region] returns.
    pub fn query_region_names(&self, min_corner: Vec3, max_corner: Vec3) -> Vec<String> {
        self.snapshot()
            .query_region(min_corner, max_corner)
            .into_iter()
            .map(|e| e.surface.name.clone())
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
