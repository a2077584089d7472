//! [`SemanticWorld`] – one handle over the registry, frame lookups and the
//! collision hand-off.
//!
//! Everything stored is expressed in the world's fixed frame: incoming
//! surfaces are re-expressed on [`ingest`][SemanticWorld::ingest], and the
//! queries take fixed-frame poses unless their name says otherwise.

use std::sync::{Arc, Mutex, PoisonError};

use semworld_perception::TransformProvider;
use semworld_types::{PlacePoseCandidate, Quaternion, Surface, SurfaceArray, Transform3D, Vec3, WorldError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::collision::{CollisionPublisher, CollisionWorld, InMemoryCollisionWorld};
use crate::markers::{MarkerArray, place_locations_marker};
use crate::matcher;
use crate::place::{self, PlaceParams};
use crate::registry::{SurfaceRegistry, SurfaceSet};
use crate::shape::ObjectShape;

pub struct SemanticWorld {
    fixed_frame: String,
    registry: Arc<SurfaceRegistry>,
    transforms: Arc<dyn TransformProvider>,
    collision: Mutex<CollisionPublisher<Box<dyn CollisionWorld>>>,
}

impl SemanticWorld {
    /// A world whose collision hand-off goes to a fresh
    /// [`InMemoryCollisionWorld`].
    pub fn new(fixed_frame: impl Into<String>, transforms: Arc<dyn TransformProvider>) -> Self {
        Self::with_collision_world(fixed_frame, transforms, InMemoryCollisionWorld::new())
    }

    pub fn with_collision_world(
        fixed_frame: impl Into<String>,
        transforms: Arc<dyn TransformProvider>,
        collision_world: impl CollisionWorld + 'static,
    ) -> Self {
        let fixed_frame = fixed_frame.into();
        let world: Box<dyn CollisionWorld> = Box::new(collision_world);
        Self {
            collision: Mutex::new(CollisionPublisher::new(world, fixed_frame.clone())),
            fixed_frame,
            registry: Arc::new(SurfaceRegistry::new()),
            transforms,
        }
    }

    pub fn fixed_frame(&self) -> &str {
        &self.fixed_frame
    }

    pub fn registry(&self) -> &Arc<SurfaceRegistry> {
        &self.registry
    }

    pub fn snapshot(&self) -> Arc<SurfaceSet> {
        self.registry.snapshot()
    }

    // ── Ingestion ────────────────────────────────────────────────────────────

    /// Re-express every surface of `array` in the fixed frame and install them
    /// as the new surface set.
    ///
    /// A surface with an empty `header.frame_id` inherits the array's frame.
    /// Surfaces without boundary points are skipped.
    ///
    /// # Errors
    ///
    /// Any lookup or validation failure rejects the whole array and leaves
    /// the previous set in place.
    #[instrument(skip_all, fields(frame = %array.header.frame_id, count = array.surfaces.len()))]
    pub fn ingest(&self, array: SurfaceArray) -> Result<Uuid, WorldError> {
        let SurfaceArray { header, surfaces } = array;
        let mut accepted = Vec::with_capacity(surfaces.len());

        for mut surface in surfaces {
            if surface.boundary.is_empty() {
                warn!(surface = %surface.name, "surface has no boundary points; skipped");
                continue;
            }
            if surface.header.frame_id.is_empty() {
                surface.header.frame_id = header.frame_id.clone();
            }
            if surface.header.frame_id != self.fixed_frame {
                let to_fixed = self
                    .transforms
                    .lookup(&self.fixed_frame, &surface.header.frame_id)?;
                surface.pose = to_fixed.compose(surface.pose);
                surface.header.frame_id = self.fixed_frame.clone();
            }
            accepted.push(surface);
        }

        let generation = self.registry.apply_update(accepted)?;
        info!(%generation, surfaces = self.registry.len(), "surface update applied");
        Ok(generation)
    }

    /// Register the zero-argument observer fired after each applied update.
    pub fn add_table_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.registry.set_update_callback(callback);
    }

    /// Forget every surface, including which ones were handed to the
    /// collision world.
    pub fn clear(&self) {
        self.registry.clear();
        self.collision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forget();
    }

    // ── Region queries ───────────────────────────────────────────────────────

    pub fn tables_in_roi(&self, min_corner: Vec3, max_corner: Vec3) -> Vec<Surface> {
        self.registry.query_region(min_corner, max_corner)
    }

    pub fn table_names_in_roi(&self, min_corner: Vec3, max_corner: Vec3) -> Vec<String> {
        self.registry.query_region_names(min_corner, max_corner)
    }

    // ── Place poses ──────────────────────────────────────────────────────────

    /// See [`place::generate_place_poses`].
    pub fn generate_place_poses(
        &self,
        surface: &Surface,
        orientation: Quaternion,
        params: PlaceParams,
    ) -> Result<Vec<PlacePoseCandidate>, WorldError> {
        place::generate_place_poses(surface, orientation, params)
    }

    /// See [`place::generate_place_poses_for_shape`].
    pub fn generate_place_poses_for_shape(
        &self,
        surface: &Surface,
        shape: &ObjectShape,
        orientation: Quaternion,
        resolution: f64,
    ) -> Result<Vec<PlacePoseCandidate>, WorldError> {
        place::generate_place_poses_for_shape(surface, shape, orientation, resolution)
    }

    /// Candidates on the registered surface `name`; empty when unknown.
    pub fn generate_place_poses_by_name(
        &self,
        name: &str,
        shape: &ObjectShape,
        orientation: Quaternion,
        resolution: f64,
    ) -> Result<Vec<PlacePoseCandidate>, WorldError> {
        place::generate_place_poses_by_name(&self.snapshot(), name, shape, orientation, resolution)
    }

    pub fn place_locations_marker(&self, poses: &[PlacePoseCandidate]) -> MarkerArray {
        place_locations_marker(poses)
    }

    // ── Matching ─────────────────────────────────────────────────────────────

    /// First registered surface `pose` (fixed frame) rests on.
    pub fn find_object_table(
        &self,
        pose: &Transform3D,
        min_distance_from_edge: f64,
        min_vertical_offset: f64,
    ) -> Option<String> {
        matcher::find_object_table(&self.snapshot(), pose, min_distance_from_edge, min_vertical_offset)
    }

    /// [`find_object_table`][Self::find_object_table] for a pose given in
    /// `frame_id`.
    pub fn find_object_table_in_frame(
        &self,
        pose: &Transform3D,
        frame_id: &str,
        min_distance_from_edge: f64,
        min_vertical_offset: f64,
    ) -> Result<Option<String>, WorldError> {
        let fixed = self
            .transforms
            .transform_pose(*pose, frame_id, &self.fixed_frame)?;
        Ok(self.find_object_table(&fixed, min_distance_from_edge, min_vertical_offset))
    }

    /// See [`matcher::is_inside_table_contour`].
    pub fn is_inside_table_contour(
        &self,
        pose: &Transform3D,
        surface: &Surface,
        min_distance_from_edge: f64,
        min_vertical_offset: f64,
    ) -> Result<bool, WorldError> {
        matcher::is_inside_table_contour(pose, surface, min_distance_from_edge, min_vertical_offset)
    }

    // ── Collision hand-off ───────────────────────────────────────────────────

    /// Replace the surfaces in the collision world with the current set,
    /// extruded by `thickness`.  `Ok(true)` when every surface got through.
    pub fn add_tables_to_collision_world(&self, thickness: f64) -> Result<bool, WorldError> {
        let snapshot = self.snapshot();
        self.collision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_surfaces_to_collision_world(&snapshot, thickness)
    }
}
