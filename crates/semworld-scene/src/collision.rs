//! Hand-off of surfaces to an external collision world.
//!
//! The collision world itself lives outside this crate behind the
//! [`CollisionWorld`] trait.  [`CollisionPublisher`] remembers which surface
//! ids it has added so that each hand-off first removes the previous batch
//! and then adds the current one as solid slabs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use semworld_perception::polygon::extrude_solid;
use semworld_types::{Mesh, Transform3D, WorldError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::SurfaceSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionOperation {
    Add,
    Remove,
}

/// One entry of a collision-world diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionObject {
    pub id: String,
    pub frame_id: String,
    pub operation: CollisionOperation,
    pub pose: Transform3D,
    /// Empty for [`CollisionOperation::Remove`].
    pub meshes: Vec<Mesh>,
}

impl CollisionObject {
    pub fn add(id: impl Into<String>, frame_id: impl Into<String>, pose: Transform3D, mesh: Mesh) -> Self {
        Self {
            id: id.into(),
            frame_id: frame_id.into(),
            operation: CollisionOperation::Add,
            pose,
            meshes: vec![mesh],
        }
    }

    pub fn remove(id: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frame_id: frame_id.into(),
            operation: CollisionOperation::Remove,
            pose: Transform3D::identity(),
            meshes: Vec::new(),
        }
    }
}

/// Receiver of collision-object diffs.
pub trait CollisionWorld: Send {
    /// Apply one diff.  An error means the diff as a whole was not accepted.
    fn apply(&mut self, diff: Vec<CollisionObject>) -> Result<(), WorldError>;
}

impl<W: CollisionWorld + ?Sized> CollisionWorld for Box<W> {
    fn apply(&mut self, diff: Vec<CollisionObject>) -> Result<(), WorldError> {
        (**self).apply(diff)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// InMemoryCollisionWorld
// ────────────────────────────────────────────────────────────────────────────

/// A collision world that just keeps the current objects in a map.
///
/// Clones share the same map, so a caller can keep one handle for inspection
/// while another is owned by a [`CollisionPublisher`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollisionWorld {
    objects: Arc<Mutex<BTreeMap<String, CollisionObject>>>,
}

impl InMemoryCollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every object currently present, ordered by id.
    pub fn objects(&self) -> Vec<CollisionObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl CollisionWorld for InMemoryCollisionWorld {
    fn apply(&mut self, diff: Vec<CollisionObject>) -> Result<(), WorldError> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        for object in diff {
            match object.operation {
                CollisionOperation::Add => {
                    objects.insert(object.id.clone(), object);
                }
                CollisionOperation::Remove => {
                    objects.remove(&object.id);
                }
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CollisionPublisher
// ────────────────────────────────────────────────────────────────────────────

/// Tracks the surfaces currently handed to a [`CollisionWorld`].
#[derive(Debug)]
pub struct CollisionPublisher<W> {
    world: W,
    frame_id: String,
    handed_off: BTreeSet<String>,
}

impl<W: CollisionWorld> CollisionPublisher<W> {
    /// `frame_id` is the frame removals are addressed in.
    pub fn new(world: W, frame_id: impl Into<String>) -> Self {
        Self {
            world,
            frame_id: frame_id.into(),
            handed_off: BTreeSet::new(),
        }
    }

    /// Ids the collision world is believed to hold.
    pub fn handed_off(&self) -> impl Iterator<Item = &str> {
        self.handed_off.iter().map(String::as_str)
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Forget the handed-off set without talking to the collision world.
    pub fn forget(&mut self) {
        self.handed_off.clear();
    }

    /// Replace everything previously handed off with the surfaces in `set`,
    /// each extruded downward by `thickness`.
    ///
    /// Returns `Ok(true)` only when every surface reached the collision world.
    /// A surface whose boundary cannot be extruded is skipped and makes the
    /// result `false`; so does a rejected diff.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidThickness`] before anything is sent.
    pub fn add_surfaces_to_collision_world(
        &mut self,
        set: &SurfaceSet,
        thickness: f64,
    ) -> Result<bool, WorldError> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(WorldError::InvalidThickness(thickness));
        }

        let mut complete = true;

        if !self.handed_off.is_empty() {
            let removals = self
                .handed_off
                .iter()
                .map(|id| CollisionObject::remove(id.clone(), self.frame_id.clone()))
                .collect();
            match self.world.apply(removals) {
                Ok(()) => self.handed_off.clear(),
                Err(e) => {
                    // Still remembered, so the next hand-off retries the removal.
                    warn!(error = %e, "collision world rejected removal of previous surfaces");
                    complete = false;
                }
            }
        }

        let mut additions = Vec::with_capacity(set.len());
        for entry in set.iter() {
            let surface = &entry.surface;
            match extrude_solid(&entry.outline, thickness) {
                Ok(mesh) => additions.push(CollisionObject::add(
                    surface.name.clone(),
                    surface.header.frame_id.clone(),
                    surface.pose,
                    mesh,
                )),
                Err(e) => {
                    warn!(surface = %surface.name, error = %e, "cannot build collision solid");
                    complete = false;
                }
            }
        }

        if additions.is_empty() {
            return Ok(complete);
        }

        let ids: Vec<String> = additions.iter().map(|o| o.id.clone()).collect();
        match self.world.apply(additions) {
            Ok(()) => {
                debug!(count = ids.len(), "surfaces handed to collision world");
                self.handed_off.extend(ids);
                Ok(complete)
            }
            Err(e) => {
                warn!(error = %e, "collision world rejected surfaces");
                Ok(false)
            }
        }
    }
}
