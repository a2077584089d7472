//! `semworld-types` – shared data model for the semantic world.
//!
//! Every other crate in the workspace speaks in these types: surfaces as they
//! arrive from a segmentation pipeline, the meshes handed to a collision
//! world, the placement candidates returned to a planner, and the single
//! [`WorldError`] enum that all fallible operations return.

pub mod math;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use math::{Point2, Quaternion, Transform3D, Vec3};

/// Reference frame and acquisition time of a message or surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Header {
    /// Frame the accompanying pose is expressed in (e.g. `"camera_link"`).
    pub frame_id: String,
    #[serde(default = "Utc::now")]
    #[schemars(with = "String")]
    pub stamp: DateTime<Utc>,
}

impl Header {
    /// A header stamped with the current time.
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: Utc::now(),
        }
    }
}

/// A planar support region (a "table").
///
/// The supporting plane is the local XY plane of `pose` at local Z = 0, and
/// `boundary` is a simple polygon in that plane.  Winding order is whatever
/// upstream segmentation produced; consumers normalise it before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Surface {
    /// Unique identifier within a registry snapshot.
    pub name: String,
    pub header: Header,
    /// Pose of the surface's local frame in `header.frame_id`.
    pub pose: Transform3D,
    pub boundary: Vec<Point2>,
}

impl Surface {
    pub fn new(
        name: impl Into<String>,
        frame_id: impl Into<String>,
        pose: Transform3D,
        boundary: Vec<Point2>,
    ) -> Self {
        Self {
            name: name.into(),
            header: Header::new(frame_id),
            pose,
            boundary,
        }
    }

    /// Boundary vertices expressed in the surface's parent frame.
    pub fn boundary_in_parent(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.boundary
            .iter()
            .map(|p| self.pose.transform_point(p.with_z(0.0)))
    }
}

/// One batch of detected surfaces, replacing everything seen before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurfaceArray {
    pub header: Header,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
}

/// A closed triangle mesh.  Triangles index into `vertices` and are wound
/// counter-clockwise when seen from outside the solid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[usize; 3]>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// One sampled placement hypothesis, already expressed in `frame_id`.
///
/// Produced fresh by every generation call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacePoseCandidate {
    pub frame_id: String,
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl PlacePoseCandidate {
    pub fn pose(&self) -> Transform3D {
        Transform3D::new(self.position, self.orientation)
    }
}

/// Global error type for geometric validation, frame lookups and hand-off to
/// external collaborators.
///
/// "Nothing found" is never an error: queries return an empty `Vec` or
/// `None` for that.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldError {
    #[error("Degenerate polygon: {0}")]
    DegeneratePolygon(String),

    #[error("Invalid parameter `{name}`: {details}")]
    InvalidParameter { name: String, details: String },

    #[error("Invalid extrusion thickness {0}: must be finite and > 0")]
    InvalidThickness(f64),

    #[error("Transform unavailable from `{from}` to `{to}`")]
    TransformUnavailable { from: String, to: String },

    #[error("Duplicate surface name `{0}` in update")]
    DuplicateSurface(String),

    #[error("Collision world rejected `{id}`: {details}")]
    CollisionWorld { id: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),
}

impl WorldError {
    /// Shorthand for [`WorldError::InvalidParameter`].
    pub fn invalid(name: &str, details: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            details: details.into(),
        }
    }
}
