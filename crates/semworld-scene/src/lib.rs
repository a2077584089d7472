//! `semworld-scene` – the semantic world proper.
//!
//! | Module | Role |
//! |------|------|
//! | [`registry`]  | Snapshot-and-swap store of the current surfaces. |
//! | [`place`]     | Grid sampling of place-pose candidates.          |
//! | [`shape`]     | Clearance inferred from an object's shape.       |
//! | [`matcher`]   | Which surface an object rests on.                |
//! | [`collision`] | Hand-off of surfaces as solids to a collision world. |
//! | [`markers`]   | Marker arrays for candidate visualisation.       |
//! | [`world`]     | [`SemanticWorld`], the facade tying these together. |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use semworld_perception::TfEngine;
//! use semworld_scene::{ObjectShape, SemanticWorld};
//! use semworld_types::{Header, Point2, Quaternion, Surface, SurfaceArray, Transform3D};
//!
//! let world = SemanticWorld::new("world", Arc::new(TfEngine::new()));
//! let table = Surface::new(
//!     "table",
//!     "world",
//!     Transform3D::from_translation(0.0, 0.0, 0.75),
//!     vec![
//!         Point2::new(0.0, 0.0),
//!         Point2::new(1.0, 0.0),
//!         Point2::new(1.0, 1.0),
//!         Point2::new(0.0, 1.0),
//!     ],
//! );
//! world
//!     .ingest(SurfaceArray { header: Header::new("world"), surfaces: vec![table] })
//!     .unwrap();
//!
//! let cup = ObjectShape::Cylinder { radius: 0.04, length: 0.1 };
//! let poses = world
//!     .generate_place_poses_by_name("table", &cup, Quaternion::identity(), 0.1)
//!     .unwrap();
//! assert_eq!(world.find_object_table(&poses[0].pose(), 0.0, 0.0).as_deref(), Some("table"));
//! ```

pub mod collision;
pub mod markers;
pub mod matcher;
pub mod place;
pub mod registry;
pub mod shape;
pub mod world;

pub use collision::{CollisionObject, CollisionOperation, CollisionPublisher, CollisionWorld, InMemoryCollisionWorld};
pub use markers::{Marker, MarkerArray, place_locations_marker};
pub use place::{PlaceParams, PlacePoses, generate_place_poses};
pub use registry::{SurfaceRegistry, SurfaceSet};
pub use shape::{Clearance, ObjectShape};
pub use world::SemanticWorld;
