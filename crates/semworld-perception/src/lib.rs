//! `semworld-perception` – geometry and frames.
//!
//! Pure, stateless building blocks the semantic world is computed from.
//!
//! # Modules
//!
//! - [`polygon`] – planar surface geometry: winding normalisation,
//!   containment with an edge margin, ear-clipping triangulation and solid
//!   extrusion of a boundary polygon.
//! - [`transform`] – [`TransformProvider`][transform::TransformProvider] and
//!   [`TfEngine`][transform::TfEngine]: re-express poses between named
//!   reference frames.
//! - [`octree`] – [`Octree`][octree::Octree]: partitions 3-D space so that
//!   "which tagged points lie in this box?" is answered without a full scan.

pub mod octree;
pub mod polygon;
pub mod transform;

pub use transform::{TfEngine, TransformProvider};
