//! `semworld-middleware` – moves surface detections into the semantic world.
//!
//! # Modules
//!
//! - [`bus`] – broadcast channel carrying [`SurfaceArray`][semworld_types::SurfaceArray]
//!   batches from detectors to any number of consumers.
//! - [`feed`] – the consumer that ingests every batch into a
//!   [`SemanticWorld`][semworld_scene::SemanticWorld].

pub mod bus;
pub mod feed;

pub use bus::{SurfaceBus, SurfaceReceiver};
pub use feed::{FeedStats, SurfaceFeed};
