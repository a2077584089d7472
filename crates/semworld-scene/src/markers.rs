//! Renderable markers for place-pose candidates.
//!
//! The shapes mirror the usual robotics visualisation message so a bridge
//! can forward them unchanged; nothing here does any transport.

use semworld_types::{PlacePoseCandidate, Transform3D, Vec3};
use serde::{Deserialize, Serialize};

/// Namespace of the markers built by [`place_locations_marker`].
pub const PLACE_LOCATIONS_NS: &str = "place_locations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Arrow,
}

/// RGBA, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub ns: String,
    pub id: u32,
    pub frame_id: String,
    pub kind: MarkerKind,
    pub pose: Transform3D,
    pub scale: Vec3,
    pub color: Color,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerArray {
    pub markers: Vec<Marker>,
}

/// One small green arrow per candidate, ids counting up from zero in
/// candidate order.
pub fn place_locations_marker(poses: &[PlacePoseCandidate]) -> MarkerArray {
    let markers = poses
        .iter()
        .zip(0u32..)
        .map(|(candidate, id)| Marker {
            ns: PLACE_LOCATIONS_NS.to_string(),
            id,
            frame_id: candidate.frame_id.clone(),
            kind: MarkerKind::Arrow,
            pose: candidate.pose(),
            scale: Vec3::new(0.05, 0.005, 0.005),
            color: Color::new(0.0, 1.0, 0.0, 0.5),
        })
        .collect();
    MarkerArray { markers }
}
