//! Scene files: a frame graph plus one batch of surfaces, as JSON.
//!
//! ```json
//! {
//!   "fixed_frame": "world",
//!   "frames": [
//!     { "parent": "world", "child": "camera",
//!       "transform": { "translation": { "x": 0.0, "y": 0.0, "z": 1.2 } } }
//!   ],
//!   "surfaces": {
//!     "header": { "frame_id": "camera" },
//!     "surfaces": [ ... ]
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use semworld_perception::TfEngine;
use semworld_types::{SurfaceArray, Transform3D};
use serde::{Deserialize, Serialize};

/// Pose of `child` in `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameLink {
    pub parent: String,
    pub child: String,
    pub transform: Transform3D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneFile {
    /// Overrides the configured fixed frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_frame: Option<String>,
    #[serde(default)]
    pub frames: Vec<FrameLink>,
    pub surfaces: SurfaceArray,
}

impl SceneFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read scene at {}: {}", path.display(), e))?;
        Self::parse(&raw).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("Failed to parse scene: {}", e))
    }

    /// Frame graph built from `frames`.
    pub fn transform_engine(&self) -> Result<TfEngine, String> {
        let mut tf = TfEngine::new();
        for link in &self.frames {
            tf.set_transform(&link.parent, &link.child, link.transform)
                .map_err(|e| format!("Bad frame link: {}", e))?;
        }
        Ok(tf)
    }

    /// JSON schema of the scene format, pretty-printed.
    pub fn schema_json() -> Result<String, String> {
        let schema = schemars::schema_for!(SceneFile);
        serde_json::to_string_pretty(&schema).map_err(|e| format!("Failed to serialize schema: {}", e))
    }
}
