//! Reference-frame transforms.
//!
//! [`TransformProvider`] is the seam through which the semantic world asks
//! "where is frame B in frame A?".  [`TfEngine`] is the in-process
//! implementation: a graph of named frames joined by rigid transforms, walked
//! breadth-first in either direction (a reverse hop uses the inverse
//! transform).
//!
//! # Example
//!
//! ```rust
//! use semworld_perception::transform::{TfEngine, TransformProvider};
//! use semworld_types::{Transform3D, Vec3};
//!
//! let mut tf = TfEngine::new();
//! tf.set_transform("world", "robot_base", Transform3D::from_translation(1.0, 0.0, 0.0)).unwrap();
//! tf.set_transform("robot_base", "camera", Transform3D::from_translation(0.5, 0.0, 1.2)).unwrap();
//!
//! // A point 1 m in front of the camera, expressed in the world frame.
//! let t = tf.lookup("world", "camera").unwrap();
//! let p = t.transform_point(Vec3::new(1.0, 0.0, 0.0));
//! assert!((p.x - 2.5).abs() < 1e-9);
//!
//! // The reverse direction is resolved through the inverse.
//! assert!(tf.lookup("camera", "world").is_ok());
//! assert!(tf.lookup("world", "gripper").is_err());
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use semworld_types::{Transform3D, WorldError};

// ────────────────────────────────────────────────────────────────────────────
// TransformProvider
// ────────────────────────────────────────────────────────────────────────────

/// Resolves rigid transforms between named frames.
pub trait TransformProvider: Send + Sync {
    /// Return T_target_source: the transform carrying points expressed in
    /// `source_frame` into `target_frame`.
    ///
    /// # Errors
    ///
    /// [`WorldError::TransformUnavailable`] when the frame chain cannot be
    /// resolved.  Implementations do not retry.
    fn lookup(&self, target_frame: &str, source_frame: &str) -> Result<Transform3D, WorldError>;

    /// Re-express `pose`, given in `source_frame`, in `target_frame`.
    fn transform_pose(
        &self,
        pose: Transform3D,
        source_frame: &str,
        target_frame: &str,
    ) -> Result<Transform3D, WorldError> {
        Ok(self.lookup(target_frame, source_frame)?.compose(pose))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A graph of named reference frames and the [`Transform3D`]s relating them.
///
/// Every [`set_transform`][TfEngine::set_transform] records both the edge and
/// its inverse, so a chain may be walked from child to parent as well.
#[derive(Debug, Default, Clone)]
pub struct TfEngine {
    /// `links[a][b]` = pose of frame `b` in frame `a`.
    links: HashMap<String, HashMap<String, Transform3D>>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the pose of `child_frame` in `parent_frame`.
    ///
    /// The rotation is stored scaled to unit length.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidParameter`] when the translation is not finite or
    /// the rotation has a zero or non-finite norm; the graph is left as it was.
    pub fn set_transform(
        &mut self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
    ) -> Result<(), WorldError> {
        let transform = transform.try_normalized().ok_or_else(|| {
            WorldError::invalid(
                "transform",
                format!("{parent_frame} -> {child_frame}: translation must be finite and rotation norm non-zero"),
            )
        })?;
        self.links
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
        self.links
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string(), transform.inverse());
        Ok(())
    }

    /// Names of every frame mentioned so far.
    pub fn frames(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(String::as_str)
    }

    /// Breadth-first search from `target_frame`; each queue item carries the
    /// pose of the visited frame in `target_frame`.
    fn resolve(&self, target_frame: &str, source_frame: &str) -> Option<Transform3D> {
        if target_frame == source_frame {
            return Some(Transform3D::identity());
        }

        let mut queue: VecDeque<(&str, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        queue.push_back((target_frame, Transform3D::identity()));
        visited.insert(target_frame);

        while let Some((current, accumulated)) = queue.pop_front() {
            let Some(neighbours) = self.links.get(current) else {
                continue;
            };
            for (next, edge) in neighbours {
                if !visited.insert(next.as_str()) {
                    continue;
                }
                let composed = accumulated.compose(*edge);
                if next == source_frame {
                    return Some(composed);
                }
                queue.push_back((next.as_str(), composed));
            }
        }
        None
    }
}

impl TransformProvider for TfEngine {
    fn lookup(&self, target_frame: &str, source_frame: &str) -> Result<Transform3D, WorldError> {
        self.resolve(target_frame, source_frame)
            .ok_or_else(|| WorldError::TransformUnavailable {
                from: source_frame.to_string(),
                to: target_frame.to_string(),
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
