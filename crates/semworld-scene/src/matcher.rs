//! Which surface is an object resting on?
//!
//! A pose is "on" a surface when, expressed in the surface's local frame,
//! its XY lies inside the boundary with the requested edge margin and its Z
//! is at least `min_vertical_offset` above the plane.

use semworld_perception::polygon::{coalesce_duplicates, normalize_winding, point_in_polygon};
use semworld_types::{Point2, Surface, Transform3D, WorldError};

use crate::registry::{RegisteredSurface, SurfaceSet, unit_pose};

/// Containment test against an already-normalised outline.
///
/// `pose` and `surface_pose` must be expressed in the same frame, and
/// `surface_pose` must carry a unit rotation.  Only the position of `pose` is
/// read.
pub fn is_inside_outline(
    pose: &Transform3D,
    surface_pose: &Transform3D,
    outline: &[Point2],
    min_distance_from_edge: f64,
    min_vertical_offset: f64,
) -> bool {
    let local = surface_pose.inverse().transform_point(pose.translation);
    local.z >= min_vertical_offset && point_in_polygon(local.xy(), outline, min_distance_from_edge)
}

/// Single-surface form of [`find_object_table`].
///
/// # Errors
///
/// - [`WorldError::DegeneratePolygon`] when `surface.boundary` cannot be
///   normalised.
/// - [`WorldError::InvalidParameter`] when `surface.pose` cannot be
///   normalised.
pub fn is_inside_table_contour(
    pose: &Transform3D,
    surface: &Surface,
    min_distance_from_edge: f64,
    min_vertical_offset: f64,
) -> Result<bool, WorldError> {
    let surface_pose = unit_pose(surface)?;
    let outline = normalize_winding(&coalesce_duplicates(&surface.boundary))?;
    Ok(is_inside_outline(
        pose,
        &surface_pose,
        &outline,
        min_distance_from_edge,
        min_vertical_offset,
    ))
}

fn holds(entry: &RegisteredSurface, pose: &Transform3D, margin: f64, offset: f64) -> bool {
    is_inside_outline(pose, &entry.surface.pose, &entry.outline, margin, offset)
}

/// Name of the first surface in `set` (update order) that `pose` rests on.
///
/// When several surfaces qualify the earliest one wins, not the nearest or
/// the highest.
pub fn find_object_table(
    set: &SurfaceSet,
    pose: &Transform3D,
    min_distance_from_edge: f64,
    min_vertical_offset: f64,
) -> Option<String> {
    set.iter()
        .find(|entry| holds(entry, pose, min_distance_from_edge, min_vertical_offset))
        .map(|entry| entry.surface.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use semworld_types::{Quaternion, Vec3};

    fn square(name: &str, x: f64, y: f64, z: f64) -> Surface {
        Surface::new(
            name,
            "world",
            Transform3D::from_translation(x, y, z),
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
        )
    }

    #[test]
    fn centroid_at_surface_height_matches() {
        let set = SurfaceSet::build(vec![square("a", 0.0, 0.0, 0.7), square("b", 5.0, 0.0, 0.7)]).unwrap();
        let pose = Transform3D::from_translation(5.5, 0.5, 0.7);
        assert_eq!(find_object_table(&set, &pose, 0.1, 0.0), Some("b".to_string()));
    }

    #[test]
    fn below_surface_is_not_matched() {
        let set = SurfaceSet::build(vec![square("a", 0.0, 0.0, 0.7)]).unwrap();
        let pose = Transform3D::from_translation(0.5, 0.5, 0.6);
        assert_eq!(find_object_table(&set, &pose, 0.0, 0.05), None);
        let pose = Transform3D::from_translation(0.5, 0.5, 0.71);
        assert_eq!(find_object_table(&set, &pose, 0.0, 0.0), Some("a".to_string()));
    }

    #[test]
    fn vertical_offset_is_a_minimum_height() {
        let surface = square("a", 0.0, 0.0, 0.7);
        let resting = Transform3D::from_translation(0.5, 0.5, 0.7);
        assert!(is_inside_table_contour(&resting, &surface, 0.0, 0.0).unwrap());
        assert!(!is_inside_table_contour(&resting, &surface, 0.0, 0.05).unwrap());
        let raised = Transform3D::from_translation(0.5, 0.5, 0.8);
        assert!(is_inside_table_contour(&raised, &surface, 0.0, 0.05).unwrap());
    }

    #[test]
    fn edge_margin_applies() {
        let surface = square("a", 0.0, 0.0, 0.7);
        let near_edge = Transform3D::from_translation(0.05, 0.5, 0.7);
        assert!(is_inside_table_contour(&near_edge, &surface, 0.0, 0.0).unwrap());
        assert!(!is_inside_table_contour(&near_edge, &surface, 0.1, 0.0).unwrap());
    }

    #[test]
    fn rotated_surface_uses_local_frame() {
        let mut surface = square("tilted", 1.0, 1.0, 0.5);
        surface.pose.rotation = Quaternion::from_yaw(std::f64::consts::FRAC_PI_2);
        // Local (0.5, 0.5) maps to parent (0.5, 1.5).
        let inside = Transform3D::new(Vec3::new(0.5, 1.5, 0.5), Quaternion::identity());
        assert!(is_inside_table_contour(&inside, &surface, 0.1, 0.0).unwrap());
        let outside = Transform3D::from_translation(1.5, 1.5, 0.5);
        assert!(!is_inside_table_contour(&outside, &surface, 0.0, 0.0).unwrap());
    }

    #[test]
    fn scaled_rotation_matches_like_a_unit_one() {
        let mut surface = square("t", 0.0, 0.0, 0.7);
        surface.pose.rotation = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        let centroid = Transform3D::from_translation(0.5, 0.5, 0.7);
        assert!(is_inside_table_contour(&centroid, &surface, 0.1, 0.0).unwrap());
        let set = SurfaceSet::build(vec![surface]).unwrap();
        assert_eq!(find_object_table(&set, &centroid, 0.1, 0.0), Some("t".to_string()));
        let beyond = Transform3D::from_translation(3.0, 3.0, 0.7);
        assert_eq!(find_object_table(&set, &beyond, 0.0, 0.0), None);
    }

    #[test]
    fn zero_rotation_is_an_error() {
        let mut surface = square("t", 0.0, 0.0, 0.7);
        surface.pose.rotation = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            is_inside_table_contour(&Transform3D::identity(), &surface, 0.0, 0.0),
            Err(WorldError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn first_qualifying_surface_wins() {
        let set = SurfaceSet::build(vec![
            square("lower", 0.0, 0.0, 0.5),
            square("upper", 0.0, 0.0, 0.7),
        ])
        .unwrap();
        let pose = Transform3D::from_translation(0.5, 0.5, 0.9);
        assert_eq!(find_object_table(&set, &pose, 0.0, 0.0), Some("lower".to_string()));
    }

    #[test]
    fn empty_set_finds_nothing() {
        let set = SurfaceSet::empty();
        assert_eq!(find_object_table(&set, &Transform3D::identity(), 0.0, 0.0), None);
    }

    #[test]
    fn degenerate_surface_is_an_error() {
        let mut surface = square("flat", 0.0, 0.0, 0.0);
        surface.boundary.truncate(2);
        assert!(matches!(
            is_inside_table_contour(&Transform3D::identity(), &surface, 0.0, 0.0),
            Err(WorldError::DegeneratePolygon(_))
        ));
    }
}
