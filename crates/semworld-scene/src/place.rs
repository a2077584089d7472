//! Place-pose generation.
//!
//! Every entry point funnels into [`PlacePoses`], a lazy walk over a regular
//! grid laid on the surface's local bounding box:
//!
//! 1. grid points at `resolution` spacing, rows along local Y, columns along
//!    local X, both starting at the bounding-box minimum;
//! 2. a point is kept when it lies inside the boundary at least
//!    `min_distance_from_edge` away from every edge;
//! 3. each kept point yields `num_heights + 1` candidates at local Z
//!    `height_above_table + k * delta_height`, lowest first;
//! 4. candidates are carried into the surface's parent frame through
//!    `Surface::pose`.
//!
//! | Entry point | Clearance from |
//! |------|------|
//! | [`generate_place_poses`]            | explicit [`PlaceParams`] |
//! | [`generate_place_poses_for_shape`]  | [`ObjectShape::clearance`] |
//! | [`generate_place_poses_by_name`]    | shape, after a registry lookup |

use semworld_perception::polygon::{bounding_box, coalesce_duplicates, normalize_winding, point_in_polygon};
use semworld_types::{PlacePoseCandidate, Point2, Quaternion, Surface, Transform3D, WorldError};
use tracing::warn;

use crate::registry::{SurfaceSet, unit_pose};
use crate::shape::ObjectShape;

/// Vertical step between stacked candidates used by the shape-based calls.
pub const DEFAULT_DELTA_HEIGHT: f64 = 0.01;

/// Extra heights above the first used by the shape-based calls.
pub const DEFAULT_NUM_HEIGHTS: usize = 2;

/// Grid points within this fraction of a cell of the far edge still count.
const GRID_SLACK: f64 = 1e-9;

/// Parameters of the grid-sampling algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceParams {
    pub resolution: f64,
    pub height_above_table: f64,
    pub delta_height: f64,
    pub num_heights: usize,
    pub min_distance_from_edge: f64,
}

impl PlaceParams {
    pub fn new(
        resolution: f64,
        height_above_table: f64,
        delta_height: f64,
        num_heights: usize,
        min_distance_from_edge: f64,
    ) -> Self {
        Self {
            resolution,
            height_above_table,
            delta_height,
            num_heights,
            min_distance_from_edge,
        }
    }

    /// Reject values that would silently distort the result.
    pub fn validate(&self) -> Result<(), WorldError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(WorldError::invalid(
                "resolution",
                format!("must be finite and > 0, got {}", self.resolution),
            ));
        }
        if !(self.height_above_table.is_finite() && self.height_above_table >= 0.0) {
            return Err(WorldError::invalid(
                "height_above_table",
                format!("must be finite and >= 0, got {}", self.height_above_table),
            ));
        }
        if !(self.delta_height.is_finite() && self.delta_height >= 0.0) {
            return Err(WorldError::invalid(
                "delta_height",
                format!("must be finite and >= 0, got {}", self.delta_height),
            ));
        }
        if !(self.min_distance_from_edge.is_finite() && self.min_distance_from_edge >= 0.0) {
            return Err(WorldError::invalid(
                "min_distance_from_edge",
                format!("must be finite and >= 0, got {}", self.min_distance_from_edge),
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PlacePoses
// ────────────────────────────────────────────────────────────────────────────

/// Lazy sequence of candidates over one surface.
///
/// Owns everything it needs, so it may outlive the surface and registry it
/// was built from.
#[derive(Debug, Clone)]
pub struct PlacePoses {
    outline: Vec<Point2>,
    pose: Transform3D,
    frame_id: String,
    orientation: Quaternion,
    params: PlaceParams,
    origin: Point2,
    columns: usize,
    rows: usize,
    /// `columns * rows`.
    cells: usize,
    /// Next grid cell to test, as a row-major index.
    cell: usize,
    /// Accepted point being emitted, and the next height index for it.
    current: Option<(Point2, usize)>,
}

fn grid_too_large(resolution: f64) -> WorldError {
    WorldError::invalid(
        "resolution",
        format!("{resolution} gives a grid with more cells than can be addressed"),
    )
}

/// Grid points along one axis of length `extent`.
fn grid_count(extent: f64, resolution: f64) -> Result<usize, WorldError> {
    let steps = (extent / resolution + GRID_SLACK).floor();
    if !steps.is_finite() || steps >= usize::MAX as f64 {
        return Err(grid_too_large(resolution));
    }
    (steps as usize).checked_add(1).ok_or_else(|| grid_too_large(resolution))
}

impl PlacePoses {
    fn new(surface: &Surface, orientation: Quaternion, params: PlaceParams) -> Result<Self, WorldError> {
        params.validate()?;
        let pose = unit_pose(surface)?;
        let orientation = orientation
            .try_normalized()
            .ok_or_else(|| WorldError::invalid("orientation", "norm must be finite and non-zero"))?;
        let outline = normalize_winding(&coalesce_duplicates(&surface.boundary)).map_err(|e| match e {
            WorldError::DegeneratePolygon(msg) => {
                WorldError::DegeneratePolygon(format!("surface `{}`: {msg}", surface.name))
            }
            other => other,
        })?;
        let (min, max) = bounding_box(&outline)
            .ok_or_else(|| WorldError::DegeneratePolygon(format!("surface `{}` has no boundary", surface.name)))?;

        let columns = grid_count(max.x - min.x, params.resolution)?;
        let rows = grid_count(max.y - min.y, params.resolution)?;
        let cells = columns
            .checked_mul(rows)
            .ok_or_else(|| grid_too_large(params.resolution))?;

        Ok(Self {
            columns,
            rows,
            cells,
            origin: min,
            outline,
            pose,
            frame_id: surface.header.frame_id.clone(),
            orientation: pose.rotation.mul(orientation),
            params,
            cell: 0,
            current: None,
        })
    }

    /// Number of grid cells, accepted or not.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    fn next_accepted_point(&mut self) -> Option<Point2> {
        while self.cell < self.cells {
            let (row, column) = (self.cell / self.columns, self.cell % self.columns);
            self.cell += 1;
            let point = Point2::new(
                self.origin.x + column as f64 * self.params.resolution,
                self.origin.y + row as f64 * self.params.resolution,
            );
            if point_in_polygon(point, &self.outline, self.params.min_distance_from_edge) {
                return Some(point);
            }
        }
        None
    }
}

impl Iterator for PlacePoses {
    type Item = PlacePoseCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        let (point, k) = match self.current {
            Some((point, k)) if k <= self.params.num_heights => (point, k),
            _ => (self.next_accepted_point()?, 0),
        };
        self.current = Some((point, k + 1));

        let z = self.params.height_above_table + k as f64 * self.params.delta_height;
        Some(PlacePoseCandidate {
            frame_id: self.frame_id.clone(),
            position: self.pose.transform_point(point.with_z(z)),
            orientation: self.orientation,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Lazy form of [`generate_place_poses`].
pub fn place_poses(
    surface: &Surface,
    orientation: Quaternion,
    params: PlaceParams,
) -> Result<PlacePoses, WorldError> {
    PlacePoses::new(surface, orientation, params)
}

/// Candidates over `surface` with explicit parameters.
///
/// `orientation` is expressed in the surface's local frame; every candidate
/// carries it composed with the surface rotation.
///
/// # Errors
///
/// - [`WorldError::InvalidParameter`] for a non-positive `resolution`, one so
///   small the grid cannot be addressed, a negative height or margin, or a
///   surface pose / orientation that cannot be normalised.
/// - [`WorldError::DegeneratePolygon`] when the boundary is unusable.
pub fn generate_place_poses(
    surface: &Surface,
    orientation: Quaternion,
    params: PlaceParams,
) -> Result<Vec<PlacePoseCandidate>, WorldError> {
    Ok(place_poses(surface, orientation, params)?.collect())
}

/// Candidates over `surface` for an object of `shape`, with clearance
/// inferred from the shape and the default height stack.
pub fn generate_place_poses_for_shape(
    surface: &Surface,
    shape: &ObjectShape,
    orientation: Quaternion,
    resolution: f64,
) -> Result<Vec<PlacePoseCandidate>, WorldError> {
    let clearance = shape.clearance(orientation)?;
    let params = PlaceParams::new(
        resolution,
        clearance.height_above_table,
        DEFAULT_DELTA_HEIGHT,
        DEFAULT_NUM_HEIGHTS,
        clearance.min_distance_from_edge,
    );
    generate_place_poses(surface, orientation, params)
}

/// Like [`generate_place_poses_for_shape`], resolving the surface by name in
/// `set`.  An unknown name is logged and yields no candidates.
pub fn generate_place_poses_by_name(
    set: &SurfaceSet,
    name: &str,
    shape: &ObjectShape,
    orientation: Quaternion,
    resolution: f64,
) -> Result<Vec<PlacePoseCandidate>, WorldError> {
    match set.get(name) {
        Some(entry) => generate_place_poses_for_shape(&entry.surface, shape, orientation, resolution),
        None => {
            warn!(surface = name, "no such surface; no place poses generated");
            Ok(Vec::new())
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use semworld_types::Vec3;

    const EPS: f64 = 1e-9;

    fn unit_square(pose: Transform3D) -> Surface {
        Surface::new(
            "table",
            "world",
            pose,
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
        )
    }

    #[test]
    fn unit_square_yields_nine_points_two_heights() {
        let surface = unit_square(Transform3D::identity());
        let poses = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(0.5, 0.1, 0.05, 1, 0.0),
        )
        .unwrap();

        assert_eq!(poses.len(), 18);
        let mut expected = Vec::new();
        for y in [0.0, 0.5, 1.0] {
            for x in [0.0, 0.5, 1.0] {
                for z in [0.10, 0.15] {
                    expected.push((x, y, z));
                }
            }
        }
        for (pose, (x, y, z)) in poses.iter().zip(expected) {
            assert!((pose.position.x - x).abs() < EPS);
            assert!((pose.position.y - y).abs() < EPS);
            assert!((pose.position.z - z).abs() < EPS);
            assert_eq!(pose.frame_id, "world");
            assert_eq!(pose.orientation, Quaternion::identity());
        }
    }

    #[test]
    fn candidates_are_carried_into_parent_frame() {
        let pose = Transform3D::new(Vec3::new(2.0, 3.0, 0.75), Quaternion::from_yaw(std::f64::consts::FRAC_PI_2));
        let surface = unit_square(pose);
        let poses = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(1.0, 0.0, 0.0, 0, 0.0),
        )
        .unwrap();

        // Local (1, 0) rotates onto parent +Y.
        assert_eq!(poses.len(), 4);
        assert!((poses[1].position.x - 2.0).abs() < EPS);
        assert!((poses[1].position.y - 4.0).abs() < EPS);
        assert!((poses[1].position.z - 0.75).abs() < EPS);
        assert_eq!(poses[1].orientation, pose.rotation);
    }

    #[test]
    fn clockwise_boundary_gives_same_candidates() {
        let ccw = unit_square(Transform3D::identity());
        let mut cw = ccw.clone();
        cw.boundary.reverse();
        let params = PlaceParams::new(0.25, 0.0, 0.01, 0, 0.1);
        assert_eq!(
            generate_place_poses(&ccw, Quaternion::identity(), params).unwrap(),
            generate_place_poses(&cw, Quaternion::identity(), params).unwrap()
        );
    }

    #[test]
    fn edge_margin_filter_is_monotone() {
        let surface = unit_square(Transform3D::identity());
        let mut previous = usize::MAX;
        for step in 0..=10 {
            let margin = step as f64 * 0.05;
            let count = generate_place_poses(
                &surface,
                Quaternion::identity(),
                PlaceParams::new(0.1, 0.0, 0.0, 0, margin),
            )
            .unwrap()
            .len();
            assert!(count <= previous, "margin {margin}: {count} > {previous}");
            previous = count;
        }
    }

    #[test]
    fn margin_rejects_points_near_edges() {
        let surface = unit_square(Transform3D::identity());
        let poses = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(0.5, 0.0, 0.0, 0, 0.2),
        )
        .unwrap();
        assert_eq!(poses.len(), 1);
        assert!((poses[0].position.x - 0.5).abs() < EPS);
        assert!((poses[0].position.y - 0.5).abs() < EPS);
    }

    #[test]
    fn concave_notch_is_skipped() {
        // U shape: the notch between the arms holds no candidates.
        let surface = Surface::new(
            "u",
            "world",
            Transform3D::identity(),
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(3.0, 0.0),
                Point2::new(3.0, 3.0),
                Point2::new(2.0, 3.0),
                Point2::new(2.0, 1.0),
                Point2::new(1.0, 1.0),
                Point2::new(1.0, 3.0),
                Point2::new(0.0, 3.0),
            ],
        );
        let poses = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(0.5, 0.0, 0.0, 0, 0.1),
        )
        .unwrap();
        assert!(!poses.is_empty());
        assert!(poses.iter().all(|p| !(p.position.x > 1.0 && p.position.x < 2.0 && p.position.y > 1.0)));
    }

    #[test]
    fn zero_heights_yields_one_candidate_per_point() {
        let surface = unit_square(Transform3D::identity());
        let poses = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(0.5, 0.2, 0.05, 0, 0.0),
        )
        .unwrap();
        assert_eq!(poses.len(), 9);
        assert!(poses.iter().all(|p| (p.position.z - 0.2).abs() < EPS));
    }

    #[test]
    fn non_positive_resolution_is_rejected() {
        let surface = unit_square(Transform3D::identity());
        for resolution in [0.0, -0.1, f64::NAN] {
            let err = generate_place_poses(
                &surface,
                Quaternion::identity(),
                PlaceParams::new(resolution, 0.0, 0.0, 0, 0.0),
            )
            .unwrap_err();
            assert!(matches!(err, WorldError::InvalidParameter { ref name, .. } if name == "resolution"));
        }
    }

    #[test]
    fn unaddressable_grid_is_rejected_not_walked() {
        let surface = unit_square(Transform3D::identity());
        for resolution in [f64::MIN_POSITIVE, 1e-10] {
            let err = place_poses(
                &surface,
                Quaternion::identity(),
                PlaceParams::new(resolution, 0.0, 0.0, 0, 0.0),
            )
            .unwrap_err();
            assert!(
                matches!(err, WorldError::InvalidParameter { ref name, .. } if name == "resolution"),
                "{resolution}: {err:?}"
            );
        }
    }

    #[test]
    fn fine_but_addressable_grid_is_accepted() {
        let surface = unit_square(Transform3D::identity());
        let poses = place_poses(&surface, Quaternion::identity(), PlaceParams::new(1e-6, 0.0, 0.0, 0, 0.0)).unwrap();
        assert_eq!(poses.grid_size(), (1_000_001, 1_000_001));
    }

    #[test]
    fn negative_height_above_table_is_rejected() {
        let surface = unit_square(Transform3D::identity());
        let err = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(0.5, -0.01, 0.0, 0, 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, WorldError::InvalidParameter { ref name, .. } if name == "height_above_table"));
    }

    #[test]
    fn scaled_surface_rotation_does_not_stretch_the_grid() {
        let scaled = Transform3D::new(Vec3::new(0.0, 0.0, 0.7), Quaternion::new(2.0, 0.0, 0.0, 0.0));
        let poses = generate_place_poses(
            &unit_square(scaled),
            Quaternion::new(3.0, 0.0, 0.0, 0.0),
            PlaceParams::new(1.0, 0.0, 0.0, 0, 0.0),
        )
        .unwrap();
        let last = poses.last().unwrap();
        assert!((last.position.x - 1.0).abs() < EPS);
        assert!((last.position.y - 1.0).abs() < EPS);
        assert!((last.position.z - 0.7).abs() < EPS);
        assert_eq!(last.orientation, Quaternion::identity());

        let zero = Transform3D::new(Vec3::zero(), Quaternion::new(0.0, 0.0, 0.0, 0.0));
        let err = generate_place_poses(
            &unit_square(zero),
            Quaternion::identity(),
            PlaceParams::new(1.0, 0.0, 0.0, 0, 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, WorldError::InvalidParameter { ref name, .. } if name == "pose"));
    }

    #[test]
    fn negative_delta_height_is_rejected() {
        let surface = unit_square(Transform3D::identity());
        assert!(generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(0.1, 0.0, -0.01, 1, 0.0),
        )
        .is_err());
    }

    #[test]
    fn surface_too_small_for_margin_is_empty() {
        let mut surface = unit_square(Transform3D::identity());
        surface.boundary = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.05, 0.0),
            Point2::new(0.05, 0.05),
            Point2::new(0.0, 0.05),
        ];
        let poses = generate_place_poses(
            &surface,
            Quaternion::identity(),
            PlaceParams::new(1.0, 0.0, 0.0, 0, 0.01),
        )
        .unwrap();
        assert!(poses.is_empty());
    }

    #[test]
    fn iterator_is_lazy_and_reports_grid() {
        let surface = unit_square(Transform3D::identity());
        let mut poses = place_poses(&surface, Quaternion::identity(), PlaceParams::new(0.5, 0.0, 0.1, 2, 0.0)).unwrap();
        assert_eq!(poses.grid_size(), (3, 3));
        let first: Vec<_> = poses.by_ref().take(3).collect();
        assert!((first[2].position.z - 0.2).abs() < EPS);
        assert_eq!(poses.count(), 24);
    }

    #[test]
    fn shape_based_call_uses_clearance_and_defaults() {
        let surface = unit_square(Transform3D::identity());
        let shape = ObjectShape::Box { size: Vec3::new(0.2, 0.2, 0.1) };
        let poses = generate_place_poses_for_shape(&surface, &shape, Quaternion::identity(), 0.1).unwrap();
        // Margin 0.1 keeps x, y in [0.1, 0.9]: 9 x 9 points, 3 heights each.
        assert_eq!(poses.len(), 81 * 3);
        assert!((poses[0].position.z - 0.05).abs() < EPS);
        assert!((poses[2].position.z - 0.07).abs() < EPS);
    }

    #[test]
    fn unknown_name_yields_nothing() {
        let set = SurfaceSet::build(vec![unit_square(Transform3D::identity())]).unwrap();
        let shape = ObjectShape::Sphere { radius: 0.05 };
        let poses = generate_place_poses_by_name(&set, "missing", &shape, Quaternion::identity(), 0.1).unwrap();
        assert!(poses.is_empty());
        let found = generate_place_poses_by_name(&set, "table", &shape, Quaternion::identity(), 0.1).unwrap();
        assert!(!found.is_empty());
    }
}
