//! Planar surface geometry.
//!
//! Every function here works on a boundary polygon in a surface's local XY
//! plane and is free of side effects.
//!
//! | Function | Role |
//! |------|------|
//! | [`normalize_winding`]  | Reorder a polygon of unknown winding to counter-clockwise. |
//! | [`ensure_simple`]      | Reject self-intersecting boundaries.                          |
//! | [`point_in_polygon`]   | Containment with an inward edge margin.                      |
//! | [`triangulate`]        | Ear-clipping triangulation of a simple (possibly concave) polygon. |
//! | [`extrude_solid`]      | Closed solid mesh from a boundary and a thickness.           |
//!
//! # Example
//!
//! ```rust
//! use semworld_perception::polygon::{normalize_winding, point_in_polygon, signed_area};
//! use semworld_types::Point2;
//!
//! // Clockwise input, as some segmenters emit it.
//! let cw = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(0.0, 1.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(1.0, 0.0),
//! ];
//! let ccw = normalize_winding(&cw).unwrap();
//! assert!(signed_area(&ccw) > 0.0);
//!
//! assert!(point_in_polygon(Point2::new(0.5, 0.5), &ccw, 0.2));
//! assert!(!point_in_polygon(Point2::new(0.1, 0.5), &ccw, 0.2));
//! ```

use semworld_types::{Mesh, Point2, Vec3, WorldError};
use tracing::trace;

/// Polygons whose |signed area| is at or below this are degenerate.
pub const AREA_EPSILON: f64 = 1e-12;

/// Distances at or below this count as "on the boundary".
pub const DISTANCE_EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Basic measures
// ────────────────────────────────────────────────────────────────────────────

/// Shoelace signed area: positive for counter-clockwise winding.
pub fn signed_area(polygon: &[Point2]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| polygon[i].cross(polygon[(i + 1) % n]))
        .sum();
    twice * 0.5
}

/// Axis-aligned bounds as `(min, max)`, or `None` for an empty polygon.
pub fn bounding_box(polygon: &[Point2]) -> Option<(Point2, Point2)> {
    let first = *polygon.first()?;
    Some(polygon.iter().fold((first, first), |(lo, hi), p| {
        (
            Point2::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point2::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    }))
}

/// Euclidean distance from `p` to the segment `a`–`b`.
pub fn distance_to_segment(p: Point2, a: Point2, b: Point2) -> f64 {
    let ab = b.sub(a);
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (p.sub(a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(Point2::new(a.x + ab.x * t, a.y + ab.y * t))
}

/// Smallest distance from `p` to any edge of the closed polygon.
pub fn distance_to_boundary(p: Point2, polygon: &[Point2]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| distance_to_segment(p, polygon[i], polygon[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

// ────────────────────────────────────────────────────────────────────────────
// Ingestion helpers
// ────────────────────────────────────────────────────────────────────────────

/// Drop consecutive duplicate vertices, including a trailing copy of the
/// first vertex (closed-ring input).
pub fn coalesce_duplicates(polygon: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(polygon.len());
    for &p in polygon {
        if out.last().is_some_and(|&q| q.distance(p) <= DISTANCE_EPSILON) {
            continue;
        }
        out.push(p);
    }
    while out.len() > 1 && out[0].distance(out[out.len() - 1]) <= DISTANCE_EPSILON {
        out.pop();
    }
    out
}

fn segments_intersect(p1: Point2, p2: Point2, q1: Point2, q2: Point2) -> bool {
    let on_segment = |a: Point2, b: Point2, p: Point2| distance_to_segment(p, a, b) <= DISTANCE_EPSILON;
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    on_segment(q1, q2, p1) || on_segment(q1, q2, p2) || on_segment(p1, p2, q1) || on_segment(p1, p2, q2)
}

/// Reject boundaries where two non-adjacent edges touch or cross.
///
/// # Errors
///
/// [`WorldError::DegeneratePolygon`] naming the first offending edge pair.
pub fn ensure_simple(polygon: &[Point2]) -> Result<(), WorldError> {
    let n = polygon.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // The first and last edges share vertex 0.
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a1, a2) = (polygon[i], polygon[(i + 1) % n]);
            let (b1, b2) = (polygon[j], polygon[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return Err(WorldError::DegeneratePolygon(format!(
                    "edges {i} and {j} intersect"
                )));
            }
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Winding
// ────────────────────────────────────────────────────────────────────────────

/// Return `polygon` wound counter-clockwise (positive signed area).
///
/// Already counter-clockwise input is returned unchanged, so the operation is
/// idempotent.
///
/// # Errors
///
/// [`WorldError::DegeneratePolygon`] when the polygon has fewer than three
/// vertices or its signed area is within [`AREA_EPSILON`] of zero.
pub fn normalize_winding(polygon: &[Point2]) -> Result<Vec<Point2>, WorldError> {
    if polygon.len() < 3 {
        return Err(WorldError::DegeneratePolygon(format!(
            "{} vertices, need at least 3",
            polygon.len()
        )));
    }
    let area = signed_area(polygon);
    if !area.is_finite() || area.abs() <= AREA_EPSILON {
        return Err(WorldError::DegeneratePolygon(format!(
            "signed area {area} is zero or not finite"
        )));
    }
    let mut out = polygon.to_vec();
    if area < 0.0 {
        out.reverse();
    }
    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Containment
// ────────────────────────────────────────────────────────────────────────────

/// Crossing-number test; the result on the boundary itself is unspecified.
fn crossing_number_inside(p: Point2, polygon: &[Point2]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let intersect_x = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True when `point` lies inside `polygon` and at least `tolerance` away
/// from every edge.
///
/// Points on the boundary count as inside when `tolerance <= 0`.  Works for
/// concave polygons and either winding; degenerate input (fewer than three
/// vertices) contains nothing.
pub fn point_in_polygon(point: Point2, polygon: &[Point2], tolerance: f64) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let edge_distance = distance_to_boundary(point, polygon);
    let on_boundary = edge_distance <= DISTANCE_EPSILON;
    if !on_boundary && !crossing_number_inside(point, polygon) {
        return false;
    }
    edge_distance + DISTANCE_EPSILON >= tolerance
}

// ────────────────────────────────────────────────────────────────────────────
// Triangulation
// ────────────────────────────────────────────────────────────────────────────

fn orient(a: Point2, b: Point2, c: Point2) -> f64 {
    b.sub(a).cross(c.sub(a))
}

/// Inclusive point-in-triangle for a counter-clockwise triangle.
fn in_triangle(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    orient(a, b, p) >= -AREA_EPSILON
        && orient(b, c, p) >= -AREA_EPSILON
        && orient(c, a, p) >= -AREA_EPSILON
}

fn is_ear(polygon: &[Point2], ring: &[usize], prev: usize, curr: usize, next: usize) -> bool {
    let (a, b, c) = (polygon[ring[prev]], polygon[ring[curr]], polygon[ring[next]]);
    if orient(a, b, c) <= AREA_EPSILON {
        return false;
    }
    ring.iter().enumerate().all(|(k, &v)| {
        if k == prev || k == curr || k == next {
            return true;
        }
        let p = polygon[v];
        p == a || p == b || p == c || !in_triangle(p, a, b, c)
    })
}

/// Ear-clipping triangulation of a counter-clockwise simple polygon.
///
/// Returns `n - 2` triangles indexing into `polygon`, each wound
/// counter-clockwise.  Concave input is handled; pass the output of
/// [`normalize_winding`].
///
/// # Errors
///
/// [`WorldError::DegeneratePolygon`] when fewer than three vertices are given
/// or no ear can be found (clockwise or self-intersecting input).
pub fn triangulate(polygon: &[Point2]) -> Result<Vec<[usize; 3]>, WorldError> {
    let n = polygon.len();
    if n < 3 {
        return Err(WorldError::DegeneratePolygon(format!(
            "{n} vertices, need at least 3"
        )));
    }

    let mut ring: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while ring.len() > 3 {
        let m = ring.len();
        let neighbours = |i: usize| ((i + m - 1) % m, (i + 1) % m);

        let ear = (0..m).find(|&i| {
            let (prev, next) = neighbours(i);
            is_ear(polygon, &ring, prev, i, next)
        });
        // A collinear vertex can always be clipped as a zero-area triangle.
        let clip = ear.or_else(|| {
            (0..m).find(|&i| {
                let (prev, next) = neighbours(i);
                orient(polygon[ring[prev]], polygon[ring[i]], polygon[ring[next]]).abs()
                    <= AREA_EPSILON
            })
            .inspect(|&i| trace!(vertex = ring[i], "clipping collinear vertex"))
        });

        let Some(i) = clip else {
            return Err(WorldError::DegeneratePolygon(
                "no ear found: polygon is clockwise or self-intersecting".to_string(),
            ));
        };
        let (prev, next) = neighbours(i);
        triangles.push([ring[prev], ring[i], ring[next]]);
        ring.remove(i);
    }

    triangles.push([ring[0], ring[1], ring[2]]);
    Ok(triangles)
}

// ────────────────────────────────────────────────────────────────────────────
// Extrusion
// ────────────────────────────────────────────────────────────────────────────

/// Build a closed solid from a planar boundary.
///
/// The top face is the boundary itself at local Z = 0; the bottom face is
/// the same boundary `thickness` below it, so the solid hangs beneath the
/// support plane.  Vertex `i` is the `i`-th vertex of the normalised boundary
/// on the top face and vertex `n + i` its copy on the bottom face.  The mesh
/// has `2n` vertices and `2(n - 2) + 2n` triangles, all wound outward.
///
/// # Errors
///
/// - [`WorldError::InvalidThickness`] unless `thickness` is finite and > 0.
/// - [`WorldError::DegeneratePolygon`] when the boundary cannot be
///   normalised or triangulated.
pub fn extrude_solid(boundary: &[Point2], thickness: f64) -> Result<Mesh, WorldError> {
    if !(thickness.is_finite() && thickness > 0.0) {
        return Err(WorldError::InvalidThickness(thickness));
    }
    let polygon = normalize_winding(boundary)?;
    let face = triangulate(&polygon)?;
    let n = polygon.len();

    let mut vertices: Vec<Vec3> = Vec::with_capacity(2 * n);
    vertices.extend(polygon.iter().map(|p| p.with_z(0.0)));
    vertices.extend(polygon.iter().map(|p| p.with_z(-thickness)));

    let mut triangles: Vec<[usize; 3]> = Vec::with_capacity(2 * face.len() + 2 * n);
    // Top face looks up (+Z), bottom face looks down.
    triangles.extend(face.iter().copied());
    triangles.extend(face.iter().map(|&[a, b, c]| [a + n, c + n, b + n]));
    // Side band: one quad per boundary edge.
    for i in 0..n {
        let j = (i + 1) % n;
        triangles.push([i, i + n, j + n]);
        triangles.push([i, j + n, j]);
    }

    Ok(Mesh {
        vertices,
        triangles,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point2> {
        raw.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    fn unit_square() -> Vec<Point2> {
        pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    /// Concave "L": the notch is the square [1,2]×[1,2].
    fn l_shape() -> Vec<Point2> {
        pts(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)])
    }

    fn triangle_area(polygon: &[Point2], t: [usize; 3]) -> f64 {
        orient(polygon[t[0]], polygon[t[1]], polygon[t[2]]) * 0.5
    }

    fn signed_volume(mesh: &Mesh) -> f64 {
        mesh.triangles
            .iter()
            .map(|&[a, b, c]| {
                let (va, vb, vc) = (mesh.vertices[a], mesh.vertices[b], mesh.vertices[c]);
                va.dot(vb.cross(vc)) / 6.0
            })
            .sum()
    }

    // ── winding ─────────────────────────────────────────────────────────────

    #[test]
    fn clockwise_input_is_reversed() {
        let mut cw = unit_square();
        cw.reverse();
        assert!(signed_area(&cw) < 0.0);
        let ccw = normalize_winding(&cw).unwrap();
        assert!((signed_area(&ccw) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_winding(&l_shape()).unwrap();
        let twice = normalize_winding(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, l_shape());
    }

    #[test]
    fn collinear_input_is_degenerate() {
        let line = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(matches!(
            normalize_winding(&line),
            Err(WorldError::DegeneratePolygon(_))
        ));
    }

    #[test]
    fn too_few_vertices_is_degenerate() {
        let two = pts(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(matches!(
            normalize_winding(&two),
            Err(WorldError::DegeneratePolygon(_))
        ));
    }

    #[test]
    fn coalesce_drops_repeats_and_closing_vertex() {
        let raw = pts(&[(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(
            coalesce_duplicates(&raw),
            pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])
        );
    }

    #[test]
    fn bow_tie_is_not_simple() {
        let bow_tie = pts(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(matches!(ensure_simple(&bow_tie), Err(WorldError::DegeneratePolygon(_))));
        assert!(ensure_simple(&l_shape()).is_ok());
        assert!(ensure_simple(&unit_square()).is_ok());
    }

    // ── containment ─────────────────────────────────────────────────────────

    #[test]
    fn interior_point_is_inside() {
        assert!(point_in_polygon(Point2::new(0.5, 0.5), &unit_square(), 0.0));
    }

    #[test]
    fn boundary_points_inside_only_without_margin() {
        let sq = unit_square();
        for p in [Point2::new(0.0, 0.0), Point2::new(0.5, 0.0), Point2::new(1.0, 1.0)] {
            assert!(point_in_polygon(p, &sq, 0.0), "{p:?} should be on the boundary");
            assert!(!point_in_polygon(p, &sq, 0.01), "{p:?} is closer than the margin");
        }
    }

    #[test]
    fn margin_rejects_points_near_an_edge() {
        let sq = unit_square();
        assert!(!point_in_polygon(Point2::new(0.05, 0.5), &sq, 0.1));
        assert!(point_in_polygon(Point2::new(0.15, 0.5), &sq, 0.1));
        assert!(point_in_polygon(Point2::new(0.5, 0.5), &sq, 0.5));
        assert!(!point_in_polygon(Point2::new(0.5, 0.5), &sq, 0.51));
    }

    #[test]
    fn concave_notch_is_outside() {
        let l = l_shape();
        assert!(!point_in_polygon(Point2::new(1.5, 1.5), &l, 0.0));
        assert!(point_in_polygon(Point2::new(0.5, 1.5), &l, 0.0));
        assert!(point_in_polygon(Point2::new(1.5, 0.5), &l, 0.0));
    }

    #[test]
    fn either_winding_gives_same_answer() {
        let mut cw = l_shape();
        cw.reverse();
        for p in [Point2::new(0.5, 1.5), Point2::new(1.5, 1.5), Point2::new(0.3, 0.3)] {
            assert_eq!(
                point_in_polygon(p, &cw, 0.1),
                point_in_polygon(p, &l_shape(), 0.1)
            );
        }
    }

    #[test]
    fn outside_bounding_box_is_never_inside() {
        let l = l_shape();
        let outside = [
            Point2::new(-0.01, 1.0),
            Point2::new(2.5, 0.5),
            Point2::new(1.0, -3.0),
            Point2::new(0.5, 2.0001),
        ];
        for p in outside {
            for tol in [-1.0, 0.0, 0.1, 10.0] {
                assert!(!point_in_polygon(p, &l, tol), "{p:?} tol={tol}");
            }
        }
    }

    #[test]
    fn distance_to_segment_clamps_to_endpoints() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        assert!((distance_to_segment(Point2::new(2.0, 0.0), a, b) - 1.0).abs() < 1e-12);
        assert!((distance_to_segment(Point2::new(0.5, 0.3), a, b) - 0.3).abs() < 1e-12);
    }

    // ── triangulation ───────────────────────────────────────────────────────

    #[test]
    fn square_triangulates_into_two() {
        let sq = unit_square();
        let tris = triangulate(&sq).unwrap();
        assert_eq!(tris.len(), 2);
        let area: f64 = tris.iter().map(|&t| triangle_area(&sq, t)).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn concave_polygon_triangulation_covers_exact_area() {
        let l = l_shape();
        let tris = triangulate(&l).unwrap();
        assert_eq!(tris.len(), l.len() - 2);
        for &t in &tris {
            assert!(triangle_area(&l, t) > 0.0, "triangle {t:?} is not CCW");
        }
        let area: f64 = tris.iter().map(|&t| triangle_area(&l, t)).sum();
        assert!((area - 3.0).abs() < 1e-12, "area {area}");
    }

    #[test]
    fn collinear_vertex_still_yields_n_minus_two() {
        let sq = pts(&[(0.0, 0.0), (0.5, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let tris = triangulate(&sq).unwrap();
        assert_eq!(tris.len(), 3);
        let area: f64 = tris.iter().map(|&t| triangle_area(&sq, t)).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clockwise_input_has_no_ears() {
        let mut cw = l_shape();
        cw.reverse();
        assert!(matches!(triangulate(&cw), Err(WorldError::DegeneratePolygon(_))));
    }

    // ── extrusion ───────────────────────────────────────────────────────────

    #[test]
    fn extruded_square_counts() {
        let mesh = extrude_solid(&unit_square(), 0.1).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 2 * 2 + 2 * 4);
    }

    #[test]
    fn extruded_concave_counts_and_volume() {
        let mut cw = l_shape();
        cw.reverse();
        let mesh = extrude_solid(&cw, 0.05).unwrap();
        assert_eq!(mesh.vertex_count(), 2 * 6);
        assert_eq!(mesh.triangle_count(), 2 * 4 + 2 * 6);
        // Outward winding gives a positive volume equal to area × thickness.
        assert!((signed_volume(&mesh) - 3.0 * 0.05).abs() < 1e-9);
    }

    #[test]
    fn extruded_mesh_is_closed_and_consistently_wound() {
        let mesh = extrude_solid(&l_shape(), 0.2).unwrap();
        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for &[a, b, c] in &mesh.triangles {
            for e in [(a, b), (b, c), (c, a)] {
                *directed.entry(e).or_default() += 1;
            }
        }
        for (&(a, b), &count) in &directed {
            assert_eq!(count, 1, "edge {a}->{b} used twice in the same direction");
            assert_eq!(directed.get(&(b, a)), Some(&1), "edge {a}->{b} has no twin");
        }
    }

    #[test]
    fn top_face_stays_on_support_plane() {
        let mesh = extrude_solid(&unit_square(), 0.3).unwrap();
        assert!(mesh.vertices[..4].iter().all(|v| v.z == 0.0));
        assert!(mesh.vertices[4..].iter().all(|v| (v.z + 0.3).abs() < 1e-12));
    }

    #[test]
    fn non_positive_thickness_is_rejected() {
        for t in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                extrude_solid(&unit_square(), t),
                Err(WorldError::InvalidThickness(_))
            ));
        }
    }
}
