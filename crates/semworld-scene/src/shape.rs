//! Object shapes and the placement clearance they imply.
//!
//! A shape is described in its own frame, centred on the object origin, with
//! the axis of cylinders and cones along local Z.  [`ObjectShape::clearance`]
//! rotates the shape by the orientation the object will be placed with and
//! reads the clearance off the resulting axis-aligned extents.

use semworld_types::{Quaternion, Vec3, WorldError};
use serde::{Deserialize, Serialize};

/// Bounding geometry of an object to be placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectShape {
    /// Full edge lengths along X, Y and Z.
    Box { size: Vec3 },
    Sphere { radius: f64 },
    Cylinder { radius: f64, length: f64 },
    /// Base disk at `-length / 2`, apex at `+length / 2`.
    Cone { radius: f64, length: f64 },
    Mesh { vertices: Vec<Vec3> },
}

/// Height and edge margin needed to rest an object on a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clearance {
    /// Distance from the object origin down to its lowest point.
    pub height_above_table: f64,
    /// Half the larger horizontal extent of the object.
    pub min_distance_from_edge: f64,
}

fn positive(name: &str, value: f64) -> Result<(), WorldError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(WorldError::invalid(name, format!("must be finite and > 0, got {value}")))
    }
}

/// Per-axis `(min, max)` of a shape after rotation.
type Extents = [(f64, f64); 3];

fn component(v: Vec3, axis: usize) -> f64 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

fn extents_of_points(points: impl IntoIterator<Item = Vec3>) -> Option<Extents> {
    let mut out: Option<Extents> = None;
    for p in points {
        let e = out.get_or_insert([(f64::INFINITY, f64::NEG_INFINITY); 3]);
        for (axis, (lo, hi)) in e.iter_mut().enumerate() {
            let c = component(p, axis);
            *lo = lo.min(c);
            *hi = hi.max(c);
        }
    }
    out
}

/// Extents of a disk of `radius` centred at `centre` whose normal is the
/// unit vector `axis`.
fn disk_extents(centre: Vec3, axis: Vec3, radius: f64) -> Extents {
    let mut out = [(0.0, 0.0); 3];
    for (i, slot) in out.iter_mut().enumerate() {
        let a = component(axis, i);
        let reach = radius * (1.0 - a * a).max(0.0).sqrt();
        let c = component(centre, i);
        *slot = (c - reach, c + reach);
    }
    out
}

fn merge(a: Extents, b: Extents) -> Extents {
    let mut out = a;
    for (slot, (lo, hi)) in out.iter_mut().zip(b) {
        slot.0 = slot.0.min(lo);
        slot.1 = slot.1.max(hi);
    }
    out
}

impl ObjectShape {
    /// Check that every dimension is usable.
    pub fn validate(&self) -> Result<(), WorldError> {
        match self {
            Self::Box { size } => {
                positive("size.x", size.x)?;
                positive("size.y", size.y)?;
                positive("size.z", size.z)
            }
            Self::Sphere { radius } => positive("radius", *radius),
            Self::Cylinder { radius, length } | Self::Cone { radius, length } => {
                positive("radius", *radius)?;
                positive("length", *length)
            }
            Self::Mesh { vertices } => {
                if vertices.is_empty() {
                    return Err(WorldError::invalid("vertices", "mesh has no vertices"));
                }
                if vertices
                    .iter()
                    .any(|v| !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite()))
                {
                    return Err(WorldError::invalid("vertices", "mesh has a non-finite vertex"));
                }
                Ok(())
            }
        }
    }

    /// Axis-aligned extents of the shape rotated by `orientation`.
    fn extents(&self, orientation: Quaternion) -> Result<Extents, WorldError> {
        self.validate()?;
        let q = orientation
            .try_normalized()
            .ok_or_else(|| WorldError::invalid("orientation", "norm must be finite and non-zero"))?;
        let extents = match self {
            Self::Box { size } => {
                let h = size.scale(0.5);
                let corners = (0..8).map(|i| {
                    let sx = if i & 1 == 0 { -h.x } else { h.x };
                    let sy = if i & 2 == 0 { -h.y } else { h.y };
                    let sz = if i & 4 == 0 { -h.z } else { h.z };
                    q.rotate(Vec3::new(sx, sy, sz))
                });
                extents_of_points(corners)
            }
            Self::Sphere { radius } => Some([(-radius, *radius); 3]),
            Self::Cylinder { radius, length } => {
                let axis = q.rotate(Vec3::new(0.0, 0.0, 1.0));
                let half = axis.scale(length * 0.5);
                Some(merge(
                    disk_extents(half, axis, *radius),
                    disk_extents(half.scale(-1.0), axis, *radius),
                ))
            }
            Self::Cone { radius, length } => {
                let axis = q.rotate(Vec3::new(0.0, 0.0, 1.0));
                let apex = axis.scale(length * 0.5);
                Some(merge(
                    disk_extents(apex.scale(-1.0), axis, *radius),
                    disk_extents(apex, axis, 0.0),
                ))
            }
            Self::Mesh { vertices } => extents_of_points(vertices.iter().map(|v| q.rotate(*v))),
        };
        extents.ok_or_else(|| WorldError::invalid("shape", "no extreme points"))
    }

    /// Clearance for placing this shape with `orientation`.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidParameter`] for non-positive dimensions, an empty
    /// mesh, an unusable orientation, or a shape lying entirely above its
    /// origin once rotated.
    pub fn clearance(&self, orientation: Quaternion) -> Result<Clearance, WorldError> {
        let [(x_lo, x_hi), (y_lo, y_hi), (z_lo, _)] = self.extents(orientation)?;
        if z_lo > 0.0 {
            return Err(WorldError::invalid(
                "shape",
                format!("lowest point is {z_lo} above the origin; the origin must not sit below the shape"),
            ));
        }
        Ok(Clearance {
            height_above_table: -z_lo,
            min_distance_from_edge: 0.5 * (x_hi - x_lo).max(y_hi - y_lo),
        })
    }
}
