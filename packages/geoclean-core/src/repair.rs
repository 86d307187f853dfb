//! Make-valid repair for broken polygons.
//!
//! Invalid input is re-noded through a boolean overlay against an empty
//! operand, which resolves self-intersections into separate faces. Rings that
//! come back pinched at a repeated vertex are split into their loops.

use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};

use crate::models::Surface;
use crate::validity::{is_valid_polygon, is_valid_surface};

/// Returns `surface` untouched when valid, a valid replacement (possibly of a
/// different variant) when one exists, and `None` when no valid area remains.
pub fn repair(surface: Surface) -> Option<Surface> {
    if is_valid_surface(&surface) {
        return Some(surface);
    }

    let kind = surface.kind();
    let subject = match surface {
        Surface::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
        Surface::MultiPolygon(multi) => multi,
    };
    let resolved = subject.union(&MultiPolygon::new(Vec::new()));

    let parts: Vec<Polygon<f64>> = resolved
        .0
        .into_iter()
        .flat_map(split_pinches)
        .filter(|polygon| polygon.unsigned_area() > 0.0)
        .collect();
    let repaired = Surface::from_parts(parts)?;

    if is_valid_surface(&repaired) {
        Some(repaired)
    } else {
        tracing::debug!(kind, "overlay output still invalid, dropping geometry");
        None
    }
}

fn split_pinches(polygon: Polygon<f64>) -> Vec<Polygon<f64>> {
    if is_valid_polygon(&polygon) {
        return vec![polygon];
    }
    let (exterior, interiors) = polygon.into_inner();
    let shells: Vec<Polygon<f64>> = split_pinched_ring(&exterior)
        .into_iter()
        .map(|ring| Polygon::new(ring, Vec::new()))
        .collect();

    let mut holes_per_shell: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for hole in interiors.iter().flat_map(split_pinched_ring) {
        let owner = shells.iter().position(|shell| {
            hole.0
                .iter()
                .any(|coord| shell.coordinate_position(coord) == CoordPos::Inside)
        });
        if let Some(index) = owner {
            holes_per_shell[index].push(hole);
        }
    }

    shells
        .into_iter()
        .zip(holes_per_shell)
        .map(|(shell, holes)| Polygon::new(shell.into_inner().0, holes))
        .collect()
}

/// Splits a ring that revisits a vertex into one closed ring per loop.
pub fn split_pinched_ring(ring: &LineString<f64>) -> Vec<LineString<f64>> {
    let points = &ring.0;
    let open = match points.split_last() {
        Some((last, rest)) if !rest.is_empty() && rest[0] == *last => rest,
        _ => &points[..],
    };

    let mut loops = Vec::new();
    let mut stack: Vec<Coord<f64>> = Vec::with_capacity(open.len());
    for &coord in open {
        if let Some(start) = stack.iter().position(|seen| *seen == coord) {
            let mut closed = stack.split_off(start);
            closed.push(coord);
            if closed.len() >= 4 {
                loops.push(LineString::new(closed));
            }
        }
        stack.push(coord);
    }
    if stack.len() >= 3 {
        stack.push(stack[0]);
        loops.push(LineString::new(stack));
    }
    loops
}
