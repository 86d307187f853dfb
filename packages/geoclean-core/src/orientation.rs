use geo::orient::{Direction, Orient};
use geo::LineString;

use crate::models::Surface;

/// Rewrites ring order so shells are counter-clockwise and holes clockwise.
/// Vertices are only reversed, never added or removed, and a second pass is a
/// no-op.
pub fn enforce_orientation(surface: Surface) -> Surface {
    match surface {
        Surface::Polygon(polygon) => Surface::Polygon(polygon.orient(Direction::Default)),
        Surface::MultiPolygon(multi) => Surface::MultiPolygon(multi.orient(Direction::Default)),
    }
}

/// Shoelace area of a ring: positive for counter-clockwise, negative for clockwise.
pub fn ring_signed_area(ring: &LineString<f64>) -> f64 {
    let points = &ring.0;
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    area * 0.5
}
