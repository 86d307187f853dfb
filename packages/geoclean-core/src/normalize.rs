//! Coordinate rounding and near-duplicate vertex removal.

use geo::{Coord, LineString, MapCoords, MultiPolygon, Polygon};

use crate::models::Surface;
use crate::validity::{distinct_vertex_count, is_valid_polygon};

/// Rounds half away from zero to `precision` decimal digits. Idempotent.
pub fn round_value(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // fold -0.0 into 0.0 so equal points compare equal bit-for-bit
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn round_coord(coord: Coord<f64>, precision: u32) -> Coord<f64> {
    Coord {
        x: round_value(coord.x, precision),
        y: round_value(coord.y, precision),
    }
}

/// Rounds every vertex independently on each axis.
pub fn round_coordinates(surface: &Surface, precision: u32) -> Surface {
    let round = move |coord: Coord<f64>| round_coord(coord, precision);
    match surface {
        Surface::Polygon(polygon) => Surface::Polygon(polygon.map_coords(round)),
        Surface::MultiPolygon(multi) => Surface::MultiPolygon(multi.map_coords(round)),
    }
}

// Per-axis closeness, not a Euclidean distance
fn is_close(a: Coord<f64>, b: Coord<f64>, tolerance: f64) -> bool {
    (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance
}

/// Drops vertices that are within `tolerance` (per axis) of the previously
/// kept vertex, rounds the survivors and closes the ring when the last kept
/// vertex differs from the first. Returns `None` when fewer than three
/// distinct vertices remain.
pub fn clean_ring(ring: &LineString<f64>, tolerance: f64, precision: u32) -> Option<LineString<f64>> {
    let points = &ring.0;
    // Walk the open ring, leaving out the closing repeat
    let open = match points.split_last() {
        Some((last, rest)) if !rest.is_empty() && rest[0] == *last => rest,
        _ => &points[..],
    };

    let mut kept: Vec<Coord<f64>> = Vec::with_capacity(open.len() + 1);
    // Closeness is tested on raw input against the raw previously kept point
    let mut previous: Option<Coord<f64>> = None;
    for &point in open {
        if let Some(previous) = previous {
            if is_close(point, previous, tolerance) {
                continue;
            }
        }
        previous = Some(point);
        kept.push(round_coord(point, precision));
    }

    if distinct_vertex_count(&kept) < 3 {
        return None;
    }
    if kept.first() != kept.last() {
        kept.push(kept[0]);
    }
    Some(LineString::new(kept))
}

/// Cleans the shell and every hole. A broken shell drops the polygon, broken
/// holes are dropped on their own, and a rebuilt polygon that is no longer
/// structurally valid drops the polygon.
pub fn clean_polygon(polygon: &Polygon<f64>, tolerance: f64, precision: u32) -> Option<Polygon<f64>> {
    let exterior = clean_ring(polygon.exterior(), tolerance, precision)?;
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .filter_map(|hole| clean_ring(hole, tolerance, precision))
        .collect();
    let cleaned = Polygon::new(exterior, interiors);
    if is_valid_polygon(&cleaned) {
        Some(cleaned)
    } else {
        None
    }
}

pub fn clean_multi_polygon(
    multi: &MultiPolygon<f64>,
    tolerance: f64,
    precision: u32,
) -> Option<MultiPolygon<f64>> {
    let parts: Vec<Polygon<f64>> = multi
        .0
        .iter()
        .filter_map(|polygon| clean_polygon(polygon, tolerance, precision))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(parts))
    }
}

pub fn clean_surface(surface: &Surface, tolerance: f64, precision: u32) -> Option<Surface> {
    match surface {
        Surface::Polygon(polygon) => clean_polygon(polygon, tolerance, precision).map(Surface::Polygon),
        Surface::MultiPolygon(multi) => {
            clean_multi_polygon(multi, tolerance, precision).map(Surface::MultiPolygon)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn coords(ring: &LineString<f64>) -> Vec<(f64, f64)> {
        ring.0.iter().map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn rounding_is_idempotent() {
        for &value in &[1.23456789, -0.0004999, 512_345.678_9, 9_876_543.210_5, 0.1 + 0.2] {
            for precision in 0..8 {
                let once = round_value(value, precision);
                assert_eq!(round_value(once, precision), once);
            }
        }
        assert_eq!(round_value(2.5, 0), 3.0);
        assert_eq!(round_value(-2.5, 0), -3.0);
        assert_eq!(round_value(1.23456, 3), 1.235);
        assert!(round_value(-0.0001, 2).is_sign_positive());
    }

    #[test]
    fn round_coordinates_touches_every_vertex() {
        let surface = Surface::Polygon(polygon![
            (x: 0.12345, y: 0.98765),
            (x: 10.55555, y: 0.0),
            (x: 10.0, y: 10.44444),
        ]);
        let Surface::Polygon(rounded) = round_coordinates(&surface, 2) else {
            panic!("variant changed");
        };
        assert_eq!(
            coords(rounded.exterior()),
            vec![(0.12, 0.99), (10.56, 0.0), (10.0, 10.44), (0.12, 0.99)]
        );
    }

    #[test]
    fn near_duplicate_vertices_collapse() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (1.00001, 2.00001),
            (1.00002, 2.00002),
            (3.0, 0.0),
            (0.0, 0.0),
        ]);
        let cleaned = clean_ring(&ring, 0.001, 6).unwrap();
        assert_eq!(
            coords(&cleaned),
            vec![(0.0, 0.0), (1.00001, 2.00001), (3.0, 0.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn closeness_is_per_axis_not_euclidean() {
        // 0.0009 on both axes is ~0.00127 apart, still close per axis
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (5.0, 0.0),
            (5.0009, 0.0009),
            (5.0, 5.0),
            (0.0, 0.0),
        ]);
        let cleaned = clean_ring(&ring, 0.001, 6).unwrap();
        assert_eq!(cleaned.0.len(), 4);
        // 0.002 apart on one axis only is not close
        let ring = LineString::from(vec![(0.0, 0.0), (5.0, 0.0), (5.0, 0.002), (5.0, 5.0), (0.0, 0.0)]);
        assert_eq!(clean_ring(&ring, 0.001, 6).unwrap().0.len(), 5);
    }

    #[test]
    fn ring_collapsing_below_three_vertices_is_dropped() {
        let ring = LineString::from(vec![(0.0, 0.0), (0.0005, 0.0), (1.0, 1.0), (1.0004, 1.0), (0.0, 0.0)]);
        assert_eq!(clean_ring(&ring, 0.001, 6), None);
        assert_eq!(clean_ring(&LineString::new(Vec::new()), 0.001, 6), None);
    }

    #[test]
    fn trailing_vertex_near_start_is_kept() {
        // only the previously kept vertex counts, not the first one
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (0.0, 4.0),
            (0.0004, 0.0002),
            (0.0, 0.0),
        ]);
        let cleaned = clean_ring(&ring, 0.001, 6).unwrap();
        assert_eq!(
            coords(&cleaned),
            vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0004, 0.0002), (0.0, 0.0)]
        );
        assert_eq!(clean_ring(&cleaned, 0.001, 6), Some(cleaned));
    }

    #[test]
    fn trailing_vertex_rounding_onto_start_closes_ring() {
        let open = LineString::new(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 3.0, y: 0.0 },
            Coord { x: 3.0, y: 3.0 },
            Coord { x: 0.0, y: 3.0 },
            Coord { x: 0.0000004, y: 0.0 },
        ]);
        let cleaned = clean_ring(&open, 0.0000001, 6).unwrap();
        assert_eq!(
            coords(&cleaned),
            vec![(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn closeness_uses_unrounded_coordinates() {
        // 1.0004 rounds to 1.0 but is 0.0014 from 0.9990 before rounding
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (0.999, 0.0),
            (1.0004, 0.0),
            (1.0, 1.0),
            (0.0, 0.0),
        ]);
        let cleaned = clean_ring(&ring, 0.001, 3).unwrap();
        assert_eq!(
            coords(&cleaned),
            vec![(0.0, 0.0), (0.999, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn open_ring_is_closed() {
        let open = LineString::new(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 2.0, y: 2.0 },
        ]);
        let cleaned = clean_ring(&open, 0.001, 3).unwrap();
        assert_eq!(cleaned.0.len(), 4);
        assert_eq!(cleaned.0.first(), cleaned.0.last());
    }

    #[test]
    fn collapsed_hole_is_dropped_shell_kept() {
        let polygon = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [
                [(x: 2.0, y: 2.0), (x: 2.0005, y: 2.0), (x: 2.0005, y: 2.0005)],
                [(x: 5.0, y: 5.0), (x: 5.0, y: 6.0), (x: 6.0, y: 6.0), (x: 6.0, y: 5.0)],
            ],
        );
        let cleaned = clean_polygon(&polygon, 0.001, 6).unwrap();
        assert_eq!(cleaned.interiors().len(), 1);
        assert_eq!(cleaned.exterior().0.len(), 5);
    }

    #[test]
    fn collapsed_shell_drops_polygon() {
        let sliver = polygon![(x: 0.0, y: 0.0), (x: 0.0004, y: 0.0), (x: 0.0004, y: 0.0004)];
        assert_eq!(clean_polygon(&sliver, 0.001, 6), None);
    }

    #[test]
    fn self_intersection_after_cleaning_drops_polygon() {
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 4.0), (x: 4.0, y: 0.0), (x: 0.0, y: 4.0)];
        assert_eq!(clean_polygon(&bowtie, 0.001, 6), None);
    }

    #[test]
    fn multipolygon_keeps_surviving_parts() {
        let good = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let bad = polygon![(x: 5.0, y: 5.0), (x: 5.0001, y: 5.0), (x: 5.0001, y: 5.0001)];
        let cleaned = clean_multi_polygon(&MultiPolygon::new(vec![good.clone(), bad.clone()]), 0.001, 6).unwrap();
        assert_eq!(cleaned.0, vec![good]);
        assert_eq!(clean_multi_polygon(&MultiPolygon::new(vec![bad]), 0.001, 6), None);
    }
}
