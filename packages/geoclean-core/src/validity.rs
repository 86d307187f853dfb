//! Structural validity of polygonal geometry.
//!
//! A polygon is valid when every ring is closed, finite, has at least three
//! distinct vertices and non-zero area, no ring touches or crosses itself,
//! rings of the same polygon meet at isolated points at most, every hole lies
//! in the shell and no hole lies in another hole. Multipolygon parts must not
//! share interior.

use std::iter;

use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line, LineString, MultiPolygon, Polygon, Relate};

use crate::models::Surface;
use crate::orientation::ring_signed_area;

pub fn is_valid_surface(surface: &Surface) -> bool {
    match surface {
        Surface::Polygon(polygon) => is_valid_polygon(polygon),
        Surface::MultiPolygon(multi) => is_valid_multi_polygon(multi),
    }
}

pub fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    let rings: Vec<&LineString<f64>> = iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .collect();
    if !rings.iter().all(|ring| is_valid_ring(ring)) {
        return false;
    }

    let edges: Vec<Vec<Line<f64>>> = rings.iter().map(|ring| ring_edges(ring)).collect();
    if !edges.iter().all(|ring| is_simple(ring)) {
        return false;
    }
    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            if rings_cross(&edges[i], &edges[j]) {
                return false;
            }
        }
    }

    let shell = Polygon::new(polygon.exterior().clone(), Vec::new());
    if polygon
        .interiors()
        .iter()
        .any(|hole| has_vertex_at(hole, &shell, CoordPos::Outside))
    {
        return false;
    }

    // Nested holes: a vertex of one hole strictly inside another
    let holes: Vec<Polygon<f64>> = polygon
        .interiors()
        .iter()
        .map(|hole| Polygon::new(hole.clone(), Vec::new()))
        .collect();
    for (i, hole) in polygon.interiors().iter().enumerate() {
        for (j, other) in holes.iter().enumerate() {
            if i != j && has_vertex_at(hole, other, CoordPos::Inside) {
                return false;
            }
        }
    }
    true
}

pub fn is_valid_multi_polygon(multi: &MultiPolygon<f64>) -> bool {
    if !multi.0.iter().all(is_valid_polygon) {
        return false;
    }
    for (i, a) in multi.0.iter().enumerate() {
        for b in &multi.0[i + 1..] {
            let matrix = a.relate(b);
            if matrix.is_intersects() && !matrix.is_touches() {
                return false;
            }
        }
    }
    true
}

/// Closed, finite, ≥ 3 distinct vertices, non-zero area.
pub fn is_valid_ring(ring: &LineString<f64>) -> bool {
    let points = &ring.0;
    if points.len() < 4 || points.first() != points.last() {
        return false;
    }
    if !points.iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return false;
    }
    distinct_vertex_count(&points[..points.len() - 1]) >= 3 && ring_signed_area(ring) != 0.0
}

/// Number of pairwise distinct coordinates.
pub fn distinct_vertex_count(points: &[Coord<f64>]) -> usize {
    let mut sorted: Vec<Coord<f64>> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    sorted.len()
}

// Ring edges with zero-length segments skipped
fn ring_edges(ring: &LineString<f64>) -> Vec<Line<f64>> {
    ring.lines().filter(|line| line.start != line.end).collect()
}

fn is_simple(edges: &[Line<f64>]) -> bool {
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                // Neighbouring edges meet at their shared vertex only
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return false,
            }
        }
    }
    true
}

fn rings_cross(a: &[Line<f64>], b: &[Line<f64>]) -> bool {
    a.iter().any(|edge_a| {
        b.iter().any(|edge_b| match line_intersection(*edge_a, *edge_b) {
            None => false,
            Some(LineIntersection::SinglePoint { is_proper, .. }) => is_proper,
            Some(LineIntersection::Collinear { .. }) => true,
        })
    })
}

fn has_vertex_at(ring: &LineString<f64>, container: &Polygon<f64>, position: CoordPos) -> bool {
    ring.0
        .iter()
        .any(|coord| container.coordinate_position(coord) == position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(min: f64, max: f64) -> Polygon<f64> {
        polygon![(x: min, y: min), (x: max, y: min), (x: max, y: max), (x: min, y: max)]
    }

    fn with_holes(shell: Polygon<f64>, holes: Vec<Polygon<f64>>) -> Polygon<f64> {
        Polygon::new(
            shell.exterior().clone(),
            holes.into_iter().map(|hole| hole.exterior().clone()).collect(),
        )
    }

    #[test]
    fn simple_square_is_valid() {
        assert!(is_valid_polygon(&square(0.0, 1.0)));
    }

    #[test]
    fn bowtie_is_invalid() {
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 4.0), (x: 4.0, y: 0.0), (x: 0.0, y: 4.0)];
        assert!(!is_valid_polygon(&bowtie));
    }

    #[test]
    fn spike_backtracking_along_an_edge_is_invalid() {
        let spike = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 3.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ];
        assert!(!is_valid_polygon(&spike));
    }

    #[test]
    fn collinear_ring_has_no_area() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        assert!(!is_valid_polygon(&flat));
    }

    #[test]
    fn hole_must_sit_inside_shell() {
        assert!(is_valid_polygon(&with_holes(square(0.0, 10.0), vec![square(2.0, 4.0)])));
        assert!(!is_valid_polygon(&with_holes(square(0.0, 10.0), vec![square(20.0, 24.0)])));
        // crossing the shell boundary
        assert!(!is_valid_polygon(&with_holes(square(0.0, 10.0), vec![square(8.0, 12.0)])));
    }

    #[test]
    fn nested_holes_are_invalid() {
        let nested = with_holes(square(0.0, 10.0), vec![square(1.0, 9.0), square(3.0, 5.0)]);
        assert!(!is_valid_polygon(&nested));
        let side_by_side = with_holes(square(0.0, 10.0), vec![square(1.0, 3.0), square(5.0, 7.0)]);
        assert!(is_valid_polygon(&side_by_side));
    }

    #[test]
    fn multipolygon_parts_may_touch_but_not_overlap() {
        let touching = MultiPolygon::new(vec![square(0.0, 1.0), square(1.0, 2.0)]);
        assert!(is_valid_multi_polygon(&touching));
        let overlapping = MultiPolygon::new(vec![square(0.0, 2.0), square(1.0, 3.0)]);
        assert!(!is_valid_multi_polygon(&overlapping));
    }

    #[test]
    fn distinct_count_ignores_repeats() {
        let points = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
        ];
        assert_eq!(distinct_vertex_count(&points), 2);
    }
}
