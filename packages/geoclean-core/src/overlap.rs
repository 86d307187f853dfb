//! Pairwise overlap detection over feature envelopes.

use geo::Relate;
use rstar::{RTree, RTreeObject, AABB};

use crate::models::{Feature, Surface};

/// Envelope of one indexed feature, keyed by its position in the slice.
#[derive(Debug, Clone, Copy)]
struct IndexedEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn build_index(features: &[Feature]) -> RTree<IndexedEnvelope> {
    let entries: Vec<IndexedEnvelope> = features
        .iter()
        .enumerate()
        .filter(|(_, feature)| feature.has_geometry())
        .filter_map(|(index, feature)| {
            let rect = feature.geometry.as_ref()?.bounding_rect()?;
            Some(IndexedEnvelope {
                index,
                envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        })
        .collect();
    RTree::bulk_load(entries)
}

/// Interiors intersect; sharing only boundary points does not count.
fn surfaces_overlap(a: &Surface, b: &Surface) -> bool {
    let matrix = a.to_geometry().relate(&b.to_geometry());
    matrix.is_intersects() && !matrix.is_touches()
}

/// Sorted `(i, j)` pairs with `i < j` whose geometries overlap.
pub fn overlapping_pairs(features: &[Feature]) -> Vec<(usize, usize)> {
    let tree = build_index(features);
    let mut pairs: Vec<(usize, usize)> = tree
        .intersection_candidates_with_other_tree(&tree)
        .filter(|(a, b)| a.index < b.index)
        .filter(|(a, b)| {
            match (&features[a.index].geometry, &features[b.index].geometry) {
                (Some(first), Some(second)) => surfaces_overlap(first, second),
                _ => false,
            }
        })
        .map(|(a, b)| (a.index, b.index))
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Sets `overlap` on every feature taking part in at least one overlapping
/// pair and clears it everywhere else.
pub fn detect_overlaps(mut features: Vec<Feature>) -> Vec<Feature> {
    let pairs = overlapping_pairs(&features);
    for feature in features.iter_mut() {
        feature.overlap = false;
    }
    for (i, j) in pairs {
        features[i].overlap = true;
        features[j].overlap = true;
    }
    features
}
