//! The cleaning pipeline over one feature collection.
//!
//! Stages run in a fixed order, each consuming the feature vector of the
//! previous one:
//!
//! 1. assign the fallback frame when the collection declares none
//! 2. reproject into the target frame
//! 3. round coordinates
//! 4. repair invalid geometry
//! 5. drop near-duplicate vertices
//! 6. enforce ring orientation
//! 7. tag `INVALID_RING` where geometry was lost
//! 8. discard features without geometry
//! 9. explode multipolygons
//! 10. measure area, tag `SMALL_AREA`
//! 11. detect overlaps, tag `OVERLAP`
//! 12. keep features at or above the area floor
//!
//! Geometry problems never fail the run; they end in a dropped feature. Only a
//! reprojection failure aborts.

use crate::config::CleanConfig;
use crate::error::CleanError;
use crate::models::{Feature, FeatureCollection, IssueCode, Surface};
use crate::normalize::{clean_surface, round_coordinates};
use crate::orientation::enforce_orientation;
use crate::overlap::detect_overlaps;
use crate::projection::{reproject_surface, Crs, Reprojector};
use crate::repair::repair;

/// Per-run counters, for logging by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub input_features: usize,
    /// Features discarded because no valid geometry survived repair and cleaning.
    pub invalid_dropped: usize,
    /// Feature count after multipolygons were split into parts.
    pub exploded_features: usize,
    /// Features tagged `SMALL_AREA` (all of them are removed at the end).
    pub small_area: usize,
    /// Features tagged `OVERLAP`.
    pub overlapping: usize,
    pub output_features: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutcome {
    pub collection: FeatureCollection,
    pub stats: CleanStats,
}

/// Runs every stage over `collection` and returns the surviving features in
/// `config.target_crs`.
pub fn clean_geodata(
    collection: FeatureCollection,
    config: &CleanConfig,
    projector: &dyn Reprojector,
) -> Result<CleanOutcome, CleanError> {
    let mut stats = CleanStats {
        input_features: collection.len(),
        ..CleanStats::default()
    };

    // Step 1: a declared frame always wins over the fallback
    let source_crs = collection.crs.unwrap_or(config.input_crs_fallback);
    tracing::debug!(%source_crs, declared = collection.crs.is_some(), "input frame");

    // Step 2
    let features = reproject_features(collection.features, source_crs, config.target_crs, projector)?;
    tracing::debug!(target_crs = %config.target_crs, "reprojected");

    // Steps 3 to 6 only touch geometry
    let features = round_features(features, config.decimal_precision);
    let features = repair_features(features);
    let features = deduplicate_features(features, config.tolerance, config.decimal_precision);
    let features = orient_features(features);

    // Step 7 and 8
    let features = tag_invalid_rings(features);
    let before = features.len();
    let features = discard_missing_geometry(features);
    stats.invalid_dropped = before - features.len();
    tracing::debug!(dropped = stats.invalid_dropped, "discarded features without valid geometry");

    // Step 9
    let features = explode_features(features);
    stats.exploded_features = features.len();
    tracing::debug!(features = stats.exploded_features, "exploded multipolygons");

    // Step 10
    let features = tag_small_areas(features, config.min_area);
    stats.small_area = count_tagged(&features, IssueCode::SmallArea);
    tracing::debug!(small = stats.small_area, min_area = config.min_area, "measured areas");

    // Step 11
    let features = tag_overlaps(features);
    stats.overlapping = count_tagged(&features, IssueCode::Overlap);
    tracing::debug!(overlapping = stats.overlapping, "checked overlaps");

    // Step 12
    let features = keep_min_area(features, config.min_area);
    stats.output_features = features.len();

    tracing::info!(
        input = stats.input_features,
        invalid = stats.invalid_dropped,
        small = stats.small_area,
        overlapping = stats.overlapping,
        output = stats.output_features,
        "cleaned feature collection"
    );

    Ok(CleanOutcome {
        collection: FeatureCollection::new(features, Some(config.target_crs)),
        stats,
    })
}

fn map_geometry(features: Vec<Feature>, mut f: impl FnMut(Surface) -> Option<Surface>) -> Vec<Feature> {
    features
        .into_iter()
        .map(|mut feature| {
            feature.geometry = feature.geometry.take().and_then(&mut f);
            feature
        })
        .collect()
}

pub(crate) fn reproject_features(
    mut features: Vec<Feature>,
    from: Crs,
    to: Crs,
    projector: &dyn Reprojector,
) -> Result<Vec<Feature>, CleanError> {
    if from == to {
        return Ok(features);
    }
    for (index, feature) in features.iter_mut().enumerate() {
        if let Some(surface) = &feature.geometry {
            let moved = reproject_surface(surface, from, to, projector)
                .map_err(|source| CleanError::Reproject { index, from, to, source })?;
            feature.geometry = Some(moved);
        }
    }
    Ok(features)
}

pub(crate) fn round_features(features: Vec<Feature>, precision: u32) -> Vec<Feature> {
    map_geometry(features, |surface| Some(round_coordinates(&surface, precision)))
}

pub(crate) fn repair_features(features: Vec<Feature>) -> Vec<Feature> {
    map_geometry(features, repair)
}

pub(crate) fn deduplicate_features(features: Vec<Feature>, tolerance: f64, precision: u32) -> Vec<Feature> {
    map_geometry(features, |surface| clean_surface(&surface, tolerance, precision))
}

pub(crate) fn orient_features(features: Vec<Feature>) -> Vec<Feature> {
    map_geometry(features, |surface| Some(enforce_orientation(surface)))
}

pub(crate) fn tag_invalid_rings(mut features: Vec<Feature>) -> Vec<Feature> {
    for feature in features.iter_mut().filter(|feature| feature.geometry.is_none()) {
        feature.issues.insert(IssueCode::InvalidRing);
    }
    features
}

pub(crate) fn discard_missing_geometry(features: Vec<Feature>) -> Vec<Feature> {
    features.into_iter().filter(Feature::has_geometry).collect()
}

/// One feature per polygon part. Attributes and issues are copied as they are.
pub(crate) fn explode_features(features: Vec<Feature>) -> Vec<Feature> {
    let mut exploded = Vec::with_capacity(features.len());
    for feature in features {
        match feature.geometry {
            Some(Surface::MultiPolygon(multi)) => {
                for part in multi.0 {
                    exploded.push(Feature {
                        geometry: Some(Surface::Polygon(part)),
                        attributes: feature.attributes.clone(),
                        issues: feature.issues.clone(),
                        area: feature.area,
                        overlap: feature.overlap,
                    });
                }
            }
            _ => exploded.push(feature),
        }
    }
    exploded
}

pub(crate) fn tag_small_areas(mut features: Vec<Feature>, min_area: f64) -> Vec<Feature> {
    for feature in features.iter_mut() {
        feature.area = feature.geometry.as_ref().map_or(0.0, Surface::area);
        if feature.area < min_area {
            feature.issues.insert(IssueCode::SmallArea);
        }
    }
    features
}

pub(crate) fn tag_overlaps(features: Vec<Feature>) -> Vec<Feature> {
    let mut features = detect_overlaps(features);
    for feature in features.iter_mut().filter(|feature| feature.overlap) {
        feature.issues.insert(IssueCode::Overlap);
    }
    features
}

pub(crate) fn keep_min_area(features: Vec<Feature>, min_area: f64) -> Vec<Feature> {
    features.into_iter().filter(|feature| feature.area >= min_area).collect()
}

fn count_tagged(features: &[Feature], code: IssueCode) -> usize {
    features.iter().filter(|feature| feature.issues.contains(code)).count()
}
