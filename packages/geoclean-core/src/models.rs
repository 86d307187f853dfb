// This is the models module containing shared data structures
use std::collections::BTreeSet;
use std::fmt;

use geo::{Area, BoundingRect, HasDimensions, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::projection::Crs;

/// Areal geometry carried by a feature. Absence is modelled as `Option<Surface>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Surface {
    /// Builds a surface from polygon parts: none yields `None`, one yields a
    /// `Polygon`, more yield a `MultiPolygon`.
    pub fn from_parts(mut parts: Vec<Polygon<f64>>) -> Option<Self> {
        match parts.len() {
            0 => None,
            1 => parts.pop().map(Surface::Polygon),
            _ => Some(Surface::MultiPolygon(MultiPolygon::new(parts))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Surface::Polygon(polygon) => polygon.is_empty(),
            Surface::MultiPolygon(multi) => multi.0.iter().all(|polygon| polygon.is_empty()),
        }
    }

    /// Planar area: shells minus holes, always non-negative.
    pub fn area(&self) -> f64 {
        match self {
            Surface::Polygon(polygon) => polygon.unsigned_area(),
            Surface::MultiPolygon(multi) => multi.unsigned_area(),
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Surface::Polygon(polygon) => polygon.bounding_rect(),
            Surface::MultiPolygon(multi) => multi.bounding_rect(),
        }
    }

    pub fn into_polygons(self) -> Vec<Polygon<f64>> {
        match self {
            Surface::Polygon(polygon) => vec![polygon],
            Surface::MultiPolygon(multi) => multi.0,
        }
    }

    pub fn to_geometry(&self) -> geo_types::Geometry<f64> {
        match self {
            Surface::Polygon(polygon) => geo_types::Geometry::Polygon(polygon.clone()),
            Surface::MultiPolygon(multi) => geo_types::Geometry::MultiPolygon(multi.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Surface::Polygon(_) => "Polygon",
            Surface::MultiPolygon(_) => "MultiPolygon",
        }
    }
}

/// Diagnostic tags attached to surviving features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    InvalidRing,
    SmallArea,
    Overlap,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::InvalidRing => "INVALID_RING",
            IssueCode::SmallArea => "SMALL_AREA",
            IssueCode::Overlap => "OVERLAP",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of issue codes. Displays as `CODE;CODE;` (empty for none).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issues(BTreeSet<IssueCode>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: IssueCode) -> bool {
        self.0.insert(code)
    }

    pub fn contains(&self, code: IssueCode) -> bool {
        self.0.contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = IssueCode> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in &self.0 {
            write!(f, "{};", code)?;
        }
        Ok(())
    }
}

impl FromIterator<IssueCode> for Issues {
    fn from_iter<I: IntoIterator<Item = IssueCode>>(iter: I) -> Self {
        Issues(iter.into_iter().collect())
    }
}

/// One record of a feature collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Surface>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub issues: Issues,
    pub area: f64,
    pub overlap: bool,
}

impl Feature {
    /// A feature as a reader produces it: derived fields unset.
    pub fn new(
        geometry: Option<Surface>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            geometry,
            attributes,
            issues: Issues::new(),
            area: 0.0,
            overlap: false,
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.as_ref().is_some_and(|surface| !surface.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<Crs>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>, crs: Option<Crs>) -> Self {
        Self { features, crs }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
