//! Reference frames and coordinate reprojection.
//!
//! The pipeline only needs "move this coordinate from frame A to frame B", so
//! that is the whole [`Reprojector`] seam. [`BuiltinProjector`] covers the
//! frames survey deliveries use: WGS84 geographic, Web Mercator and the WGS84
//! UTM zones.

use std::fmt;
use std::str::FromStr;

use geo::{Coord, MapCoords};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::models::{FeatureCollection, Surface};

/// EPSG-coded reference frame identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(u32);

impl Crs {
    pub const WGS84: Crs = Crs(4326);
    pub const WEB_MERCATOR: Crs = Crs(3857);

    pub const fn epsg(code: u32) -> Self {
        Crs(code)
    }

    pub const fn code(&self) -> u32 {
        self.0
    }

    /// OGC URN form used in the legacy GeoJSON `crs` member.
    pub fn urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.0)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`,
    /// `urn:ogc:def:crs:EPSG:6.6:4326`, `urn:ogc:def:crs:OGC:1.3:CRS84`
    /// and bare codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.to_ascii_uppercase().ends_with("CRS84") {
            return Ok(Crs::WGS84);
        }
        let is_epsg = trimmed.to_ascii_uppercase().contains("EPSG");
        let code = trimmed.rsplit(':').next().unwrap_or_default();
        if is_epsg || trimmed == code {
            if let Ok(code) = code.parse::<u32>() {
                return Ok(Crs(code));
            }
        }
        Err(ProjectionError::UnrecognizedIdentifier(s.to_string()))
    }
}

/// Moves single coordinates between reference frames.
pub trait Reprojector: Send + Sync {
    fn reproject(&self, coord: Coord<f64>, from: Crs, to: Crs) -> Result<Coord<f64>, ProjectionError>;
}

/// Reprojects every vertex of a surface. Equal frames are a no-op.
pub fn reproject_surface(
    surface: &Surface,
    from: Crs,
    to: Crs,
    projector: &dyn Reprojector,
) -> Result<Surface, ProjectionError> {
    if from == to {
        return Ok(surface.clone());
    }
    let project = |coord: Coord<f64>| projector.reproject(coord, from, to);
    match surface {
        Surface::Polygon(polygon) => polygon.try_map_coords(project).map(Surface::Polygon),
        Surface::MultiPolygon(multi) => multi.try_map_coords(project).map(Surface::MultiPolygon),
    }
}

/// Reprojects a whole collection into `to`. A collection without a frame is
/// taken to be in `to` already.
pub fn reproject_collection(
    collection: &FeatureCollection,
    to: Crs,
    projector: &dyn Reprojector,
) -> Result<FeatureCollection, ProjectionError> {
    let from = collection.crs.unwrap_or(to);
    let mut features = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let mut moved = feature.clone();
        moved.geometry = feature
            .geometry
            .as_ref()
            .map(|surface| reproject_surface(surface, from, to, projector))
            .transpose()?;
        features.push(moved);
    }
    Ok(FeatureCollection::new(features, Some(to)))
}

// WGS84 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const INVERSE_FLATTENING: f64 = 298.257_223_563;
const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
// Web Mercator is defined on the sphere of the semi-major axis
const MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// Krüger series coefficients for the transverse Mercator projection.
struct KruegerSeries {
    rectifying_radius: f64,
    eccentricity_term: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl KruegerSeries {
    fn wgs84() -> Self {
        let f = 1.0 / INVERSE_FLATTENING;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        Self {
            rectifying_radius: SEMI_MAJOR_AXIS / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            eccentricity_term: 2.0 * n.sqrt() / (1.0 + n),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    fn forward(&self, lon: f64, lat: f64, zone: u8, north: bool) -> (f64, f64) {
        let phi = lat.to_radians();
        let d_lambda = lon.to_radians() - central_meridian(zone).to_radians();
        let e = self.eccentricity_term;
        let t = (phi.sin().atanh() - e * (e * phi.sin()).atanh()).sinh();
        let xi_p = (t / d_lambda.cos()).atan();
        let eta_p = (d_lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut easting = eta_p;
        let mut northing = xi_p;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            easting += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
            northing += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
        }

        let scale = UTM_SCALE * self.rectifying_radius;
        let false_northing = if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH };
        (UTM_FALSE_EASTING + scale * easting, false_northing + scale * northing)
    }

    fn inverse(&self, easting: f64, northing: f64, zone: u8, north: bool) -> (f64, f64) {
        let scale = UTM_SCALE * self.rectifying_radius;
        let false_northing = if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH };
        let xi = (northing - false_northing) / scale;
        let eta = (easting - UTM_FALSE_EASTING) / scale;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            phi += delta * (k * chi).sin();
        }
        let lambda = central_meridian(zone).to_radians() + (eta_p.sinh() / xi_p.cos()).atan();
        (lambda.to_degrees(), phi.to_degrees())
    }
}

lazy_static! {
    static ref WGS84_TRANSVERSE_MERCATOR: KruegerSeries = KruegerSeries::wgs84();
}

fn central_meridian(zone: u8) -> f64 {
    zone as f64 * 6.0 - 183.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Geographic,
    WebMercator,
    Utm { zone: u8, north: bool },
}

impl Frame {
    fn resolve(crs: Crs) -> Result<Self, ProjectionError> {
        match crs.code() {
            4326 => Ok(Frame::Geographic),
            3857 | 900913 => Ok(Frame::WebMercator),
            code @ 32601..=32660 => Ok(Frame::Utm { zone: (code - 32600) as u8, north: true }),
            code @ 32701..=32760 => Ok(Frame::Utm { zone: (code - 32700) as u8, north: false }),
            _ => Err(ProjectionError::Unsupported(crs)),
        }
    }
}

/// Projector for WGS84 geographic (4326), Web Mercator (3857) and WGS84 UTM
/// (326zz / 327zz). Requests between equal frames are passed through for any
/// code.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProjector;

impl BuiltinProjector {
    fn to_geographic(&self, coord: Coord<f64>, crs: Crs) -> Result<Coord<f64>, ProjectionError> {
        let out_of_domain = || ProjectionError::OutOfDomain { crs, x: coord.x, y: coord.y };
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(out_of_domain());
        }
        match Frame::resolve(crs)? {
            Frame::Geographic => Ok(coord),
            Frame::WebMercator => {
                // Same spherical inverse as slippy-map tile math: lat = atan(sinh(y / R))
                let lon = (coord.x / SEMI_MAJOR_AXIS).to_degrees();
                let lat = (coord.y / SEMI_MAJOR_AXIS).sinh().atan().to_degrees();
                Ok(Coord { x: lon, y: lat })
            }
            Frame::Utm { zone, north } => {
                let (lon, lat) = WGS84_TRANSVERSE_MERCATOR.inverse(coord.x, coord.y, zone, north);
                if lon.is_finite() && lat.is_finite() {
                    Ok(Coord { x: lon, y: lat })
                } else {
                    Err(out_of_domain())
                }
            }
        }
    }

    fn from_geographic(&self, coord: Coord<f64>, crs: Crs) -> Result<Coord<f64>, ProjectionError> {
        let (lon, lat) = (coord.x, coord.y);
        let out_of_domain = || ProjectionError::OutOfDomain { crs: Crs::WGS84, x: lon, y: lat };
        if !lon.is_finite() || !lat.is_finite() || lat.abs() >= 90.0 {
            return Err(out_of_domain());
        }
        match Frame::resolve(crs)? {
            Frame::Geographic => Ok(coord),
            Frame::WebMercator => {
                if lat.abs() > MERCATOR_MAX_LATITUDE {
                    return Err(out_of_domain());
                }
                let x = SEMI_MAJOR_AXIS * lon.to_radians();
                let y = SEMI_MAJOR_AXIS * lat.to_radians().tan().asinh();
                Ok(Coord { x, y })
            }
            Frame::Utm { zone, north } => {
                // Beyond a quarter turn from the central meridian the series diverges
                if (lon - central_meridian(zone)).abs() >= 90.0 {
                    return Err(out_of_domain());
                }
                let (x, y) = WGS84_TRANSVERSE_MERCATOR.forward(lon, lat, zone, north);
                Ok(Coord { x, y })
            }
        }
    }
}

impl Reprojector for BuiltinProjector {
    fn reproject(&self, coord: Coord<f64>, from: Crs, to: Crs) -> Result<Coord<f64>, ProjectionError> {
        if from == to {
            return Ok(coord);
        }
        let geographic = self.to_geographic(coord, from)?;
        self.from_geographic(geographic, to)
    }
}
