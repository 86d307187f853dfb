//! Topology cleaning and validation for surveyed polygon feature collections.
//!
//! The engine is [`pipeline::clean_geodata`]: a fixed sequence of stages that
//! reprojects, rounds, repairs, deduplicates, orients, explodes, measures and
//! overlap-checks every feature of one collection. Reading, writing, naming and
//! batch orchestration live in their own modules around it.

// Shared data structures (features, surfaces, issue codes)
pub mod models;
// Error types for every layer
pub mod error;
// Explicit configuration values
pub mod config;
// Reference frames and coordinate reprojection
pub mod projection;
// Structural validity checks
pub mod validity;
// Coordinate rounding and vertex deduplication
pub mod normalize;
// Make-valid repair of broken polygons
pub mod repair;
// Ring winding enforcement
pub mod orientation;
// R-tree backed overlap detection
pub mod overlap;
// The 12-stage cleaning pipeline
pub mod pipeline;
// GeoJSON feature collection reader and writer
pub mod geojson_features;
// Geoflow / Modelur output products
pub mod export;
// Consistent file names and output layout
pub mod naming;
// Directory scan and per-file batch runs
pub mod batch;
// Terminal logging and progress output
pub mod console;


pub use config::{BatchConfig, CleanConfig};
pub use error::{BatchError, CleanError, ConfigError, DatasetError, ProjectionError};
pub use models::{Feature, FeatureCollection, IssueCode, Issues, Surface};
pub use pipeline::{clean_geodata, CleanOutcome, CleanStats};
pub use projection::{BuiltinProjector, Crs, Reprojector};
