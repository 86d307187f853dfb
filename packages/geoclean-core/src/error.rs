//! Error types for reprojection, cleaning, dataset I/O, configuration and batch runs.
//!
//! Geometry-level problems never show up here: they degrade to a missing
//! geometry inside the pipeline. Only failures of a whole invocation do.

use std::path::PathBuf;

use thiserror::Error;

use crate::projection::Crs;

/// Errors raised by a [`Reprojector`](crate::projection::Reprojector).
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// No transformation is known for this reference frame.
    #[error("unsupported reference frame {0}")]
    Unsupported(Crs),

    /// The coordinate cannot be expressed in the source or target frame.
    #[error("coordinate ({x}, {y}) is outside the domain of {crs}")]
    OutOfDomain {
        /// Frame whose domain was violated.
        crs: Crs,
        /// Offending x / longitude.
        x: f64,
        /// Offending y / latitude.
        y: f64,
    },

    /// A reference frame identifier could not be parsed.
    #[error("unrecognized reference frame identifier '{0}'")]
    UnrecognizedIdentifier(String),
}

/// Invocation-level failures of the cleaning pipeline.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("failed to reproject feature {index} from {from} to {to}")]
    Reproject {
        index: usize,
        from: Crs,
        to: Crs,
        #[source]
        source: ProjectionError,
    },
}

/// Errors while reading or writing a feature collection.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("geometry codec error: {0}")]
    Geometry(#[from] geozero::error::GeozeroError),

    #[error("expected a FeatureCollection, found '{0}'")]
    NotFeatureCollection(String),

    #[error("feature {index} is malformed: {reason}")]
    MalformedFeature { index: usize, reason: String },

    #[error("feature {index} has unsupported geometry type {kind}")]
    UnsupportedGeometry { index: usize, kind: String },

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure of one input file inside a batch run, or of the run setup itself.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: DatasetError,
    },

    #[error("failed to clean {path}")]
    Clean {
        path: PathBuf,
        #[source]
        source: CleanError,
    },

    #[error("failed to export {path}")]
    Export {
        path: PathBuf,
        #[source]
        source: DatasetError,
    },

    #[error("cannot create output directory {path}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Renders an error and its whole source chain on one line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_includes_sources() {
        let err = BatchError::Clean {
            path: PathBuf::from("AB_01_C_ro.geojson"),
            source: CleanError::Reproject {
                index: 3,
                from: Crs::epsg(4326),
                to: Crs::epsg(9999),
                source: ProjectionError::Unsupported(Crs::epsg(9999)),
            },
        };
        assert_eq!(
            error_chain(&err),
            "failed to clean AB_01_C_ro.geojson: failed to reproject feature 3 from EPSG:4326 to EPSG:9999: unsupported reference frame EPSG:9999"
        );
    }
}
