//! Explicit configuration values passed into every entry point.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::projection::Crs;

// Rounding beyond this many digits is below f64 resolution for projected metres
const MAX_DECIMAL_PRECISION: u32 = 15;

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Decimal digits kept on every coordinate.
    pub decimal_precision: u32,
    /// Minimum area (target frame units squared) a surviving feature must have.
    pub min_area: f64,
    /// Frame all geometry is reprojected into before cleaning.
    pub target_crs: Crs,
    /// Frame assumed for collections that do not declare one.
    pub input_crs_fallback: Crs,
    /// Per-axis distance under which consecutive vertices collapse.
    pub tolerance: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            decimal_precision: 3,
            min_area: 1.0,
            target_crs: Crs::epsg(32748),
            input_crs_fallback: Crs::WGS84,
            tolerance: 0.001,
        }
    }
}

impl CleanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimal_precision > MAX_DECIMAL_PRECISION {
            return Err(ConfigError::Invalid {
                field: "decimal_precision",
                reason: format!("must be at most {MAX_DECIMAL_PRECISION}, got {}", self.decimal_precision),
            });
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(ConfigError::Invalid {
                field: "min_area",
                reason: format!("must be a non-negative number, got {}", self.min_area),
            });
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::Invalid {
                field: "tolerance",
                reason: format!("must be a non-negative number, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

/// Batch configuration: the pipeline parameters plus the frames of the two
/// output products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub clean: CleanConfig,
    pub geoflow_crs: Crs,
    pub modelur_crs: Crs,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            clean: CleanConfig::default(),
            geoflow_crs: Crs::epsg(32748),
            modelur_crs: Crs::WGS84,
        }
    }
}

impl BatchConfig {
    /// Loads a JSON config file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BatchConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clean.validate()
    }
}
