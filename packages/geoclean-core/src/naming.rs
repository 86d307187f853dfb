// Consistent naming for input matching and output products
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::BatchError;

lazy_static! {
    // Two-letter area code, two-digit block, then the grid letter
    static ref SUBGRID_PREFIX: Regex = Regex::new(r"^[A-Z]{2}_\d{2}_[A-Z]").expect("static pattern");
}

pub const GEOFLOW_DIR: &str = "GEOFLOW";
pub const MODELUR_DIR: &str = "MODELUR";

/// Survey product a batch run is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ProcessMode {
    Ro,
    Bo,
    Kanopi,
}

impl ProcessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessMode::Ro => "ro",
            ProcessMode::Bo => "bo",
            ProcessMode::Kanopi => "kanopi",
        }
    }
}

impl fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replaces `-` with `_` so both separators are accepted.
pub fn normalize_file_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Whether a file name belongs to a batch run for `mode`.
pub fn is_candidate_file(file_name: &str, mode: ProcessMode) -> bool {
    let normalized = normalize_file_name(file_name);
    let lowered = normalized.to_lowercase();
    lowered.ends_with(".geojson") && SUBGRID_PREFIX.is_match(&normalized) && lowered.contains(mode.as_str())
}

/// First three `_`-separated parts of the normalized file stem.
pub fn subgrid_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    normalize_file_name(&stem)
        .split('_')
        .take(3)
        .collect::<Vec<_>>()
        .join("_")
}

/// Dated output root with one directory per product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub geoflow_dir: PathBuf,
    pub modelur_dir: PathBuf,
}

impl OutputLayout {
    /// `<base>/OUTPUT_<YYYY_MM_DD>`
    pub fn for_date(base: &Path, date: NaiveDate) -> Self {
        Self::at(base.join(format!("OUTPUT_{}", date.format("%Y_%m_%d"))))
    }

    pub fn at(root: PathBuf) -> Self {
        Self {
            geoflow_dir: root.join(GEOFLOW_DIR),
            modelur_dir: root.join(MODELUR_DIR),
            root,
        }
    }

    pub fn geoflow_path(&self, subgrid: &str) -> PathBuf {
        self.geoflow_dir.join(format!("{subgrid}_Geoflow.geojson"))
    }

    pub fn modelur_path(&self, subgrid: &str) -> PathBuf {
        self.modelur_dir.join(format!("{subgrid}_Modelur.geojson"))
    }

    pub fn create_dirs(&self) -> Result<(), BatchError> {
        for dir in [&self.geoflow_dir, &self.modelur_dir] {
            fs::create_dir_all(dir).map_err(|source| BatchError::OutputDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
