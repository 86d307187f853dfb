//! Directory scan and per-file batch runs.
//!
//! Files are independent: each one is read, cleaned and exported on a rayon
//! worker, and a failing or panicking file is recorded without touching the
//! others.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::BatchConfig;
use crate::error::{error_chain, BatchError};
use crate::export::{export_outputs, ExportPaths};
use crate::geojson_features::read_feature_collection;
use crate::naming::{is_candidate_file, subgrid_name, OutputLayout, ProcessMode};
use crate::pipeline::{clean_geodata, CleanStats};
use crate::projection::Reprojector;

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Cleaned {
        path: PathBuf,
        outputs: ExportPaths,
        stats: CleanStats,
    },
    Failed {
        path: PathBuf,
        error: String,
    },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Cleaned { path, .. } | FileOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Cleaned { .. })
    }
}

/// Outcomes in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn matched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> + '_ {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Failed { path, error } => Some((path.as_path(), error.as_str())),
            FileOutcome::Cleaned { .. } => None,
        })
    }
}

/// Recursively lists files under `data_dir` that belong to `mode`, sorted by
/// path. A missing directory yields nothing.
pub fn find_input_files(data_dir: &Path, mode: ProcessMode) -> Vec<PathBuf> {
    if !data_dir.is_dir() {
        tracing::warn!(dir = %data_dir.display(), "data directory not found");
        return Vec::new();
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(data_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_candidate_file(&entry.file_name().to_string_lossy(), mode) {
            files.push(entry.into_path());
        }
    }
    files
}

/// Read, clean and export one file.
pub fn process_file(
    path: &Path,
    layout: &OutputLayout,
    config: &BatchConfig,
    projector: &dyn Reprojector,
) -> Result<(ExportPaths, CleanStats), BatchError> {
    let collection = read_feature_collection(path).map_err(|source| BatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let outcome = clean_geodata(collection, &config.clean, projector).map_err(|source| BatchError::Clean {
        path: path.to_path_buf(),
        source,
    })?;
    let subgrid = subgrid_name(path);
    let outputs = export_outputs(&outcome.collection, &subgrid, layout, config, projector).map_err(|source| {
        BatchError::Export {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok((outputs, outcome.stats))
}

/// Processes `files` on a pool of `jobs` workers (0 means one per core).
/// Only setup failures are returned as errors.
///
/// Files that map to the same subgrid write the same products, so they run
/// one after another in input order and the last one wins. Distinct subgrids
/// run in parallel.
pub fn run_batch(
    files: &[PathBuf],
    layout: &OutputLayout,
    config: &BatchConfig,
    projector: &dyn Reprojector,
    jobs: usize,
    progress: &ProgressBar,
) -> Result<BatchReport, BatchError> {
    layout.create_dirs()?;
    let threads = if jobs == 0 { num_cpus::get() } else { jobs };
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let groups = group_by_subgrid(files);
    tracing::info!(
        files = files.len(),
        subgrids = groups.len(),
        threads,
        output = %layout.root.display(),
        "starting batch"
    );

    let mut outcomes: Vec<(usize, FileOutcome)> = pool.install(|| {
        groups
            .par_iter()
            .flat_map_iter(|group| {
                group
                    .iter()
                    .map(|&index| (index, run_one(&files[index], layout, config, projector, progress)))
                    .collect::<Vec<_>>()
            })
            .collect()
    });
    outcomes.sort_by_key(|(index, _)| *index);

    Ok(BatchReport {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    })
}

/// Indices of `files` grouped by subgrid, groups ordered by first
/// appearance and indices ascending within each group.
fn group_by_subgrid(files: &[PathBuf]) -> Vec<Vec<usize>> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (index, path) in files.iter().enumerate() {
        let slot = *slots.entry(subgrid_name(path)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(index);
    }
    groups
}

fn run_one(
    path: &Path,
    layout: &OutputLayout,
    config: &BatchConfig,
    projector: &dyn Reprojector,
    progress: &ProgressBar,
) -> FileOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| process_file(path, layout, config, projector)));
    let outcome = match result {
        Ok(Ok((outputs, stats))) => {
            tracing::info!(
                file = %path.display(),
                output = stats.output_features,
                dropped = stats.input_features.saturating_sub(stats.output_features),
                "file done"
            );
            FileOutcome::Cleaned {
                path: path.to_path_buf(),
                outputs,
                stats,
            }
        }
        Ok(Err(err)) => failed(path, error_chain(&err), progress),
        Err(payload) => failed(
            path,
            format!("panicked while processing {}: {}", path.display(), panic_message(payload.as_ref())),
            progress,
        ),
    };
    progress.inc(1);
    outcome
}

fn failed(path: &Path, error: String, progress: &ProgressBar) -> FileOutcome {
    progress.println(format!("failed: {error}"));
    tracing::warn!(file = %path.display(), error = %error, "file failed");
    FileOutcome::Failed {
        path: path.to_path_buf(),
        error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
