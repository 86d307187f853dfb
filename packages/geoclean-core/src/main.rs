use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use geoclean_core::batch::{find_input_files, run_batch};
use geoclean_core::console::{init_tracing, progress_bar, spinner};
use geoclean_core::geojson_features::{read_feature_collection, write_feature_collection};
use geoclean_core::naming::{OutputLayout, ProcessMode};
use geoclean_core::{clean_geodata, BatchConfig, BuiltinProjector};

#[derive(Parser)]
#[command(name = "geoclean")]
#[command(about = "Clean and validate surveyed polygon feature collections")]
struct Cmd {
    /// JSON config file; built-in defaults apply to missing keys
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Clean every matching file under the data folder
    Run {
        #[arg(long)]
        base_dir: PathBuf,
        #[arg(long, default_value = "DATA")]
        data_folder: String,
        #[arg(long, value_enum, default_value_t = ProcessMode::Ro)]
        mode: ProcessMode,
        /// Worker threads, 0 for one per core
        #[arg(long, default_value_t = 0)]
        jobs: usize,
        /// Parent of the dated OUTPUT_ folder (defaults to the base dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Clean a single file into the target frame
    Clean {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// List the files a run would pick up
    Scan {
        #[arg(long)]
        base_dir: PathBuf,
        #[arg(long, default_value = "DATA")]
        data_folder: String,
        #[arg(long, value_enum, default_value_t = ProcessMode::Ro)]
        mode: ProcessMode,
    },
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    init_tracing(cmd.verbose);
    let config = load_config(cmd.config.as_deref())?;

    match cmd.action {
        Action::Run {
            base_dir,
            data_folder,
            mode,
            jobs,
            output_dir,
        } => run(&config, &base_dir, &data_folder, mode, jobs, output_dir),
        Action::Clean { input, output } => clean(&config, &input, &output),
        Action::Scan {
            base_dir,
            data_folder,
            mode,
        } => scan(&base_dir, &data_folder, mode),
    }
}

fn load_config(path: Option<&Path>) -> Result<BatchConfig> {
    match path {
        Some(path) => BatchConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(BatchConfig::default()),
    }
}

fn run(
    config: &BatchConfig,
    base_dir: &Path,
    data_folder: &str,
    mode: ProcessMode,
    jobs: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let data_dir = base_dir.join(data_folder);
    let files = find_input_files(&data_dir, mode);
    tracing::info!(dir = %data_dir.display(), %mode, matched = files.len(), "scanned data directory");

    let output_root = output_dir.unwrap_or_else(|| base_dir.to_path_buf());
    let layout = OutputLayout::for_date(&output_root, chrono::Local::now().date_naive());

    let progress = progress_bar(files.len() as u64, "Processing files");
    let report = run_batch(&files, &layout, config, &BuiltinProjector, jobs, &progress)
        .with_context(|| format!("batch run into {}", layout.root.display()))?;
    progress.finish_and_clear();

    for (path, error) in report.failures() {
        tracing::warn!(file = %path.display(), "{error}");
    }
    tracing::info!(
        matched = report.matched(),
        succeeded = report.succeeded(),
        failed = report.matched() - report.succeeded(),
        output = %layout.root.display(),
        "batch finished"
    );
    Ok(())
}

fn clean(config: &BatchConfig, input: &Path, output: &Path) -> Result<()> {
    let spinner = spinner(&format!("Cleaning {}", input.display()));
    let collection = read_feature_collection(input).with_context(|| format!("reading {}", input.display()))?;
    let outcome = clean_geodata(collection, &config.clean, &BuiltinProjector)
        .with_context(|| format!("cleaning {}", input.display()))?;

    let name = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_feature_collection(output, &outcome.collection, &name)
        .with_context(|| format!("writing {}", output.display()))?;
    spinner.finish_and_clear();

    let stats = outcome.stats;
    tracing::info!(
        input = stats.input_features,
        invalid = stats.invalid_dropped,
        small = stats.small_area,
        overlapping = stats.overlapping,
        output = stats.output_features,
        path = %output.display(),
        "wrote cleaned collection"
    );
    Ok(())
}

fn scan(base_dir: &Path, data_folder: &str, mode: ProcessMode) -> Result<()> {
    let files = find_input_files(&base_dir.join(data_folder), mode);
    for file in &files {
        println!("{}", file.display());
    }
    tracing::info!(matched = files.len(), %mode, "scan finished");
    Ok(())
}
