/// Region classification tool: loads a soil/climate grid CSV, runs the
/// pyramid pipeline and writes a JSON summary of the resulting classes.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use soilgrid_core::{PipelineReport, PyramidConfig, PyramidPipeline, Region};

#[derive(Parser, Debug)]
#[command(name = "classifier", about = "Classify a soil/climate grid into homogeneous regions")]
struct Args {
    /// Grid CSV: header line, then id + eight attribute columns per line.
    #[arg(short, long)]
    input: PathBuf,

    /// Pyramid configuration JSON (dimensions, matching rule, policy).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base grid rows (overrides the config file).
    #[arg(long)]
    rows: Option<usize>,

    /// Base grid columns (overrides the config file).
    #[arg(long)]
    cols: Option<usize>,

    /// Output summary JSON file.
    #[arg(short, long, default_value = "data/classes.json")]
    output: PathBuf,

    /// Include the row-major base-level class raster in the output.
    #[arg(long)]
    raster: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    report: &'a PipelineReport,
    regions: &'a [Region],
    #[serde(skip_serializing_if = "Option::is_none")]
    base_classes: Option<Vec<Option<u32>>>,
}

fn resolve_config(args: &Args) -> Result<PyramidConfig> {
    let mut config = match &args.config {
        Some(path) => PyramidConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match (args.rows, args.cols) {
            (Some(rows), Some(cols)) => PyramidConfig::new(rows, cols),
            _ => bail!("grid dimensions missing: pass --config or both --rows and --cols"),
        },
    };
    if let Some(rows) = args.rows {
        config.base_rows = rows;
    }
    if let Some(cols) = args.cols {
        config.base_cols = cols;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = resolve_config(&args)?;
    let pipeline = PyramidPipeline::new(config).context("invalid pyramid configuration")?;
    let result = pipeline
        .run_csv(&args.input)
        .with_context(|| format!("classifying {}", args.input.display()))?;

    let base_classes = args
        .raster
        .then(|| result.pyramid.base_classes().iter().map(|c| c.map(|id| id.0)).collect());
    let summary = Summary {
        report: &result.report,
        regions: &result.classification.regions,
        base_classes,
    };

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&args.output, json).with_context(|| format!("writing {}", args.output.display()))?;

    log::info!(
        "{} regions over {} levels written to {}",
        result.report.regions,
        result.report.levels,
        args.output.display()
    );
    Ok(())
}
