//! smartscan CLI
//!
//! Reads manifest photos (or OCR text) and prints the recognised ISO 6346
//! container IDs as JSON, one document per input.
//!
//! Copyright (c) 2025 Michael A Wright

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_pipeline::{LazyTesseractExtractor, Pipeline, PipelineConfig, PipelineResult};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt: ",
    env!("SMARTSCAN_BUILD_TIME"),
    "\nhost: ",
    env!("SMARTSCAN_BUILD_HOST"),
    "\nprofile: ",
    env!("SMARTSCAN_BUILD_PROFILE"),
);

#[derive(Parser)]
#[command(name = "smartscan")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Find and validate ISO 6346 container IDs in manifest photos", long_about = None)]
struct Cli {
    /// JSON pipeline configuration (missing keys use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on image files or directories of images
    Scan {
        /// Image files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Images processed in parallel
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Override the maximum number of repaired positions per candidate
        #[arg(long)]
        max_substitutions: Option<usize>,

        /// Disable fuzzy repair
        #[arg(long)]
        no_repair: bool,
    },

    /// Scan already extracted text (file, or stdin when omitted)
    Text {
        file: Option<PathBuf>,
    },

    /// Check container IDs without OCR
    Validate {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// One line of `scan` output
#[derive(Debug, Serialize)]
struct ScanReport {
    file: String,
    scanned_at: String,
    size_bytes: usize,
    result: PipelineResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(
        version = built_info::PKG_VERSION,
        target = built_info::TARGET,
        "smartscan starting"
    );

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Scan {
            paths,
            jobs,
            max_substitutions,
            no_repair,
        } => {
            if let Some(max) = max_substitutions {
                config.repair.max_substitutions = max;
            }
            if no_repair {
                config.repair.enabled = false;
            }
            let reports = scan_images(&paths, jobs, Pipeline::new(config)).await?;
            for report in &reports {
                print_json(report, cli.pretty)?;
            }
            Ok(())
        }
        Commands::Text { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            let result = Pipeline::new(config).run_text(text);
            print_json(&result, cli.pretty)
        }
        Commands::Validate { ids } => {
            let pipeline = Pipeline::new(config);
            for id in ids {
                print_json(&pipeline.check(id.trim()), cli.pretty)?;
            }
            Ok(())
        }
    }
}

/// Run every image through the pipeline, at most `jobs` at a time
///
/// Each task owns its own Tesseract handle; the pipeline itself is shared
/// read-only. Reports come back in input order.
async fn scan_images(paths: &[PathBuf], jobs: usize, pipeline: Pipeline) -> Result<Vec<ScanReport>> {
    let files = collect_images(paths)?;
    if files.is_empty() {
        anyhow::bail!("No images found in the given paths");
    }
    tracing::info!(count = files.len(), jobs, "Scanning images");

    let pipeline = Arc::new(pipeline);
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for file in files {
        let permit = permits.clone().acquire_owned().await?;
        let pipeline = pipeline.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            scan_file(&pipeline, &file)
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await.context("Scan task panicked")?);
    }
    Ok(reports)
}

fn scan_file(pipeline: &Pipeline, path: &Path) -> ScanReport {
    let scanned_at = chrono::Utc::now().to_rfc3339();
    let file = path.display().to_string();

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "Failed to read image");
            return ScanReport {
                file,
                scanned_at,
                size_bytes: 0,
                result: PipelineResult::failure(format!("failed to read file: {}", e)),
            };
        }
    };
    tracing::info!(file = %file, size_bytes = bytes.len(), "Processing image");

    let mut extractor = LazyTesseractExtractor::new(pipeline.config().ocr.clone());
    let result = pipeline.run(&bytes, &mut extractor);

    match result.best_id() {
        Some(id) => tracing::info!(file = %file, container_id = id, "Container ID found"),
        None => tracing::warn!(
            file = %file,
            error = result.error.as_deref().unwrap_or("no valid container ID"),
            "No valid container ID"
        ),
    }

    ScanReport {
        file,
        scanned_at,
        size_bytes: bytes.len(),
        result,
    }
}

/// Expand directories (recursively) into image files, sorted for stable output
fn collect_images(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && is_image(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
