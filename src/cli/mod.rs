//! toxiflow CLI Module
//!
//! Command-line interface for running the training pipeline, predicting
//! with the served model and listing saved model versions.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::ingestion::CsvDataSource;
use crate::pipeline::{TrainPipeline, OUTCOME_FILE_NAME};
use crate::prediction::{PredictionPipeline, PREDICTION_COLUMN};
use crate::resolver::ModelResolver;
use crate::utils::{load_csv, save_csv};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "toxiflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drift-checked training and versioned serving for toxicity regression")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full training pipeline
    Train {
        /// Raw dataset export (CSV)
        #[arg(short, long)]
        source: PathBuf,

        /// Schema file (defaults to SCHEMA_FILE_PATH or config/schema.yaml)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Root directory for run artifacts
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Versioned model store
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },

    /// Predict with the latest saved model
    Predict {
        /// Input data file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Write the input plus a prediction column here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Versioned model store
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },

    /// List saved model versions
    Models {
        /// Versioned model store
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

fn model_dir_or_default(model_dir: Option<PathBuf>) -> PathBuf {
    model_dir.unwrap_or_else(|| PipelineConfig::default().saved_model_dir)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    source: &Path,
    schema: Option<PathBuf>,
    artifact_dir: Option<PathBuf>,
    model_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = PipelineConfig::default();
    if let Some(schema) = schema {
        config = config.with_schema_file(schema);
    }
    if let Some(dir) = artifact_dir {
        config = config.with_artifact_root(dir);
    }
    if let Some(dir) = model_dir {
        config = config.with_saved_model_dir(dir);
    }

    step_run(&format!("Running pipeline on {}", source.display()));
    let start = Instant::now();
    let pipeline = TrainPipeline::new(config, Arc::new(CsvDataSource::new(source)));
    let outcome = pipeline.run_pipeline()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    kv("Train R²", &format!("{:.4}", outcome.trainer.train_metric.r2));
    kv("Test R²", &format!("{:.4}", outcome.trainer.test_metric.r2));
    kv("Test RMSE", &format!("{:.4}", outcome.trainer.test_metric.rmse));
    kv(
        "Drift",
        if outcome.validation.drift_detected { "detected" } else { "none" },
    );
    kv("Saved model", &outcome.pusher.saved_model_path.display().to_string());
    kv("Artifacts", &outcome.artifact_dir.display().to_string());
    kv("Summary", &outcome.artifact_dir.join(OUTCOME_FILE_NAME).display().to_string());
    println!();

    Ok(())
}

pub fn cmd_predict(
    data_path: &Path,
    output: Option<&Path>,
    model_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading data");
    let df = load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let service = PredictionPipeline::from_dir(model_dir_or_default(model_dir));
    let Some(frame) = service.predict_frame(&df)? else {
        println!("  {}", "No saved model, nothing to predict".yellow());
        println!();
        return Ok(());
    };

    match output {
        Some(path) => {
            step_run(&format!("Saving → {}", path.display()));
            save_csv(&frame, path)?;
            step_done(&format!("{} rows", frame.height()));
        }
        None => {
            let predictions = frame.column(PREDICTION_COLUMN)?.f64()?;
            for (i, value) in predictions.into_iter().enumerate() {
                let value = value.map_or_else(|| "null".to_string(), |v| format!("{:.4}", v));
                println!("  {:>6}  {}", muted(&i.to_string()), value.white());
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_models(model_dir: Option<PathBuf>) -> anyhow::Result<()> {
    section("Models");

    let resolver = ModelResolver::from_dir(model_dir_or_default(model_dir));
    let versions = resolver.versions()?;
    if versions.is_empty() {
        println!("  {}", format!("No saved models in {}", resolver.model_dir().display()).yellow());
        println!();
        return Ok(());
    }

    let latest = versions.last().copied();
    for version in versions {
        let marker = if Some(version) == latest { ok("● served") } else { dim("○") };
        println!("  {:>4}  {}", version.to_string().white(), marker);
    }
    kv("Next version", &resolver.next_version()?.to_string());
    println!();
    Ok(())
}
