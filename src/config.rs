//! Pipeline configuration
//!
//! [`PipelineConfig`] holds the tunables shared by every stage. Its
//! `Default` reads a handful of environment variables and falls back to the
//! constants below. [`TrainingPipelineConfig`] pins one run to a timestamped
//! artifact directory, and the per-stage configs derive their file layout
//! from it.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::drift::DriftPolicy;
use crate::preprocessing::ScalerType;
use crate::training::DistanceMetric;

pub const PIPELINE_NAME: &str = "toxicity";
pub const ARTIFACT_DIR: &str = "artifact";
pub const SAVED_MODEL_DIR: &str = "saved_models";
pub const SCHEMA_FILE_PATH: &str = "config/schema.yaml";
pub const TARGET_COLUMN: &str = "LC50";

pub const FILE_NAME: &str = "toxicity.csv";
pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.bin";
pub const MODEL_FILE_NAME: &str = "model.bin";

pub const DATA_INGESTION_DIR_NAME: &str = "data_ingestion";
pub const DATA_INGESTION_FEATURE_STORE_DIR: &str = "feature_store";
pub const DATA_INGESTION_INGESTED_DIR: &str = "ingested";
pub const DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO: f64 = 0.2;
pub const DATA_INGESTION_RANDOM_STATE: u64 = 42;

pub const DATA_VALIDATION_DIR_NAME: &str = "data_validation";
pub const DATA_VALIDATION_VALID_DIR: &str = "validated";
pub const DATA_VALIDATION_INVALID_DIR: &str = "invalid";
pub const DATA_VALIDATION_DRIFT_REPORT_DIR: &str = "drift_report";
pub const DATA_VALIDATION_DRIFT_REPORT_FILE_NAME: &str = "report.yaml";
pub const DATA_VALIDATION_DRIFT_THRESHOLD: f64 = 0.05;

pub const DATA_TRANSFORMATION_DIR_NAME: &str = "data_transformation";
pub const DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR: &str = "transformed";
pub const DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
pub const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.bin";
pub const TRANSFORMED_TEST_FILE_NAME: &str = "test.bin";

pub const MODEL_TRAINER_DIR_NAME: &str = "model_trainer";
pub const MODEL_TRAINER_TRAINED_MODEL_DIR: &str = "trained_model";
pub const MODEL_TRAINER_EXPECTED_SCORE: f64 = 0.5;
pub const MODEL_TRAINER_OVER_FITTING_UNDER_FITTING_THRESHOLD: f64 = 0.20;
pub const MODEL_TRAINER_N_NEIGHBORS: usize = 6;

pub const MODEL_EVALUATION_DIR_NAME: &str = "model_evaluation";
pub const MODEL_EVALUATION_CHANGED_THRESHOLD_SCORE: f64 = 0.02;
pub const MODEL_EVALUATION_REPORT_NAME: &str = "report.yaml";

pub const MODEL_PUSHER_DIR_NAME: &str = "model_pusher";

const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Tunables shared by every stage of the training pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pipeline_name: String,
    /// Root under which each run gets a timestamped directory
    pub artifact_root: PathBuf,
    /// Root of the versioned model store served to predictions
    pub saved_model_dir: PathBuf,
    pub schema_file_path: PathBuf,
    pub target_column: String,
    pub test_split_ratio: f64,
    pub random_state: u64,
    pub drift_threshold: f64,
    pub drift_policy: DriftPolicy,
    pub scaler_type: ScalerType,
    pub n_neighbors: usize,
    pub distance_metric: DistanceMetric,
    /// Minimum train R² a model must exceed to be accepted
    pub expected_score: f64,
    pub overfitting_threshold: f64,
    /// Minimum test R² improvement over the served model
    pub change_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            artifact_root: PathBuf::from(
                std::env::var("ARTIFACT_DIR").unwrap_or_else(|_| ARTIFACT_DIR.to_string()),
            ),
            saved_model_dir: PathBuf::from(
                std::env::var("SAVED_MODEL_DIR").unwrap_or_else(|_| SAVED_MODEL_DIR.to_string()),
            ),
            schema_file_path: PathBuf::from(
                std::env::var("SCHEMA_FILE_PATH").unwrap_or_else(|_| SCHEMA_FILE_PATH.to_string()),
            ),
            target_column: std::env::var("TARGET_COLUMN")
                .unwrap_or_else(|_| TARGET_COLUMN.to_string()),
            test_split_ratio: DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO,
            random_state: DATA_INGESTION_RANDOM_STATE,
            drift_threshold: DATA_VALIDATION_DRIFT_THRESHOLD,
            drift_policy: DriftPolicy::AnyColumn,
            scaler_type: ScalerType::Standard,
            n_neighbors: MODEL_TRAINER_N_NEIGHBORS,
            distance_metric: DistanceMetric::Euclidean,
            expected_score: std::env::var("MODEL_EXPECTED_SCORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MODEL_TRAINER_EXPECTED_SCORE),
            overfitting_threshold: MODEL_TRAINER_OVER_FITTING_UNDER_FITTING_THRESHOLD,
            change_threshold: MODEL_EVALUATION_CHANGED_THRESHOLD_SCORE,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_root = path.into();
        self
    }

    pub fn with_saved_model_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.saved_model_dir = path.into();
        self
    }

    pub fn with_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_file_path = path.into();
        self
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    pub fn with_expected_score(mut self, score: f64) -> Self {
        self.expected_score = score;
        self
    }

    pub fn with_change_threshold(mut self, threshold: f64) -> Self {
        self.change_threshold = threshold;
        self
    }

    pub fn with_drift_threshold(mut self, threshold: f64) -> Self {
        self.drift_threshold = threshold;
        self
    }

    pub fn with_drift_policy(mut self, policy: DriftPolicy) -> Self {
        self.drift_policy = policy;
        self
    }

    pub fn with_n_neighbors(mut self, k: usize) -> Self {
        self.n_neighbors = k.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// One pipeline run: shared config plus the run's artifact directory
#[derive(Debug, Clone)]
pub struct TrainingPipelineConfig {
    pub config: PipelineConfig,
    pub timestamp: String,
    pub artifact_dir: PathBuf,
}

impl TrainingPipelineConfig {
    pub fn new(config: PipelineConfig) -> Self {
        Self::at(config, Local::now())
    }

    /// Pin the run to a specific wall-clock time
    pub fn at(config: PipelineConfig, time: DateTime<Local>) -> Self {
        let timestamp = time.format(TIMESTAMP_FORMAT).to_string();
        let artifact_dir = config.artifact_root.join(&timestamp);
        Self {
            config,
            timestamp,
            artifact_dir,
        }
    }

    fn stage_dir(&self, name: &str) -> PathBuf {
        self.artifact_dir.join(name)
    }
}

#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub data_ingestion_dir: PathBuf,
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub train_test_split_ratio: f64,
    pub random_state: u64,
}

impl DataIngestionConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let dir = pipeline.stage_dir(DATA_INGESTION_DIR_NAME);
        Self {
            feature_store_file_path: dir.join(DATA_INGESTION_FEATURE_STORE_DIR).join(FILE_NAME),
            training_file_path: dir.join(DATA_INGESTION_INGESTED_DIR).join(TRAIN_FILE_NAME),
            testing_file_path: dir.join(DATA_INGESTION_INGESTED_DIR).join(TEST_FILE_NAME),
            train_test_split_ratio: pipeline.config.test_split_ratio,
            random_state: pipeline.config.random_state,
            data_ingestion_dir: dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub data_validation_dir: PathBuf,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub target_column: String,
    pub drift_threshold: f64,
    pub drift_policy: DriftPolicy,
}

impl DataValidationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let dir = pipeline.stage_dir(DATA_VALIDATION_DIR_NAME);
        let valid = dir.join(DATA_VALIDATION_VALID_DIR);
        let invalid = dir.join(DATA_VALIDATION_INVALID_DIR);
        Self {
            valid_train_file_path: valid.join(TRAIN_FILE_NAME),
            valid_test_file_path: valid.join(TEST_FILE_NAME),
            invalid_train_file_path: invalid.join(TRAIN_FILE_NAME),
            invalid_test_file_path: invalid.join(TEST_FILE_NAME),
            drift_report_file_path: dir
                .join(DATA_VALIDATION_DRIFT_REPORT_DIR)
                .join(DATA_VALIDATION_DRIFT_REPORT_FILE_NAME),
            target_column: pipeline.config.target_column.clone(),
            drift_threshold: pipeline.config.drift_threshold,
            drift_policy: pipeline.config.drift_policy,
            data_validation_dir: dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub data_transformation_dir: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
    pub target_column: String,
    pub scaler_type: ScalerType,
}

impl DataTransformationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let dir = pipeline.stage_dir(DATA_TRANSFORMATION_DIR_NAME);
        Self {
            transformed_train_file_path: dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR)
                .join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR)
                .join(TRANSFORMED_TEST_FILE_NAME),
            transformed_object_file_path: dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            target_column: pipeline.config.target_column.clone(),
            scaler_type: pipeline.config.scaler_type.clone(),
            data_transformation_dir: dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub model_trainer_dir: PathBuf,
    pub trained_model_file_path: PathBuf,
    pub expected_score: f64,
    pub overfitting_threshold: f64,
    pub n_neighbors: usize,
    pub distance_metric: DistanceMetric,
}

impl ModelTrainerConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let dir = pipeline.stage_dir(MODEL_TRAINER_DIR_NAME);
        Self {
            trained_model_file_path: dir
                .join(MODEL_TRAINER_TRAINED_MODEL_DIR)
                .join(MODEL_FILE_NAME),
            expected_score: pipeline.config.expected_score,
            overfitting_threshold: pipeline.config.overfitting_threshold,
            n_neighbors: pipeline.config.n_neighbors,
            distance_metric: pipeline.config.distance_metric,
            model_trainer_dir: dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    pub model_evaluation_dir: PathBuf,
    pub report_file_path: PathBuf,
    pub change_threshold: f64,
    pub target_column: String,
}

impl ModelEvaluationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let dir = pipeline.stage_dir(MODEL_EVALUATION_DIR_NAME);
        Self {
            report_file_path: dir.join(MODEL_EVALUATION_REPORT_NAME),
            change_threshold: pipeline.config.change_threshold,
            target_column: pipeline.config.target_column.clone(),
            model_evaluation_dir: dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelPusherConfig {
    pub model_pusher_dir: PathBuf,
    /// Copy of the pushed bundle kept with the run's artifacts
    pub model_file_path: PathBuf,
}

impl ModelPusherConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let dir = pipeline.stage_dir(MODEL_PUSHER_DIR_NAME);
        Self {
            model_file_path: dir.join(SAVED_MODEL_DIR).join(MODEL_FILE_NAME),
            model_pusher_dir: dir,
        }
    }
}

/// Create the parent directory of `path` if it has one
pub(crate) fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
