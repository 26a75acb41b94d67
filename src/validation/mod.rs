//! Data validation stage
//!
//! Structural checks run in a fixed order (column count, numerical columns,
//! categorical columns) and the first failing category aborts with a
//! message covering both splits. The drift check runs last and never fails
//! the stage; its verdict is carried in the artifact.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DataValidationConfig;
use crate::drift::{DatasetDriftDetector, DriftReport};
use crate::error::{PipelineError, Result};
use crate::ingestion::DataIngestionArtifact;
use crate::schema::Schema;
use crate::utils::{column_names, load_csv, save_csv};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    /// Structural checks passed and no dataset drift was found
    pub validation_status: bool,
    pub drift_detected: bool,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
}

/// Outcome of validating a pair of feature splits
#[derive(Debug, Clone)]
pub struct FrameValidation {
    pub drift_detected: bool,
    pub report: DriftReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    Training,
    Testing,
}

impl Split {
    fn as_str(self) -> &'static str {
        match self {
            Split::Training => "training",
            Split::Testing => "testing",
        }
    }
}

/// Message for one check category over both splits
fn category_message(label: &str, train_ok: bool, test_ok: bool) -> String {
    [(Split::Training, train_ok), (Split::Testing, test_ok)]
        .iter()
        .map(|(split, ok)| {
            if *ok {
                format!("No {} are missing in {} dataframe.", label.to_lowercase(), split.as_str())
            } else {
                format!("{} are missing in {} dataframe.", label, split.as_str())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct DataValidator {
    schema: Arc<Schema>,
    detector: DatasetDriftDetector,
    report_path: PathBuf,
}

impl DataValidator {
    pub fn new(schema: Arc<Schema>, detector: DatasetDriftDetector, report_path: impl Into<PathBuf>) -> Self {
        Self {
            schema,
            detector,
            report_path: report_path.into(),
        }
    }

    pub fn from_config(config: &DataValidationConfig, schema: Arc<Schema>) -> Self {
        let detector = DatasetDriftDetector::new(config.drift_threshold).with_policy(config.drift_policy);
        Self::new(schema, detector, config.drift_report_file_path.clone())
    }

    /// A feature split carries every declared column except the target
    pub fn validate_number_of_columns(&self, df: &DataFrame) -> bool {
        let status = df.width() + 1 == self.schema.total_columns();
        info!(status, width = df.width(), "Is required column present");
        status
    }

    pub fn is_numerical_column_exist(&self, df: &DataFrame) -> bool {
        let missing = Schema::missing_from(&self.schema.numerical_columns, &column_names(df));
        for column in &missing {
            warn!(column = %column, "Missing numerical column");
        }
        missing.is_empty()
    }

    pub fn is_categorical_column_exist(&self, df: &DataFrame) -> bool {
        let missing = Schema::missing_from(&self.schema.categorical_columns, &column_names(df));
        for column in &missing {
            warn!(column = %column, "Missing categorical column");
        }
        missing.is_empty()
    }

    /// Run the drift check with `base` as reference and persist the report
    pub fn detect_dataset_drift(&self, base: &DataFrame, current: &DataFrame) -> Result<(bool, DriftReport)> {
        self.detector.detect(base, current, &self.report_path)
    }

    /// Structural checks then drift check, on feature-only splits
    pub fn validate_frames(&self, train: &DataFrame, test: &DataFrame) -> Result<FrameValidation> {
        type Check = fn(&DataValidator, &DataFrame) -> bool;
        let checks: [(&str, Check); 3] = [
            ("Columns", DataValidator::validate_number_of_columns),
            ("Numerical columns", DataValidator::is_numerical_column_exist),
            ("Categorical columns", DataValidator::is_categorical_column_exist),
        ];

        for (label, check) in checks {
            let train_ok = check(self, train);
            let test_ok = check(self, test);
            let message = category_message(label, train_ok, test_ok);
            info!(message = %message, "{} validation", label);
            if !(train_ok && test_ok) {
                return Err(PipelineError::Validation(message));
            }
        }

        let (drift_detected, report) = self.detect_dataset_drift(train, test)?;
        if drift_detected {
            warn!(drifted = report.n_drifted(), columns = report.len(), "Data drift detected");
        } else {
            info!(columns = report.len(), "No data drift detected");
        }
        Ok(FrameValidation {
            drift_detected,
            report,
        })
    }
}

/// Validation stage bound to one pipeline run
pub struct DataValidation {
    config: DataValidationConfig,
    ingestion_artifact: DataIngestionArtifact,
    validator: DataValidator,
}

impl DataValidation {
    pub fn new(
        config: DataValidationConfig,
        ingestion_artifact: DataIngestionArtifact,
        schema: Arc<Schema>,
    ) -> Self {
        let validator = DataValidator::from_config(&config, schema);
        Self {
            config,
            ingestion_artifact,
            validator,
        }
    }

    fn features_only(&self, df: &DataFrame) -> Result<DataFrame> {
        let target = self.config.target_column.as_str();
        if df.get_column_names().iter().any(|c| c.as_str() == target) {
            Ok(df.drop(target)?)
        } else {
            Ok(df.clone())
        }
    }

    pub fn initiate_data_validation(&self) -> Result<DataValidationArtifact> {
        info!("Starting data validation");
        let train = load_csv(&self.ingestion_artifact.train_file_path)?;
        let test = load_csv(&self.ingestion_artifact.test_file_path)?;

        let train_features = self.features_only(&train)?;
        let test_features = self.features_only(&test)?;

        let outcome = match self.validator.validate_frames(&train_features, &test_features) {
            Ok(outcome) => outcome,
            Err(err) => {
                if matches!(err, PipelineError::Validation(_)) {
                    save_csv(&train, &self.config.invalid_train_file_path)?;
                    save_csv(&test, &self.config.invalid_test_file_path)?;
                }
                return Err(err);
            }
        };

        save_csv(&train, &self.config.valid_train_file_path)?;
        save_csv(&test, &self.config.valid_test_file_path)?;

        let artifact = DataValidationArtifact {
            validation_status: !outcome.drift_detected,
            drift_detected: outcome.drift_detected,
            valid_train_file_path: self.config.valid_train_file_path.clone(),
            valid_test_file_path: self.config.valid_test_file_path.clone(),
            invalid_train_file_path: self.config.invalid_train_file_path.clone(),
            invalid_test_file_path: self.config.invalid_test_file_path.clone(),
            drift_report_file_path: self.config.drift_report_file_path.clone(),
        };
        info!(
            validation_status = artifact.validation_status,
            report = %artifact.drift_report_file_path.display(),
            "Data validation completed"
        );
        Ok(artifact)
    }
}
