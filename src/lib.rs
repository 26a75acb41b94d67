//! toxiflow - batch training and serving for aquatic toxicity regression
//!
//! Raw measurements flow through an artifact-passing pipeline:
//! ingestion, schema and drift validation, transformation, training with an
//! accuracy gate, evaluation against the served model and a versioned push.
//! Predictions are served from the latest saved version.
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`ingestion`] - Raw export, feature store and seeded train/test split
//! - [`validation`] - Structural checks and dataset drift verdict
//! - [`transformation`] - Preprocessor fitting and numeric arrays
//! - [`training`] - KNN regressor, metrics, model bundle and trainer
//! - [`evaluation`] - Comparison against the served model
//! - [`pusher`] - Publishing the accepted model as a new version
//! - [`pipeline`] - Orchestration and run state
//!
//! ## Serving
//! - [`resolver`] - Model version resolution over pluggable storage
//! - [`prediction`] - Predictions with the latest model
//!
//! ## Support
//! - [`schema`] - Column schema registry
//! - [`drift`] - Kolmogorov-Smirnov drift detection
//! - [`preprocessing`] - Feature scaling
//! - [`config`] - Pipeline configuration and artifact layout
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Building blocks
pub mod schema;
pub mod drift;
pub mod preprocessing;
pub mod utils;

// Pipeline stages
pub mod ingestion;
pub mod validation;
pub mod transformation;
pub mod training;
pub mod evaluation;
pub mod pusher;
pub mod pipeline;

// Serving
pub mod resolver;
pub mod prediction;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration; `Schema` stays at `toxiflow::schema::Schema` since
    // `polars::prelude` exports its own
    pub use crate::config::{PipelineConfig, TrainingPipelineConfig};

    // Drift detection
    pub use crate::drift::{ColumnDrift, DatasetDriftDetector, DriftPolicy, DriftReport};

    // Stages
    pub use crate::ingestion::{CsvDataSource, DataSource, FrameSource};
    pub use crate::validation::DataValidator;
    pub use crate::training::{KNNRegressor, RegressionMetrics, Regressor, TrainedModelBundle};
    pub use crate::pipeline::{PipelineOutcome, RunState, RunStatus, TrainPipeline};

    // Serving
    pub use crate::resolver::{FsModelStorage, InMemoryModelStorage, ModelResolver, ModelStorage};
    pub use crate::prediction::PredictionPipeline;
}
