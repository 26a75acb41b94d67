//! Error types for the toxiflow pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A split does not conform to the schema (missing or extra columns)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The trained model did not clear the minimum accuracy gate
    #[error("Acceptance error: train R² {score:.4} does not exceed expected score {expected:.4}")]
    Acceptance { score: f64, expected: f64 },

    /// The trained model is not better than the currently served one
    #[error("Model rejected: improvement {improvement:.4} does not exceed threshold {threshold:.4}")]
    ModelRejected { improvement: f64, threshold: f64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Training pipeline is already running")]
    AlreadyRunning,

    /// Failure raised inside a pipeline stage, tagged with the stage name
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl PipelineError {
    /// Wrap an error with the name of the stage that produced it
    pub fn in_stage(stage: &'static str, err: PipelineError) -> Self {
        PipelineError::Stage {
            stage,
            source: Box::new(err),
        }
    }

    /// The innermost error, skipping stage wrappers
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Validation("Columns are missing in training dataframe".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: Columns are missing in training dataframe"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::IoError(_)));
    }

    #[test]
    fn test_stage_wrapping_keeps_root() {
        let err = PipelineError::in_stage(
            "model_trainer",
            PipelineError::Acceptance { score: 0.2, expected: 0.5 },
        );
        assert!(err.to_string().starts_with("Stage 'model_trainer' failed"));
        assert!(matches!(err.root(), PipelineError::Acceptance { .. }));
    }
}
