//! Model trainer stage

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::ModelTrainerConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::Scaler;
use crate::schema::Schema;
use crate::training::{Estimator, KNNConfig, RegressionMetrics, Regressor, TrainedModelBundle, WeightScheme};
use crate::transformation::DataTransformationArtifact;
use crate::utils::load_array;

/// Output of a successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub train_metric: RegressionMetrics,
    pub test_metric: RegressionMetrics,
}

/// Fits the estimator on the transformed training array and persists a
/// bundle only when the training R² clears the expected score.
pub struct ModelTrainer {
    config: ModelTrainerConfig,
    transformation_artifact: DataTransformationArtifact,
    schema: Arc<Schema>,
}

impl ModelTrainer {
    pub fn new(
        config: ModelTrainerConfig,
        transformation_artifact: DataTransformationArtifact,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            config,
            transformation_artifact,
            schema,
        }
    }

    fn estimator(&self) -> Estimator {
        Estimator::knn(KNNConfig {
            n_neighbors: self.config.n_neighbors,
            metric: self.config.distance_metric,
            weights: WeightScheme::Uniform,
        })
    }

    pub fn initiate_model_trainer(&self) -> Result<ModelTrainerArtifact> {
        let start = Instant::now();
        let train = load_array(&self.transformation_artifact.transformed_train_file_path)?;
        let test = load_array(&self.transformation_artifact.transformed_test_file_path)?;

        let (x_train, y_train) = split_features_target(&train)?;
        let (x_test, y_test) = split_features_target(&test)?;

        let mut estimator = self.estimator();
        estimator.fit(&x_train, &y_train)?;

        let train_metric = RegressionMetrics::compute(&y_train, &estimator.predict(&x_train)?)?;
        if train_metric.r2 <= self.config.expected_score {
            warn!(
                r2 = train_metric.r2,
                expected = self.config.expected_score,
                "Trained model is not good enough to provide expected accuracy"
            );
            return Err(PipelineError::Acceptance {
                score: train_metric.r2,
                expected: self.config.expected_score,
            });
        }

        let test_metric = RegressionMetrics::compute(&y_test, &estimator.predict(&x_test)?)?;
        let gap = (train_metric.r2 - test_metric.r2).abs();
        if gap > self.config.overfitting_threshold {
            warn!(
                gap,
                threshold = self.config.overfitting_threshold,
                "Train/test R² gap suggests over- or underfitting"
            );
        }

        let preprocessor = Scaler::load(&self.transformation_artifact.transformed_object_file_path)?;
        let bundle = TrainedModelBundle::new(preprocessor, estimator, (*self.schema).clone())?;
        bundle.save(&self.config.trained_model_file_path)?;

        info!(
            model = bundle.estimator().name(),
            train_r2 = train_metric.r2,
            test_r2 = test_metric.r2,
            train_rmse = train_metric.rmse,
            test_rmse = test_metric.rmse,
            elapsed_ms = start.elapsed().as_millis() as u64,
            path = %self.config.trained_model_file_path.display(),
            "Model trained"
        );

        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            train_metric,
            test_metric,
        })
    }
}

/// Split a transformed array into its feature block and the trailing target column
pub(crate) fn split_features_target(array: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    if array.ncols() < 2 {
        return Err(PipelineError::ShapeError {
            expected: "at least one feature column and a target column".to_string(),
            actual: format!("{} columns", array.ncols()),
        });
    }
    let last = array.ncols() - 1;
    Ok((
        array.slice(s![.., ..last]).to_owned(),
        array.column(last).to_owned(),
    ))
}
