//! Model evaluation stage
//!
//! Scores the freshly trained bundle against the served one on the
//! validated test split. A model is accepted when nothing is served yet, or
//! when its test R² beats the served model by more than the change
//! threshold.

use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::config::{ensure_parent, ModelEvaluationConfig};
use crate::error::{PipelineError, Result};
use crate::resolver::ModelResolver;
use crate::training::{ModelTrainerArtifact, RegressionMetrics, TrainedModelBundle};
use crate::utils::{columns_to_array2, load_csv};
use crate::validation::DataValidationArtifact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    pub is_model_accepted: bool,
    /// Trained minus served test R², `None` when nothing was served
    pub improved_accuracy: Option<f64>,
    pub best_model_path: Option<PathBuf>,
    pub trained_model_path: PathBuf,
    pub train_model_metric: RegressionMetrics,
    pub best_model_metric: Option<RegressionMetrics>,
}

pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
    validation_artifact: DataValidationArtifact,
    trainer_artifact: ModelTrainerArtifact,
    resolver: ModelResolver,
}

impl ModelEvaluation {
    pub fn new(
        config: ModelEvaluationConfig,
        validation_artifact: DataValidationArtifact,
        trainer_artifact: ModelTrainerArtifact,
        resolver: ModelResolver,
    ) -> Self {
        Self {
            config,
            validation_artifact,
            trainer_artifact,
            resolver,
        }
    }

    fn score(&self, bundle: &TrainedModelBundle, df: &DataFrame, y_true: &Array1<f64>) -> Result<RegressionMetrics> {
        let y_pred = bundle.predict(df)?;
        RegressionMetrics::compute(y_true, &y_pred)
    }

    pub fn initiate_model_evaluation(&self) -> Result<ModelEvaluationArtifact> {
        let trained_path = &self.trainer_artifact.trained_model_file_path;

        let artifact = match self.resolver.latest_version()? {
            None => {
                info!("No served model yet, accepting trained model");
                ModelEvaluationArtifact {
                    is_model_accepted: true,
                    improved_accuracy: None,
                    best_model_path: None,
                    trained_model_path: trained_path.clone(),
                    train_model_metric: self.trainer_artifact.test_metric,
                    best_model_metric: None,
                }
            }
            Some(version) => {
                let best_model_path = self.resolver.model_path(version);
                let best = self.resolver.load_bundle(version)?;
                let trained = TrainedModelBundle::load(trained_path)?;

                let test = load_csv(&self.validation_artifact.valid_test_file_path)?;
                let y_true = target_values(&test, &self.config.target_column)?;

                let trained_metric = self.score(&trained, &test, &y_true)?;
                let best_metric = self.score(&best, &test, &y_true)?;
                let improved = trained_metric.r2 - best_metric.r2;
                let accepted = improved > self.config.change_threshold;

                info!(
                    served_version = version,
                    trained_r2 = trained_metric.r2,
                    served_r2 = best_metric.r2,
                    improved,
                    threshold = self.config.change_threshold,
                    accepted,
                    "Compared trained model with served model"
                );

                ModelEvaluationArtifact {
                    is_model_accepted: accepted,
                    improved_accuracy: Some(improved),
                    best_model_path: Some(best_model_path),
                    trained_model_path: trained_path.clone(),
                    train_model_metric: trained_metric,
                    best_model_metric: Some(best_metric),
                }
            }
        };

        ensure_parent(&self.config.report_file_path)?;
        fs::write(&self.config.report_file_path, serde_yaml::to_string(&artifact)?)?;
        Ok(artifact)
    }

    /// Evaluate and turn a rejection into an error
    pub fn require_acceptance(&self) -> Result<ModelEvaluationArtifact> {
        let artifact = self.initiate_model_evaluation()?;
        if !artifact.is_model_accepted {
            return Err(PipelineError::ModelRejected {
                improvement: artifact.improved_accuracy.unwrap_or(0.0),
                threshold: self.config.change_threshold,
            });
        }
        Ok(artifact)
    }
}

fn target_values(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let values = columns_to_array2(df, &[target.to_string()])?;
    Ok(values.column(0).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, TrainingPipelineConfig};
    use crate::preprocessing::{Scaler, ScalerType};
    use crate::resolver::{InMemoryModelStorage, ModelStorage};
    use crate::schema::Schema;
    use crate::training::{Estimator, KNNConfig, Regressor};
    use crate::utils::save_csv;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn frame() -> DataFrame {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 3.0).collect();
        df!("x" => &x, "y" => &y).unwrap()
    }

    /// A bundle whose estimator was fitted on `target(x)` instead of the true `y`
    fn bundle(target: impl Fn(f64) -> f64) -> TrainedModelBundle {
        let schema = Schema::new(vec!["x".into(), "y".into()], vec!["x".into()], vec![]);
        let df = frame();
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &schema.numerical_columns).unwrap();
        let x = scaler.transform_to_array(&df).unwrap();
        let y: Array1<f64> = (0..30).map(|i| target(i as f64)).collect();
        let mut estimator = Estimator::knn(KNNConfig { n_neighbors: 1, ..Default::default() });
        estimator.fit(&x, &y).unwrap();
        TrainedModelBundle::new(scaler, estimator, schema).unwrap()
    }

    fn evaluation(dir: &Path, resolver: ModelResolver, trained: &TrainedModelBundle) -> ModelEvaluation {
        let pipeline = TrainingPipelineConfig::new(
            PipelineConfig::new().with_artifact_root(dir).with_target_column("y"),
        );
        let test_path = dir.join("valid/test.csv");
        save_csv(&frame(), &test_path).unwrap();
        let model_path = dir.join("trained/model.bin");
        trained.save(&model_path).unwrap();

        let metric = RegressionMetrics { r2: 1.0, rmse: 0.0, mae: 0.0 };
        ModelEvaluation::new(
            ModelEvaluationConfig::new(&pipeline),
            DataValidationArtifact {
                validation_status: true,
                drift_detected: false,
                valid_train_file_path: test_path.clone(),
                valid_test_file_path: test_path,
                invalid_train_file_path: dir.join("i1"),
                invalid_test_file_path: dir.join("i2"),
                drift_report_file_path: dir.join("r"),
            },
            ModelTrainerArtifact {
                trained_model_file_path: model_path,
                train_metric: metric,
                test_metric: metric,
            },
            resolver,
        )
    }

    #[test]
    fn test_accepts_when_nothing_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::new(Arc::new(InMemoryModelStorage::new("m")));
        let eval = evaluation(dir.path(), resolver, &bundle(|x| x * 3.0));

        let artifact = eval.require_acceptance().unwrap();
        assert!(artifact.is_model_accepted);
        assert_eq!(artifact.best_model_path, None);
        assert!(eval.config.report_file_path.exists());
    }

    #[test]
    fn test_accepts_clear_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::new(Arc::new(InMemoryModelStorage::new("m")));
        resolver.push(&bundle(|x| -x).to_bytes().unwrap()).unwrap();

        let artifact = evaluation(dir.path(), resolver, &bundle(|x| x * 3.0))
            .initiate_model_evaluation()
            .unwrap();
        assert!(artifact.is_model_accepted);
        assert!(artifact.improved_accuracy.unwrap() > 0.02);
    }

    #[test]
    fn test_rejects_model_that_does_not_improve() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::new(Arc::new(InMemoryModelStorage::new("m")));
        resolver.push(&bundle(|x| x * 3.0).to_bytes().unwrap()).unwrap();

        let eval = evaluation(dir.path(), resolver, &bundle(|x| x * 3.0));
        let artifact = eval.initiate_model_evaluation().unwrap();
        assert!(!artifact.is_model_accepted);
        assert_eq!(artifact.improved_accuracy, Some(0.0));

        assert!(matches!(
            eval.require_acceptance(),
            Err(PipelineError::ModelRejected { .. })
        ));
    }

    /// Storage where another writer pushes version 1 right after the first listing
    struct ConcurrentPushStorage {
        inner: InMemoryModelStorage,
        pending: Vec<u8>,
        pushed: AtomicBool,
    }

    impl ModelStorage for ConcurrentPushStorage {
        fn root(&self) -> &Path {
            self.inner.root()
        }

        fn list(&self) -> crate::error::Result<Vec<String>> {
            let names = self.inner.list()?;
            if !self.pushed.swap(true, Ordering::SeqCst) {
                self.inner.write(Path::new("1/model.bin"), &self.pending)?;
            }
            Ok(names)
        }

        fn exists(&self, key: &Path) -> bool {
            self.inner.exists(key)
        }

        fn read(&self, key: &Path) -> crate::error::Result<Vec<u8>> {
            self.inner.read(key)
        }

        fn write(&self, key: &Path, bytes: &[u8]) -> crate::error::Result<()> {
            self.inner.write(key, bytes)
        }
    }

    #[test]
    fn test_best_model_path_matches_scored_version() {
        let dir = tempfile::tempdir().unwrap();
        let inner = InMemoryModelStorage::new("m");
        inner.write(Path::new("0/model.bin"), &bundle(|x| -x).to_bytes().unwrap()).unwrap();
        let storage = ConcurrentPushStorage {
            inner,
            pending: bundle(|x| x * 3.0).to_bytes().unwrap(),
            pushed: AtomicBool::new(false),
        };
        let resolver = ModelResolver::new(Arc::new(storage));

        let artifact = evaluation(dir.path(), resolver.clone(), &bundle(|x| x * 3.0))
            .initiate_model_evaluation()
            .unwrap();

        // Version 0 was scored, so it is the one recorded even though 1 landed meanwhile
        assert_eq!(artifact.best_model_path, Some(PathBuf::from("m/0/model.bin")));
        assert!(artifact.is_model_accepted);
        assert_eq!(resolver.latest_version().unwrap(), Some(1));
    }
}
