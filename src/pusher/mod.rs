//! Model pusher stage: publishes an accepted bundle as the next version

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::config::{ensure_parent, ModelPusherConfig};
use crate::error::Result;
use crate::evaluation::ModelEvaluationArtifact;
use crate::resolver::ModelResolver;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPusherArtifact {
    /// Where the bundle landed in the served model store
    pub saved_model_path: PathBuf,
    /// Copy kept with the run's artifacts
    pub model_file_path: PathBuf,
}

pub struct ModelPusher {
    config: ModelPusherConfig,
    evaluation_artifact: ModelEvaluationArtifact,
    resolver: ModelResolver,
}

impl ModelPusher {
    pub fn new(
        config: ModelPusherConfig,
        evaluation_artifact: ModelEvaluationArtifact,
        resolver: ModelResolver,
    ) -> Self {
        Self {
            config,
            evaluation_artifact,
            resolver,
        }
    }

    pub fn initiate_model_pusher(&self) -> Result<ModelPusherArtifact> {
        let bytes = fs::read(&self.evaluation_artifact.trained_model_path)?;

        ensure_parent(&self.config.model_file_path)?;
        fs::write(&self.config.model_file_path, &bytes)?;

        let saved_model_path = self.resolver.push(&bytes)?;
        info!(
            saved_model_path = %saved_model_path.display(),
            "Pushed model"
        );

        Ok(ModelPusherArtifact {
            saved_model_path,
            model_file_path: self.config.model_file_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, TrainingPipelineConfig, MODEL_FILE_NAME};
    use crate::training::RegressionMetrics;

    #[test]
    fn test_push_writes_next_version_and_artifact_copy() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("saved_models");
        let resolver = ModelResolver::from_dir(&model_dir);

        let trained = dir.path().join("trained.bin");
        fs::write(&trained, b"bundle").unwrap();
        fs::create_dir_all(model_dir.join("0")).unwrap();
        fs::write(model_dir.join("0").join(MODEL_FILE_NAME), b"old").unwrap();

        let pipeline = TrainingPipelineConfig::new(PipelineConfig::new().with_artifact_root(dir.path()));
        let metric = RegressionMetrics { r2: 0.9, rmse: 0.1, mae: 0.1 };
        let evaluation = ModelEvaluationArtifact {
            is_model_accepted: true,
            improved_accuracy: Some(0.1),
            best_model_path: None,
            trained_model_path: trained,
            train_model_metric: metric,
            best_model_metric: None,
        };

        let artifact = ModelPusher::new(ModelPusherConfig::new(&pipeline), evaluation, resolver.clone())
            .initiate_model_pusher()
            .unwrap();

        assert_eq!(artifact.saved_model_path, model_dir.join("1").join(MODEL_FILE_NAME));
        assert_eq!(fs::read(&artifact.saved_model_path).unwrap(), b"bundle");
        assert_eq!(fs::read(&artifact.model_file_path).unwrap(), b"bundle");
        assert_eq!(resolver.versions().unwrap(), vec![0, 1]);
    }
}
