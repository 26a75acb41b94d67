//! Training orchestrator
//!
//! Runs ingestion, validation, transformation, training, evaluation and
//! push in that order. The first failing stage aborts the run, and its
//! error comes back tagged with the stage name. A [`RunState`] makes sure
//! only one run is active at a time.

mod state;

pub use state::{RunGuard, RunState, RunStatus};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelEvaluationConfig,
    ModelPusherConfig, ModelTrainerConfig, PipelineConfig, TrainingPipelineConfig,
};
use crate::error::{PipelineError, Result};
use crate::evaluation::{ModelEvaluation, ModelEvaluationArtifact};
use crate::ingestion::{DataIngestion, DataIngestionArtifact, DataSource};
use crate::pusher::{ModelPusher, ModelPusherArtifact};
use crate::resolver::ModelResolver;
use crate::schema::Schema;
use crate::training::{ModelTrainer, ModelTrainerArtifact};
use crate::transformation::{DataTransformation, DataTransformationArtifact};
use crate::validation::{DataValidation, DataValidationArtifact};

/// Artifacts of a successful run, one per stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub artifact_dir: PathBuf,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub trainer: ModelTrainerArtifact,
    pub evaluation: ModelEvaluationArtifact,
    pub pusher: ModelPusherArtifact,
}

/// File name of the run summary written into the run's artifact directory
pub const OUTCOME_FILE_NAME: &str = "outcome.json";

impl PipelineOutcome {
    /// Save the run summary as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Run one stage, logging its timing and tagging a failure with its name
fn run_stage<T>(stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    info!(stage, "Stage started");
    match f() {
        Ok(out) => {
            info!(stage, elapsed_ms = start.elapsed().as_millis() as u64, "Stage completed");
            Ok(out)
        }
        Err(err) => {
            error!(stage, error = %err, "Stage failed");
            Err(PipelineError::in_stage(stage, err))
        }
    }
}

pub struct TrainPipeline {
    config: PipelineConfig,
    source: Arc<dyn DataSource>,
    schema: Option<Arc<Schema>>,
    resolver: ModelResolver,
    state: Arc<RunState>,
}

impl TrainPipeline {
    /// Pipeline over `source` sharing the process-wide run state
    pub fn new(config: PipelineConfig, source: Arc<dyn DataSource>) -> Self {
        let resolver = ModelResolver::from_dir(&config.saved_model_dir);
        Self {
            config,
            source,
            schema: None,
            resolver,
            state: RunState::global(),
        }
    }

    pub fn with_state(mut self, state: Arc<RunState>) -> Self {
        self.state = state;
        self
    }

    /// Use this schema instead of loading `schema_file_path` on each run
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_resolver(mut self, resolver: ModelResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    pub fn is_pipeline_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn status(&self) -> RunStatus {
        self.state.status()
    }

    fn schema(&self) -> Result<Arc<Schema>> {
        match &self.schema {
            Some(schema) => Ok(schema.clone()),
            None => Ok(Arc::new(Schema::load(&self.config.schema_file_path)?)),
        }
    }

    pub fn start_data_ingestion(
        &self,
        run: &TrainingPipelineConfig,
        schema: &Arc<Schema>,
    ) -> Result<DataIngestionArtifact> {
        DataIngestion::new(DataIngestionConfig::new(run), self.source.clone(), schema.clone())
            .initiate_data_ingestion()
    }

    pub fn start_data_validation(
        &self,
        run: &TrainingPipelineConfig,
        schema: &Arc<Schema>,
        ingestion: &DataIngestionArtifact,
    ) -> Result<DataValidationArtifact> {
        DataValidation::new(DataValidationConfig::new(run), ingestion.clone(), schema.clone())
            .initiate_data_validation()
    }

    pub fn start_data_transformation(
        &self,
        run: &TrainingPipelineConfig,
        schema: &Arc<Schema>,
        validation: &DataValidationArtifact,
    ) -> Result<DataTransformationArtifact> {
        DataTransformation::new(DataTransformationConfig::new(run), validation.clone(), schema.clone())
            .initiate_data_transformation()
    }

    pub fn start_model_trainer(
        &self,
        run: &TrainingPipelineConfig,
        schema: &Arc<Schema>,
        transformation: &DataTransformationArtifact,
    ) -> Result<ModelTrainerArtifact> {
        ModelTrainer::new(ModelTrainerConfig::new(run), transformation.clone(), schema.clone())
            .initiate_model_trainer()
    }

    pub fn start_model_evaluation(
        &self,
        run: &TrainingPipelineConfig,
        validation: &DataValidationArtifact,
        trainer: &ModelTrainerArtifact,
    ) -> Result<ModelEvaluationArtifact> {
        ModelEvaluation::new(
            ModelEvaluationConfig::new(run),
            validation.clone(),
            trainer.clone(),
            self.resolver.clone(),
        )
        .require_acceptance()
    }

    pub fn start_model_pusher(
        &self,
        run: &TrainingPipelineConfig,
        evaluation: &ModelEvaluationArtifact,
    ) -> Result<ModelPusherArtifact> {
        ModelPusher::new(ModelPusherConfig::new(run), evaluation.clone(), self.resolver.clone())
            .initiate_model_pusher()
    }

    /// Run every stage in order. Fails with [`PipelineError::AlreadyRunning`]
    /// without touching anything when another run holds the state.
    pub fn run_pipeline(&self) -> Result<PipelineOutcome> {
        let guard = self.state.try_begin()?;
        let start = Instant::now();
        let run = TrainingPipelineConfig::new(self.config.clone());
        info!(
            pipeline = %self.config.pipeline_name,
            artifact_dir = %run.artifact_dir.display(),
            "Training pipeline started"
        );

        let schema = run_stage("schema", || self.schema())?;
        let ingestion = run_stage("data_ingestion", || self.start_data_ingestion(&run, &schema))?;
        let validation = run_stage("data_validation", || {
            self.start_data_validation(&run, &schema, &ingestion)
        })?;
        let transformation = run_stage("data_transformation", || {
            self.start_data_transformation(&run, &schema, &validation)
        })?;
        let trainer = run_stage("model_trainer", || {
            self.start_model_trainer(&run, &schema, &transformation)
        })?;
        let evaluation = run_stage("model_evaluation", || {
            self.start_model_evaluation(&run, &validation, &trainer)
        })?;
        let pusher = run_stage("model_pusher", || self.start_model_pusher(&run, &evaluation))?;

        let outcome = PipelineOutcome {
            artifact_dir: run.artifact_dir,
            ingestion,
            validation,
            transformation,
            trainer,
            evaluation,
            pusher,
        };
        outcome.save(outcome.artifact_dir.join(OUTCOME_FILE_NAME))?;

        guard.succeed();
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = %outcome.pusher.saved_model_path.display(),
            "Training pipeline completed"
        );
        Ok(outcome)
    }
}
