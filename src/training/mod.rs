//! Model training
//!
//! The regression capability the pipeline trains ([`KNNRegressor`] behind
//! the [`Regressor`] trait), its metrics, the persisted
//! [`TrainedModelBundle`], and the [`ModelTrainer`] stage that gates a
//! freshly fitted model on its training R².

mod bundle;
mod models;
mod trainer;
pub mod knn;

pub use bundle::TrainedModelBundle;
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use models::{Estimator, RegressionMetrics, Regressor};
pub use trainer::{ModelTrainer, ModelTrainerArtifact};
