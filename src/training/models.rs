//! Estimator trait, estimator variants and regression metrics

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::training::knn::{KNNConfig, KNNRegressor};

/// Regression metrics for one split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    /// Compute R², RMSE and MAE.
    ///
    /// R² is 0.0 when the target has zero variance.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PipelineError::DataError(
                "Cannot score an empty split".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        // Constant target: exact predictions score 1, anything else 0
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            r2,
            rmse: mse.sqrt(),
            mae,
        })
    }
}

/// A fit/predict regression capability
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn name(&self) -> &'static str;
}

/// Serializable estimator variants a bundle can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    KNNRegressor(KNNRegressor),
}

impl Estimator {
    pub fn knn(config: KNNConfig) -> Self {
        Estimator::KNNRegressor(KNNRegressor::new(config))
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::KNNRegressor(model) => model.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::KNNRegressor(model) => model.predict(x),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Estimator::KNNRegressor(model) => model.name(),
        }
    }
}
