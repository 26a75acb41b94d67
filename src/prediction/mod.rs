//! Prediction service over the latest saved model

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::Result;
use crate::resolver::ModelResolver;

/// Name of the column appended to a frame by [`PredictionPipeline::predict_frame`]
pub const PREDICTION_COLUMN: &str = "predicted_column";

pub struct PredictionPipeline {
    resolver: ModelResolver,
}

impl PredictionPipeline {
    pub fn new(resolver: ModelResolver) -> Self {
        Self { resolver }
    }

    pub fn from_dir(model_dir: impl Into<std::path::PathBuf>) -> Self {
        Self::new(ModelResolver::from_dir(model_dir))
    }

    /// Frame with the prediction column appended, `None` when no model is saved.
    ///
    /// The served version is resolved once, so a push landing mid-request
    /// does not switch models between lookup and load.
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Option<DataFrame>> {
        let Some(version) = self.resolver.latest_version()? else {
            info!("No saved model, returning no predictions");
            return Ok(None);
        };
        let bundle = self.resolver.load_bundle(version)?;
        let predictions = bundle.predict(df)?;
        debug!(version, rows = df.height(), "Predicted");

        let mut out = df.clone();
        out.with_column(Column::new(PREDICTION_COLUMN.into(), predictions.to_vec()))?;
        Ok(Some(out))
    }

    /// One prediction per row in input order; empty when no model is saved
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let Some(frame) = self.predict_frame(df)? else {
            return Ok(Vec::new());
        };
        let values = frame
            .column(PREDICTION_COLUMN)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        Ok(values)
    }
}
