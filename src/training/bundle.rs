//! Trained model bundle: the fitted preprocessor and estimator persisted together

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::ensure_parent;
use crate::error::{PipelineError, Result};
use crate::preprocessing::Scaler;
use crate::schema::Schema;
use crate::training::{Estimator, Regressor};
use crate::utils::columns_to_array2;

/// Fitted preprocessing transform plus fitted estimator, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelBundle {
    preprocessor: Scaler,
    estimator: Estimator,
    schema: Schema,
}

impl TrainedModelBundle {
    pub fn new(preprocessor: Scaler, estimator: Estimator, schema: Schema) -> Result<Self> {
        if !preprocessor.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        if preprocessor.columns() != schema.numerical_columns.as_slice() {
            return Err(PipelineError::ConfigError(format!(
                "Preprocessor was fitted on {:?}, schema declares numerical columns {:?}",
                preprocessor.columns(),
                schema.numerical_columns
            )));
        }
        Ok(Self {
            preprocessor,
            estimator,
            schema,
        })
    }

    pub fn preprocessor(&self) -> &Scaler {
        &self.preprocessor
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Model input for a raw frame: scaled numerical columns followed by the
    /// untouched categorical columns, both in schema order
    pub fn features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let scaled = self.preprocessor.transform(df)?;
        columns_to_array2(&scaled, &self.schema.feature_columns())
    }

    /// Predict on a raw frame, one value per row in input order
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.features(df)?;
        self.estimator.predict(&x)
    }

    /// Predict on an already transformed feature matrix
    pub fn predict_array(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator.predict(x)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Write the bundle to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            PipelineError::NotFound(format!("Model file {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::ScalerType;
    use crate::training::KNNConfig;
    use ndarray::Array1;

    fn schema() -> Schema {
        Schema::new(
            vec!["x1".into(), "x2".into(), "grp".into(), "y".into()],
            vec!["x1".into(), "x2".into()],
            vec!["grp".into()],
        )
    }

    fn frame() -> DataFrame {
        df!(
            "grp" => &[0i64, 1, 0, 1, 0, 1, 0, 1],
            "x1" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            "x2" => &[0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0]
        )
        .unwrap()
    }

    fn fitted_bundle() -> TrainedModelBundle {
        let schema = schema();
        let df = frame();
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &schema.numerical_columns).unwrap();

        let mut estimator = Estimator::knn(KNNConfig {
            n_neighbors: 2,
            ..Default::default()
        });
        let x = scaler.transform(&df).and_then(|s| columns_to_array2(&s, &schema.feature_columns())).unwrap();
        let y = Array1::from_iter((0..8).map(|i| i as f64 * 2.0));
        estimator.fit(&x, &y).unwrap();

        TrainedModelBundle::new(scaler, estimator, schema).unwrap()
    }

    #[test]
    fn test_features_are_reassembled_in_schema_order() {
        let bundle = fitted_bundle();
        let x = bundle.features(&frame()).unwrap();
        assert_eq!(x.shape(), &[8, 3]);
        // Categorical column is appended unscaled
        assert_eq!(x[[1, 2]], 1.0);
        assert!(x.column(0).sum().abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let bundle = fitted_bundle();
        let df = frame();
        let before = bundle.predict(&df).unwrap();

        let restored = TrainedModelBundle::from_bytes(&bundle.to_bytes().unwrap()).unwrap();
        let after = restored.predict(&df).unwrap();

        assert_eq!(before, after);
        assert_eq!(restored, bundle);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0/model.bin");
        let bundle = fitted_bundle();
        bundle.save(&path).unwrap();
        assert_eq!(TrainedModelBundle::load(&path).unwrap(), bundle);
    }

    #[test]
    fn test_mismatched_preprocessor_is_rejected() {
        let df = frame();
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &["x1".to_string()]).unwrap();
        let err = TrainedModelBundle::new(scaler, Estimator::knn(KNNConfig::default()), schema());
        assert!(matches!(err, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_missing_feature_column_fails_prediction() {
        let bundle = fitted_bundle();
        let df = frame().drop("grp").unwrap();
        assert!(bundle.predict(&df).is_err());
    }
}
