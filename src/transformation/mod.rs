//! Data transformation stage
//!
//! Fits the preprocessor on the training split and writes both splits as
//! numeric arrays laid out as `[numerical (scaled)..., categorical..., target]`.

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::DataTransformationConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::Scaler;
use crate::schema::Schema;
use crate::utils::{columns_to_array2, load_csv, save_array};
use crate::validation::DataValidationArtifact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

pub struct DataTransformation {
    config: DataTransformationConfig,
    validation_artifact: DataValidationArtifact,
    schema: Arc<Schema>,
}

impl DataTransformation {
    pub fn new(
        config: DataTransformationConfig,
        validation_artifact: DataValidationArtifact,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            config,
            validation_artifact,
            schema,
        }
    }

    /// Unfitted preprocessor for the configured scaling
    pub fn get_data_transformer_object(&self) -> Scaler {
        Scaler::new(self.config.scaler_type.clone())
    }

    /// Column order of a transformed array
    fn array_columns(&self) -> Vec<String> {
        let mut columns = self.schema.feature_columns();
        columns.push(self.config.target_column.clone());
        columns
    }

    fn to_array(&self, scaler: &Scaler, df: &DataFrame) -> Result<Array2<f64>> {
        let target = self.config.target_column.as_str();
        if !df.get_column_names().iter().any(|c| c.as_str() == target) {
            return Err(PipelineError::DataError(format!(
                "Target column {} is missing",
                target
            )));
        }
        let scaled = scaler.transform(df)?;
        columns_to_array2(&scaled, &self.array_columns())
    }

    pub fn initiate_data_transformation(&self) -> Result<DataTransformationArtifact> {
        let train = load_csv(&self.validation_artifact.valid_train_file_path)?;
        let test = load_csv(&self.validation_artifact.valid_test_file_path)?;

        let mut preprocessor = self.get_data_transformer_object();
        preprocessor.fit(&train, &self.schema.numerical_columns)?;

        let train_arr = self.to_array(&preprocessor, &train)?;
        let test_arr = self.to_array(&preprocessor, &test)?;

        save_array(&train_arr, &self.config.transformed_train_file_path)?;
        save_array(&test_arr, &self.config.transformed_test_file_path)?;
        preprocessor.save(&self.config.transformed_object_file_path)?;

        info!(
            train_shape = ?train_arr.shape(),
            test_shape = ?test_arr.shape(),
            scaler = ?preprocessor.scaler_type(),
            "Data transformation completed"
        );

        Ok(DataTransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        })
    }
}
