//! Data ingestion stage
//!
//! Pulls the raw export from a [`DataSource`], drops the schema's excluded
//! columns, keeps a feature-store copy and writes a seeded, shuffled
//! train/test split.

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::DataIngestionConfig;
use crate::error::{PipelineError, Result};
use crate::schema::Schema;
use crate::utils::{load_csv, save_csv};

/// Source of the raw dataset
pub trait DataSource: Send + Sync {
    fn export_frame(&self) -> Result<DataFrame>;

    fn describe(&self) -> String;
}

/// Raw export kept as a CSV file
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for CsvDataSource {
    fn export_frame(&self) -> Result<DataFrame> {
        load_csv(&self.path)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// A frame already held in memory
#[derive(Debug, Clone)]
pub struct FrameSource(pub DataFrame);

impl DataSource for FrameSource {
    fn export_frame(&self) -> Result<DataFrame> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("frame:{}x{}", self.0.height(), self.0.width())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub feature_store_file_path: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

pub struct DataIngestion {
    config: DataIngestionConfig,
    source: Arc<dyn DataSource>,
    schema: Arc<Schema>,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, source: Arc<dyn DataSource>, schema: Arc<Schema>) -> Self {
        Self {
            config,
            source,
            schema,
        }
    }

    /// Export the raw frame into the feature store, minus dropped columns
    pub fn export_data_into_feature_store(&self) -> Result<DataFrame> {
        let mut df = self.source.export_frame()?;
        if df.height() == 0 {
            return Err(PipelineError::DataError(format!(
                "Source {} returned no rows",
                self.source.describe()
            )));
        }

        for column in &self.schema.drop_columns {
            if df.get_column_names().iter().any(|c| c.as_str() == column.as_str()) {
                df = df.drop(column)?;
                debug!(column = %column, "Dropped column");
            }
        }

        save_csv(&df, &self.config.feature_store_file_path)?;
        info!(
            source = %self.source.describe(),
            rows = df.height(),
            cols = df.width(),
            path = %self.config.feature_store_file_path.display(),
            "Exported data into feature store"
        );
        Ok(df)
    }

    /// Shuffle with the configured seed, then write the train and test CSVs
    pub fn split_data_as_train_test(&self, df: &DataFrame) -> Result<()> {
        let (train, test) = train_test_split(df, self.config.train_test_split_ratio, self.config.random_state)?;
        save_csv(&train, &self.config.training_file_path)?;
        save_csv(&test, &self.config.testing_file_path)?;
        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            "Performed train test split"
        );
        Ok(())
    }

    pub fn initiate_data_ingestion(&self) -> Result<DataIngestionArtifact> {
        let df = self.export_data_into_feature_store()?;
        self.split_data_as_train_test(&df)?;
        Ok(DataIngestionArtifact {
            feature_store_file_path: self.config.feature_store_file_path.clone(),
            train_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        })
    }
}

/// Seeded shuffled split. A frame with two or more rows always yields at
/// least one row on each side.
pub fn train_test_split(df: &DataFrame, test_ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    if !(0.0..1.0).contains(&test_ratio) {
        return Err(PipelineError::ConfigError(format!(
            "test split ratio must be in [0, 1), got {}",
            test_ratio
        )));
    }

    let n = df.height();
    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut n_test = (n as f64 * test_ratio).round() as usize;
    if n >= 2 {
        n_test = n_test.clamp(1, n - 1);
    } else {
        n_test = 0;
    }

    let (test_idx, train_idx) = indices.split_at(n_test);
    let train = df.take(&IdxCa::from_vec("idx".into(), train_idx.to_vec()))?;
    let test = df.take(&IdxCa::from_vec("idx".into(), test_idx.to_vec()))?;
    Ok((train, test))
}
