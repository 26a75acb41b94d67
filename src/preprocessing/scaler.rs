//! Feature scaling implementations

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ensure_parent;
use crate::utils::data_loader::columns_to_array2;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// No scaling
    None,
}

impl Default for ScalerType {
    fn default() -> Self {
        Self::Standard
    }
}

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Column-wise feature scaler, fitted on named columns of a frame.
///
/// This is the preprocessing half of a trained model bundle: it remembers
/// the column order it was fitted on and replays it at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            columns: Vec::new(),
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> &ScalerType {
        &self.scaler_type
    }

    /// Columns the scaler was fitted on, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the scaler to the given columns of the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for col_name in columns {
            let series = Self::float_series(df, col_name)?;
            params.push(self.compute_params(&series)?);
        }

        self.columns = columns.to_vec();
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the fitted columns, leaving every other column untouched.
    /// Builds all replacement columns first, then applies them in one pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .zip(self.params.iter())
            .map(|(col_name, params)| {
                let series = Self::float_series(df, col_name)?;
                self.scale_series(&series, params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Scaled fitted columns as a row-major array, in fit order
    pub fn transform_to_array(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let scaled = self.transform(df)?;
        columns_to_array2(&scaled, &self.columns)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .zip(self.params.iter())
            .map(|(col_name, params)| {
                let series = Self::float_series(df, col_name)?;
                self.unscale_series(&series, params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for unscaled in replacements {
            result.with_column(unscaled)?;
        }

        Ok(result)
    }

    /// Persist the fitted scaler with bincode
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        std::fs::write(path, bincode::serialize(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::NotFound(format!("Preprocessor {}: {}", path.display(), e))
        })?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn float_series(df: &DataFrame, col_name: &str) -> Result<Series> {
        let column = df.column(col_name).map_err(|_| {
            PipelineError::DataError(format!("Column not found: {}", col_name))
        })?;
        let casted = column.cast(&DataType::Float64)?;
        Ok(casted.as_materialized_series().clone())
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let ca = series.f64()?;

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = ca.mean().unwrap_or(0.0);
                let std = ca.std(1).unwrap_or(1.0);
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                })
            }
            ScalerType::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(1.0);
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
            ScalerType::Robust => {
                let median = ca.median().unwrap_or(0.0);
                let q1 = ca.quantile(0.25, QuantileMethod::Linear).unwrap_or(Some(0.0)).unwrap_or(0.0);
                let q3 = ca.quantile(0.75, QuantileMethod::Linear).unwrap_or(Some(1.0)).unwrap_or(1.0);
                let iqr = q3 - q1;
                Ok(ScalerParams {
                    center: median,
                    scale: if iqr == 0.0 { 1.0 } else { iqr },
                })
            }
            ScalerType::None => Ok(ScalerParams {
                center: 0.0,
                scale: 1.0,
            }),
        }
    }

    fn scale_series(&self, series: &Series, params: &ScalerParams) -> Result<Series> {
        let ca = series.f64()?;

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.center) / params.scale))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }

    fn unscale_series(&self, series: &Series, params: &ScalerParams) -> Result<Series> {
        let ca = series.f64()?;

        let unscaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| v * params.scale + params.center))
            .collect();

        Ok(unscaled.with_name(series.name().clone()).into_series())
    }
}
