//! Data loading utilities
//!
//! CSV frames in and out, frame-to-array conversion, and the bincode
//! encoding used for transformed arrays.

use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::config::ensure_parent;
use crate::error::{PipelineError, Result};

/// Load a CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        PipelineError::DataError(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()?;

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
    Ok(df)
}

/// Write a frame as CSV, creating parent directories
pub fn save_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df.clone())?;
    Ok(())
}

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

/// Extract named columns from a DataFrame into a row-major `Array2<f64>`.
/// Nulls become 0.0.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df.column(col_name).map_err(|_| {
                PipelineError::DataError(format!("Column not found: {}", col_name))
            })?;
            let column_f64 = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = column_f64
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}

/// Persist a numeric array with bincode
pub fn save_array(array: &Array2<f64>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let bytes = bincode::serialize(array)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Load a numeric array written by [`save_array`]
pub fn load_array(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        PipelineError::DataError(format!("Failed to read array {}: {}", path.display(), e))
    })?;
    Ok(bincode::deserialize(&bytes)?)
}
