//! Dataset-level drift detection over data frames

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ensure_parent;
use crate::drift::{ColumnDrift, ColumnDriftTest, DriftPolicy, DriftReport, KolmogorovSmirnovTest};
use crate::error::Result;

/// Runs the KS test on every column of a base frame and persists the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDriftDetector {
    test: KolmogorovSmirnovTest,
    /// Columns with a p-value strictly below this are drifted
    threshold: f64,
    policy: DriftPolicy,
}

impl DatasetDriftDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            test: KolmogorovSmirnovTest::new(),
            threshold,
            policy: DriftPolicy::AnyColumn,
        }
    }

    pub fn with_policy(mut self, policy: DriftPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare `current` against `base`, write the report to `report_path`,
    /// and return the dataset verdict together with the report.
    ///
    /// Never fails on data shape; only report persistence can fail.
    pub fn detect(
        &self,
        base: &DataFrame,
        current: &DataFrame,
        report_path: &Path,
    ) -> Result<(bool, DriftReport)> {
        let report = self.build_report(base, current);
        let overall_drift = self.policy.dataset_drift(&report);

        ensure_parent(report_path)?;
        fs::write(report_path, serde_yaml::to_string(&report)?)?;

        info!(
            n_features = report.len(),
            n_drifted = report.n_drifted(),
            dataset_drift = overall_drift,
            report = %report_path.display(),
            "Drift detected in {} out of {} columns",
            report.n_drifted(),
            report.len()
        );

        Ok((overall_drift, report))
    }

    /// Per-column results without touching the filesystem
    pub fn build_report(&self, base: &DataFrame, current: &DataFrame) -> DriftReport {
        let mut report = DriftReport::new();

        for column in base.get_columns() {
            let name = column.name().as_str();
            let result = match current.column(name) {
                Ok(other) => {
                    let (reference, test) = paired_values(column, other);
                    let p_value = self.test.p_value(&reference, &test);
                    ColumnDrift {
                        p_value,
                        drift_status: p_value < self.threshold,
                    }
                }
                Err(_) => {
                    warn!(column = %name, "Column missing from current sample, marking as drifted");
                    ColumnDrift {
                        p_value: 0.0,
                        drift_status: true,
                    }
                }
            };
            debug!(column = %name, p_value = result.p_value, drifted = result.drift_status, "Column drift");
            report.insert(name, result);
        }

        report
    }
}

impl Default for DatasetDriftDetector {
    fn default() -> Self {
        Self::new(crate::config::DATA_VALIDATION_DRIFT_THRESHOLD)
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean
    )
}

fn numeric_values(column: &Column) -> Option<Vec<f64>> {
    let casted = column.cast(&DataType::Float64).ok()?;
    let values = casted
        .f64()
        .ok()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    Some(values)
}

fn string_values(column: &Column) -> Vec<String> {
    column
        .cast(&DataType::String)
        .ok()
        .and_then(|c| {
            c.as_materialized_series().str().ok().map(|ca| {
                ca.into_iter()
                    .flatten()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
            })
        })
        .unwrap_or_default()
}

/// Extract both samples on a common numeric scale.
///
/// Numeric pairs are compared as-is. Anything else is compared on the rank
/// of each value within the sorted union of categories of both samples.
fn paired_values(base: &Column, current: &Column) -> (Vec<f64>, Vec<f64>) {
    if is_numeric(base.dtype()) && is_numeric(current.dtype()) {
        if let (Some(a), Some(b)) = (numeric_values(base), numeric_values(current)) {
            return (a, b);
        }
    }

    let a = string_values(base);
    let b = string_values(current);
    let mut ranks: BTreeMap<&str, f64> = BTreeMap::new();
    for value in a.iter().chain(b.iter()) {
        ranks.insert(value.as_str(), 0.0);
    }
    for (i, rank) in ranks.values_mut().enumerate() {
        *rank = i as f64;
    }
    let encode = |values: &[String]| -> Vec<f64> {
        values.iter().map(|v| ranks[v.as_str()]).collect()
    };
    (encode(&a), encode(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn base_frame() -> DataFrame {
        let a: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let b: Vec<f64> = (0..40).map(|i| ((i * 7) % 13) as f64).collect();
        let c: Vec<&str> = (0..40).map(|i| if i % 3 == 0 { "x" } else { "y" }).collect();
        df!("a" => &a, "b" => &b, "c" => &c).unwrap()
    }

    #[test]
    fn test_identical_frames_do_not_drift() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/drift/report.yaml");
        let df = base_frame();

        let (drift, report) = DatasetDriftDetector::new(0.05)
            .detect(&df, &df, &path)
            .unwrap();

        assert!(!drift);
        assert_eq!(report.len(), 3);
        assert!(report.iter().all(|(_, r)| !r.drift_status));
        assert!(path.exists());
    }

    #[test]
    fn test_shifted_column_drifts() {
        let dir = tempdir().unwrap();
        let base = base_frame();
        let shifted: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut current = base.clone();
        current.with_column(Series::new("a".into(), shifted)).unwrap();

        let (drift, report) = DatasetDriftDetector::new(0.05)
            .detect(&base, &current, &dir.path().join("report.yaml"))
            .unwrap();

        assert!(drift);
        let a = report.get("a").unwrap();
        assert!(a.p_value < 0.05);
        assert!(a.drift_status);
        assert!(!report.get("b").unwrap().drift_status);
        assert_eq!(report.drifted_columns(), vec!["a"]);
    }

    #[test]
    fn test_report_file_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.yaml");
        let df = base_frame();

        let (_, report) = DatasetDriftDetector::default().detect(&df, &df, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: DriftReport = serde_yaml::from_str(&text).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_missing_column_is_reported_not_raised() {
        let base = base_frame();
        let current = base.drop("b").unwrap();

        let report = DatasetDriftDetector::new(0.05).build_report(&base, &current);
        let b = report.get("b").unwrap();
        assert!(b.drift_status);
        assert_eq!(b.p_value, 0.0);
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let base = base_frame();
        let current = base_frame();
        let _ = DatasetDriftDetector::new(0.05).build_report(&base, &current);
        assert!(base.equals(&base_frame()));
        assert!(current.equals(&base_frame()));
    }

    #[test]
    fn test_min_fraction_policy_tolerates_single_column() {
        let base = base_frame();
        let shifted: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let mut current = base.clone();
        current.with_column(Series::new("a".into(), shifted)).unwrap();

        let detector = DatasetDriftDetector::new(0.05).with_policy(DriftPolicy::MinFraction(0.5));
        let report = detector.build_report(&base, &current);
        assert_eq!(report.n_drifted(), 1);
        assert!(!DriftPolicy::MinFraction(0.5).dataset_drift(&report));
    }
}
