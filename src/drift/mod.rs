//! Drift detection module
//!
//! Compares a reference (base) sample against a current sample column by
//! column with a two-sample Kolmogorov-Smirnov test, and folds the
//! per-column decisions into a dataset-level verdict.

mod data_drift;
mod dataset_drift;

pub use data_drift::{ks_p_value, KolmogorovSmirnovTest};
pub use dataset_drift::DatasetDriftDetector;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Drift decision for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_status: bool,
}

/// Per-column drift results keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftReport {
    columns: BTreeMap<String, ColumnDrift>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, result: ColumnDrift) {
        self.columns.insert(column.into(), result);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDrift> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnDrift)> {
        self.columns.iter()
    }

    /// Names of columns whose p-value fell below the threshold
    pub fn drifted_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, r)| r.drift_status)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn n_drifted(&self) -> usize {
        self.columns.values().filter(|r| r.drift_status).count()
    }
}

/// How per-column decisions combine into the dataset verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DriftPolicy {
    /// Dataset drifts as soon as any single column drifts
    AnyColumn,
    /// Dataset drifts when at least this fraction of columns drift
    MinFraction(f64),
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self::AnyColumn
    }
}

impl DriftPolicy {
    /// Apply the policy to a finished report
    pub fn dataset_drift(&self, report: &DriftReport) -> bool {
        let n_drifted = report.n_drifted();
        match *self {
            DriftPolicy::AnyColumn => n_drifted > 0,
            DriftPolicy::MinFraction(fraction) => {
                if report.is_empty() {
                    return false;
                }
                // A zero fraction still needs one drifted column
                n_drifted > 0 && n_drifted as f64 / report.len() as f64 >= fraction
            }
        }
    }
}

/// A two-sample test that yields a p-value for "same distribution"
pub trait ColumnDriftTest: Send + Sync {
    /// P-value in `[0, 1]` for the hypothesis that both samples share a distribution
    fn p_value(&self, reference: &[f64], current: &[f64]) -> f64;
}
