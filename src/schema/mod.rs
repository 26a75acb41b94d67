//! Column schema registry
//!
//! Loads the static description of the dataset: the ordered list of all
//! columns (target included), and the numerical / categorical feature
//! subsets every stage checks against.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// A schema entry, either a bare column name or a `{name: dtype}` map
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ColumnEntry {
    Name(String),
    Typed(std::collections::BTreeMap<String, String>),
}

impl ColumnEntry {
    fn into_names(self) -> Vec<String> {
        match self {
            ColumnEntry::Name(name) => vec![name],
            ColumnEntry::Typed(map) => map.into_keys().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<ColumnEntry>,
    #[serde(default)]
    numerical_columns: Vec<ColumnEntry>,
    #[serde(default)]
    categorical_columns: Vec<ColumnEntry>,
    #[serde(default)]
    drop_columns: Vec<ColumnEntry>,
}

fn flatten(entries: Vec<ColumnEntry>) -> Vec<String> {
    entries.into_iter().flat_map(ColumnEntry::into_names).collect()
}

/// Immutable column schema shared by all stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// All expected columns in order, including the target
    pub columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Columns removed from the raw export before splitting
    pub drop_columns: Vec<String>,
}

impl Schema {
    pub fn new(
        columns: Vec<String>,
        numerical_columns: Vec<String>,
        categorical_columns: Vec<String>,
    ) -> Self {
        Self {
            columns,
            numerical_columns,
            categorical_columns,
            drop_columns: Vec::new(),
        }
    }

    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    /// Parse a schema from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let raw: RawSchema = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::ConfigError(format!("Invalid schema: {}", e)))?;

        let schema = Self {
            columns: flatten(raw.columns),
            numerical_columns: flatten(raw.numerical_columns),
            categorical_columns: flatten(raw.categorical_columns),
            drop_columns: flatten(raw.drop_columns),
        };
        schema.check()?;
        Ok(schema)
    }

    /// Load a schema file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!(
                "Failed to read schema file {}: {}",
                path.display(),
                e
            ))
        })?;
        let schema = Self::from_yaml_str(&text)?;
        debug!(
            path = %path.display(),
            columns = schema.total_columns(),
            numerical = schema.numerical_columns.len(),
            categorical = schema.categorical_columns.len(),
            "Loaded schema"
        );
        Ok(schema)
    }

    fn check(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(PipelineError::ConfigError(
                "Schema declares no columns".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "Duplicate column in schema: {}",
                    column
                )));
            }
        }
        Ok(())
    }

    /// Declared number of columns, target included
    pub fn total_columns(&self) -> usize {
        self.columns.len()
    }

    /// Feature columns in the order a fitted model expects them:
    /// numerical first, then categorical
    pub fn feature_columns(&self) -> Vec<String> {
        self.numerical_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .cloned()
            .collect()
    }

    /// Names from `required` that are absent from `present`
    pub fn missing_from<'a>(required: &'a [String], present: &[String]) -> Vec<&'a str> {
        let present: HashSet<&str> = present.iter().map(String::as_str).collect();
        required
            .iter()
            .filter(|c| !present.contains(c.as_str()))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA_YAML: &str = r#"
columns:
  - CIC0: float
  - SM1_Dz: float
  - GATS1i: float
  - NdsCH: int
  - NdssC: int
  - MLOGP: float
  - LC50: float
numerical_columns:
  - CIC0
  - SM1_Dz
  - GATS1i
  - MLOGP
categorical_columns:
  - NdsCH
  - NdssC
"#;

    #[test]
    fn test_parse_typed_columns() {
        let schema = Schema::from_yaml_str(SCHEMA_YAML).unwrap();
        assert_eq!(schema.total_columns(), 7);
        assert_eq!(schema.columns[0], "CIC0");
        assert_eq!(schema.columns[6], "LC50");
        assert_eq!(schema.numerical_columns.len(), 4);
        assert!(schema.drop_columns.is_empty());
    }

    #[test]
    fn test_feature_columns_order() {
        let schema = Schema::from_yaml_str(SCHEMA_YAML).unwrap();
        assert_eq!(
            schema.feature_columns(),
            vec!["CIC0", "SM1_Dz", "GATS1i", "MLOGP", "NdsCH", "NdssC"]
        );
    }

    #[test]
    fn test_plain_names_and_drop_columns() {
        let yaml = "columns: [a, b, y]\nnumerical_columns: [a]\ncategorical_columns: [b]\ndrop_columns: [id]\n";
        let schema = Schema::from_yaml_str(yaml).unwrap();
        assert_eq!(schema.columns, vec!["a", "b", "y"]);
        assert_eq!(schema.drop_columns, vec!["id"]);
    }

    #[test]
    fn test_empty_schema_is_config_error() {
        let err = Schema::from_yaml_str("columns: []\n").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_missing_schema_file() {
        let err = Schema::load("/definitely/not/here/schema.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_missing_from() {
        let required = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let present = vec!["c".to_string(), "a".to_string()];
        assert_eq!(Schema::missing_from(&required, &present), vec!["b"]);
    }
}
