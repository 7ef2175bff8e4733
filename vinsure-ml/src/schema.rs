//! Declarative dataset schema.
//!
//! Loaded once from YAML and checked at load time, so later stages can treat it
//! as ground truth without re-validating keys.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[serde(alias = "int64")]
    Int,
    #[serde(alias = "float64")]
    Float,
    #[serde(alias = "object", alias = "str", alias = "string")]
    Category,
    #[serde(alias = "boolean")]
    Bool,
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Schema for the insurance dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Every column the raw table must carry, in declaration order.
    pub columns: Vec<ColumnSpec>,
    pub numerical_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Standard-scaled feature columns.
    pub num_features: Vec<String>,
    /// Min-max-scaled feature columns.
    pub nm_columns: Vec<String>,
    /// Identifier column removed before feature engineering.
    pub drop_columns: String,
}

/// On-disk layout: `columns` is a list of single-entry `{name: dtype}` maps.
#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<BTreeMap<String, ColumnKind>>,
    #[serde(default)]
    numerical_columns: Vec<String>,
    #[serde(default)]
    categorical_columns: Vec<String>,
    #[serde(default)]
    num_features: Vec<String>,
    #[serde(default, alias = "mm_columns")]
    nm_columns: Vec<String>,
    drop_columns: String,
}

impl SchemaDefinition {
    /// Read and validate a schema file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        let schema = Self::from_yaml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            columns = schema.columns.len(),
            "Schema loaded"
        );
        Ok(schema)
    }

    /// Parse and validate schema YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self, PipelineError> {
        let raw: RawSchema = serde_yaml::from_str(content)?;

        let mut columns = Vec::with_capacity(raw.columns.len());
        for (i, entry) in raw.columns.into_iter().enumerate() {
            if entry.len() != 1 {
                return Err(PipelineError::schema(format!(
                    "columns[{i}] must map exactly one name to a dtype, found {} entries",
                    entry.len()
                )));
            }
            if let Some((name, kind)) = entry.into_iter().next() {
                columns.push(ColumnSpec { name, kind });
            }
        }

        let schema = Self {
            columns,
            numerical_columns: raw.numerical_columns,
            categorical_columns: raw.categorical_columns,
            num_features: raw.num_features,
            nm_columns: raw.nm_columns,
            drop_columns: raw.drop_columns,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.columns.is_empty() {
            return Err(PipelineError::schema("'columns' is empty"));
        }

        let mut declared = HashSet::new();
        for col in &self.columns {
            if !declared.insert(col.name.as_str()) {
                return Err(PipelineError::schema(format!(
                    "column '{}' is declared twice",
                    col.name
                )));
            }
        }

        let lists = [
            ("numerical_columns", &self.numerical_columns),
            ("categorical_columns", &self.categorical_columns),
            ("num_features", &self.num_features),
            ("nm_columns", &self.nm_columns),
        ];
        for (key, names) in lists {
            if let Some(unknown) = names.iter().find(|n| !declared.contains(n.as_str())) {
                return Err(PipelineError::schema(format!(
                    "'{key}' references undeclared column '{unknown}'"
                )));
            }
        }

        if let Some(both) = self
            .num_features
            .iter()
            .find(|n| self.nm_columns.contains(*n))
        {
            return Err(PipelineError::schema(format!(
                "column '{both}' is in both num_features and nm_columns"
            )));
        }

        if self.drop_columns.trim().is_empty() {
            return Err(PipelineError::schema("'drop_columns' is empty"));
        }
        Ok(())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn expected_column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const VEHICLE_SCHEMA: &str = r#"
columns:
  - id: int
  - Gender: category
  - Age: int
  - Driving_License: int
  - Region_Code: float
  - Previously_Insured: int
  - Vehicle_Age: category
  - Vehicle_Damage: category
  - Annual_Premium: float
  - Policy_Sales_Channel: float
  - Vintage: int
  - Response: int
numerical_columns: [Age, Driving_License, Region_Code, Previously_Insured, Annual_Premium, Policy_Sales_Channel, Vintage, Response]
categorical_columns: [Gender, Vehicle_Age, Vehicle_Damage]
drop_columns: id
num_features: [Age, Vintage]
nm_columns: [Annual_Premium]
"#;

    pub(crate) fn vehicle_schema() -> SchemaDefinition {
        SchemaDefinition::from_yaml_str(VEHICLE_SCHEMA).unwrap()
    }

    #[test]
    fn test_parse_vehicle_schema() {
        let schema = vehicle_schema();
        assert_eq!(schema.expected_column_count(), 12);
        assert_eq!(schema.columns[1].name, "Gender");
        assert_eq!(schema.columns[1].kind, ColumnKind::Category);
        assert_eq!(schema.columns[4].kind, ColumnKind::Float);
        assert_eq!(schema.drop_columns, "id");
        assert_eq!(schema.nm_columns, vec!["Annual_Premium"]);
    }

    #[test]
    fn test_mm_columns_alias() {
        let yaml = "columns:\n  - a: int\n  - b: float64\ndrop_columns: a\nmm_columns: [b]\n";
        let schema = SchemaDefinition::from_yaml_str(yaml).unwrap();
        assert_eq!(schema.nm_columns, vec!["b"]);
    }

    #[test]
    fn test_missing_required_key() {
        let err = SchemaDefinition::from_yaml_str("columns:\n  - a: int\n").unwrap_err();
        assert!(matches!(err, PipelineError::Yaml(_)));
    }

    #[test]
    fn test_unknown_dtype() {
        let err =
            SchemaDefinition::from_yaml_str("columns:\n  - a: complex\ndrop_columns: a\n")
                .unwrap_err();
        assert!(matches!(err, PipelineError::Yaml(_)));
    }

    #[test]
    fn test_undeclared_reference() {
        let yaml = "columns:\n  - a: int\ndrop_columns: a\nnumerical_columns: [b]\n";
        let err = SchemaDefinition::from_yaml_str(yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: 'numerical_columns' references undeclared column 'b'"
        );
    }

    #[test]
    fn test_duplicate_column() {
        let yaml = "columns:\n  - a: int\n  - a: float\ndrop_columns: a\n";
        assert!(SchemaDefinition::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_multi_entry_column_map() {
        let yaml = "columns:\n  - {a: int, b: int}\ndrop_columns: a\n";
        let err = SchemaDefinition::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("exactly one name"));
    }

    #[test]
    fn test_overlapping_scaler_lists() {
        let yaml = "columns:\n  - a: int\ndrop_columns: a\nnum_features: [a]\nnm_columns: [a]\n";
        assert!(SchemaDefinition::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_load_repository_schema() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("config")
            .join("schema.yaml");
        let schema = SchemaDefinition::load(&path).unwrap();
        assert_eq!(schema, vehicle_schema());
    }
}
