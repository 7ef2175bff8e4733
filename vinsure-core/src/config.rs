//! Configuration system for vinsure.
//!
//! Uses `figment` for layered configuration: defaults -> workspace file ->
//! explicit file -> environment. The workspace file is `vinsure.toml`; environment
//! variables are prefixed with `VINSURE_` and nested with `__`
//! (`VINSURE_INGESTION__TRAIN_TEST_SPLIT_RATIO=0.3`).
//!
//! The loaded [`PipelineConfig`] is resolved once per run into immutable
//! per-stage bundles ([`StageConfigs`]) rooted at a timestamped run directory.

use chrono::{DateTime, Local};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Name of the workspace-level configuration file.
pub const CONFIG_FILE_NAME: &str = "vinsure.toml";

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which every run gets its own timestamped directory.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Declarative column schema (YAML).
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,
    /// `strftime` pattern naming the per-run directory.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingestion: IngestionSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub transformation: TransformationSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            schema_file: default_schema_file(),
            timestamp_format: default_timestamp_format(),
            database: DatabaseConfig::default(),
            ingestion: IngestionSettings::default(),
            validation: ValidationSettings::default(),
            transformation: TransformationSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifact")
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("config").join("schema.yaml")
}

fn default_timestamp_format() -> String {
    "%m_%d_%Y_%H_%M_%S".to_string()
}

/// Document database settings. The connection URL itself comes from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_name: default_database_name(),
        }
    }
}

fn default_database_name() -> String {
    "VehicleInsurancePrediction".to_string()
}

/// Data ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionSettings {
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_ingestion_dir")]
    pub dir_name: String,
    #[serde(default = "default_feature_store_dir")]
    pub feature_store_dir: String,
    #[serde(default = "default_ingested_dir")]
    pub ingested_dir: String,
    #[serde(default = "default_raw_file_name")]
    pub file_name: String,
    #[serde(default = "default_train_csv")]
    pub train_file_name: String,
    #[serde(default = "default_test_csv")]
    pub test_file_name: String,
    /// Fraction of rows assigned to the test partition.
    #[serde(default = "default_split_ratio")]
    pub train_test_split_ratio: f64,
    /// Seed for the row shuffle; entropy when unset.
    #[serde(default)]
    pub random_state: Option<u64>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            dir_name: default_ingestion_dir(),
            feature_store_dir: default_feature_store_dir(),
            ingested_dir: default_ingested_dir(),
            file_name: default_raw_file_name(),
            train_file_name: default_train_csv(),
            test_file_name: default_test_csv(),
            train_test_split_ratio: default_split_ratio(),
            random_state: None,
        }
    }
}

fn default_collection_name() -> String {
    "Vehicle-Insurance-Prediction-Data".to_string()
}
fn default_ingestion_dir() -> String {
    "data_ingestion".to_string()
}
fn default_feature_store_dir() -> String {
    "feature_store".to_string()
}
fn default_ingested_dir() -> String {
    "ingested".to_string()
}
fn default_raw_file_name() -> String {
    "data.csv".to_string()
}
fn default_train_csv() -> String {
    "train.csv".to_string()
}
fn default_test_csv() -> String {
    "test.csv".to_string()
}
fn default_split_ratio() -> f64 {
    0.25
}

/// Data validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    #[serde(default = "default_validation_dir")]
    pub dir_name: String,
    /// Report file name. The content is JSON regardless of the extension.
    #[serde(default = "default_report_file_name")]
    pub report_file_name: String,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            dir_name: default_validation_dir(),
            report_file_name: default_report_file_name(),
        }
    }
}

fn default_validation_dir() -> String {
    "data_validation".to_string()
}
fn default_report_file_name() -> String {
    "report.yaml".to_string()
}

/// Data transformation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationSettings {
    #[serde(default = "default_transformation_dir")]
    pub dir_name: String,
    #[serde(default = "default_transformed_dir")]
    pub transformed_dir: String,
    #[serde(default = "default_transformed_object_dir")]
    pub transformed_object_dir: String,
    #[serde(default = "default_object_file_name")]
    pub object_file_name: String,
    #[serde(default = "default_train_npy")]
    pub train_file_name: String,
    #[serde(default = "default_test_npy")]
    pub test_file_name: String,
    /// Label column separated from the input features.
    #[serde(default = "default_target_column")]
    pub target_column: String,
    /// Neighbors used when interpolating synthetic minority samples.
    #[serde(default = "default_smote_k")]
    pub smote_k_neighbors: usize,
    /// Neighbors consulted by the edited-nearest-neighbours cleaning pass.
    #[serde(default = "default_enn_k")]
    pub enn_n_neighbors: usize,
    /// Seed for synthetic sampling; entropy when unset.
    #[serde(default)]
    pub random_state: Option<u64>,
}

impl Default for TransformationSettings {
    fn default() -> Self {
        Self {
            dir_name: default_transformation_dir(),
            transformed_dir: default_transformed_dir(),
            transformed_object_dir: default_transformed_object_dir(),
            object_file_name: default_object_file_name(),
            train_file_name: default_train_npy(),
            test_file_name: default_test_npy(),
            target_column: default_target_column(),
            smote_k_neighbors: default_smote_k(),
            enn_n_neighbors: default_enn_k(),
            random_state: None,
        }
    }
}

fn default_transformation_dir() -> String {
    "data_transformation".to_string()
}
fn default_transformed_dir() -> String {
    "transformed".to_string()
}
fn default_transformed_object_dir() -> String {
    "transformed_object".to_string()
}
fn default_object_file_name() -> String {
    "preprocessing.bin".to_string()
}
fn default_train_npy() -> String {
    "train.npy".to_string()
}
fn default_test_npy() -> String {
    "test.npy".to_string()
}
fn default_target_column() -> String {
    "Response".to_string()
}
fn default_smote_k() -> usize {
    5
}
fn default_enn_k() -> usize {
    3
}

/// Logging configuration consumed by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the JSON log files. Platform data dir when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Check every recognized option once, before any stage runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.ingestion.train_test_split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::invalid(format!(
                "ingestion.train_test_split_ratio must be in (0, 1), got {ratio}"
            )));
        }
        if self.database.database_name.trim().is_empty() {
            return Err(ConfigError::invalid("database.database_name is empty"));
        }
        if self.ingestion.collection_name.trim().is_empty() {
            return Err(ConfigError::invalid("ingestion.collection_name is empty"));
        }
        if self.transformation.target_column.trim().is_empty() {
            return Err(ConfigError::invalid("transformation.target_column is empty"));
        }
        if self.transformation.smote_k_neighbors == 0 {
            return Err(ConfigError::invalid(
                "transformation.smote_k_neighbors must be at least 1",
            ));
        }
        if self.transformation.enn_n_neighbors == 0 {
            return Err(ConfigError::invalid(
                "transformation.enn_n_neighbors must be at least 1",
            ));
        }
        if self.timestamp_format.trim().is_empty() {
            return Err(ConfigError::invalid("timestamp_format is empty"));
        }

        let file_names = [
            ("ingestion.file_name", &self.ingestion.file_name),
            ("ingestion.train_file_name", &self.ingestion.train_file_name),
            ("ingestion.test_file_name", &self.ingestion.test_file_name),
            (
                "validation.report_file_name",
                &self.validation.report_file_name,
            ),
            (
                "transformation.object_file_name",
                &self.transformation.object_file_name,
            ),
            (
                "transformation.train_file_name",
                &self.transformation.train_file_name,
            ),
            (
                "transformation.test_file_name",
                &self.transformation.test_file_name,
            ),
        ];
        for (key, value) in file_names {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{key} is empty")));
            }
        }
        if self.ingestion.train_file_name == self.ingestion.test_file_name {
            return Err(ConfigError::invalid(
                "ingestion train and test file names must differ",
            ));
        }
        if self.transformation.train_file_name == self.transformation.test_file_name {
            return Err(ConfigError::invalid(
                "transformation train and test file names must differ",
            ));
        }
        Ok(())
    }

    /// Make relative paths absolute against `workspace`.
    pub fn anchor(mut self, workspace: &Path) -> Self {
        if self.artifact_dir.is_relative() {
            self.artifact_dir = workspace.join(&self.artifact_dir);
        }
        if self.schema_file.is_relative() {
            self.schema_file = workspace.join(&self.schema_file);
        }
        if let Some(dir) = &self.logging.log_dir {
            if dir.is_relative() {
                self.logging.log_dir = Some(workspace.join(dir));
            }
        }
        self
    }

    /// Run-scoped artifact root for a run started at `timestamp`.
    pub fn run_dir(&self, timestamp: DateTime<Local>) -> PathBuf {
        self.artifact_dir
            .join(timestamp.format(&self.timestamp_format).to_string())
    }

    /// Resolve the per-stage parameter bundles under `run_dir`.
    pub fn resolve(&self, run_dir: &Path) -> StageConfigs {
        let ing = &self.ingestion;
        let ingestion_dir = run_dir.join(&ing.dir_name);
        let ingested = ingestion_dir.join(&ing.ingested_dir);

        let validation_dir = run_dir.join(&self.validation.dir_name);

        let tr = &self.transformation;
        let transformation_dir = run_dir.join(&tr.dir_name);
        let transformed = transformation_dir.join(&tr.transformed_dir);

        StageConfigs {
            run_dir: run_dir.to_path_buf(),
            ingestion: DataIngestionConfig {
                feature_store_file_path: ingestion_dir
                    .join(&ing.feature_store_dir)
                    .join(&ing.file_name),
                training_file_path: ingested.join(&ing.train_file_name),
                testing_file_path: ingested.join(&ing.test_file_name),
                train_test_split_ratio: ing.train_test_split_ratio,
                collection_name: ing.collection_name.clone(),
                random_state: ing.random_state,
            },
            validation: DataValidationConfig {
                validation_report_file_path: validation_dir
                    .join(&self.validation.report_file_name),
            },
            transformation: DataTransformationConfig {
                transformed_object_file_path: transformation_dir
                    .join(&tr.transformed_object_dir)
                    .join(&tr.object_file_name),
                transformed_train_file_path: transformed.join(&tr.train_file_name),
                transformed_test_file_path: transformed.join(&tr.test_file_name),
                target_column: tr.target_column.clone(),
                smote_k_neighbors: tr.smote_k_neighbors,
                enn_n_neighbors: tr.enn_n_neighbors,
                random_state: tr.random_state,
            },
        }
    }

    /// Render the configuration as TOML (used by `config init` / `config show`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Immutable per-stage parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfigs {
    pub run_dir: PathBuf,
    pub ingestion: DataIngestionConfig,
    pub validation: DataValidationConfig,
    pub transformation: DataTransformationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub train_test_split_ratio: f64,
    pub collection_name: String,
    pub random_state: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationConfig {
    pub validation_report_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationConfig {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub target_column: String,
    pub smote_k_neighbors: usize,
    pub enn_n_neighbors: usize,
    pub random_state: Option<u64>,
}

/// Load configuration with layered merging.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `VINSURE_`)
/// 2. Explicit config file (`--config`)
/// 3. Workspace config (`<workspace>/vinsure.toml`)
/// 4. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<PipelineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(ws) = workspace {
        let ws_config = ws.join(CONFIG_FILE_NAME);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("VINSURE_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.artifact_dir, PathBuf::from("artifact"));
        assert_eq!(config.ingestion.train_test_split_ratio, 0.25);
        assert_eq!(config.validation.report_file_name, "report.yaml");
        assert_eq!(config.transformation.target_column, "Response");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PipelineConfig::default();
        let toml_str = config.to_toml().unwrap();
        let deserialized: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(
            config.ingestion.collection_name,
            "Vehicle-Insurance-Prediction-Data"
        );
        assert_eq!(config.database.database_name, "VehicleInsurancePrediction");
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
artifact_dir = "runs"

[ingestion]
train_test_split_ratio = 0.2
random_state = 42
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("runs"));
        assert_eq!(config.ingestion.train_test_split_ratio, 0.2);
        assert_eq!(config.ingestion.random_state, Some(42));
        // Untouched sections keep their defaults.
        assert_eq!(config.transformation.smote_k_neighbors, 5);
    }

    #[test]
    fn test_explicit_file_overrides_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[ingestion]\ncollection_name = \"from-workspace\"\n",
        )
        .unwrap();
        let explicit = dir.path().join("override.toml");
        std::fs::write(&explicit, "[ingestion]\ncollection_name = \"from-flag\"\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit)).unwrap();
        assert_eq!(config.ingestion.collection_name, "from-flag");
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        for ratio in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let mut config = PipelineConfig::default();
            config.ingestion.train_test_split_ratio = ratio;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("train_test_split_ratio"));
        }
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let mut config = PipelineConfig::default();
        config.ingestion.collection_name = "  ".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transformation.test_file_name = config.transformation.train_file_name.clone();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transformation.enn_n_neighbors = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_run_dir_uses_timestamp_format() {
        let config = PipelineConfig::default();
        let ts = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            config.run_dir(ts),
            PathBuf::from("artifact").join("03_09_2025_14_05_07")
        );
    }

    #[test]
    fn test_resolve_layout() {
        let config = PipelineConfig::default();
        let run = PathBuf::from("/tmp/run");
        let stages = config.resolve(&run);

        assert_eq!(
            stages.ingestion.feature_store_file_path,
            PathBuf::from("/tmp/run/data_ingestion/feature_store/data.csv")
        );
        assert_eq!(
            stages.ingestion.training_file_path,
            PathBuf::from("/tmp/run/data_ingestion/ingested/train.csv")
        );
        assert_eq!(
            stages.ingestion.testing_file_path,
            PathBuf::from("/tmp/run/data_ingestion/ingested/test.csv")
        );
        assert_eq!(
            stages.validation.validation_report_file_path,
            PathBuf::from("/tmp/run/data_validation/report.yaml")
        );
        assert_eq!(
            stages.transformation.transformed_object_file_path,
            PathBuf::from("/tmp/run/data_transformation/transformed_object/preprocessing.bin")
        );
        assert_eq!(
            stages.transformation.transformed_train_file_path,
            PathBuf::from("/tmp/run/data_transformation/transformed/train.npy")
        );
        assert_eq!(
            stages.transformation.transformed_test_file_path,
            PathBuf::from("/tmp/run/data_transformation/transformed/test.npy")
        );
    }

    #[test]
    fn test_anchor_relative_paths() {
        let config = PipelineConfig::default().anchor(Path::new("/work"));
        assert_eq!(config.artifact_dir, PathBuf::from("/work/artifact"));
        assert_eq!(config.schema_file, PathBuf::from("/work/config/schema.yaml"));

        let mut absolute = PipelineConfig::default();
        absolute.artifact_dir = PathBuf::from("/mnt/bucket/artifact");
        let absolute = absolute.anchor(Path::new("/work"));
        assert_eq!(absolute.artifact_dir, PathBuf::from("/mnt/bucket/artifact"));
    }
}
