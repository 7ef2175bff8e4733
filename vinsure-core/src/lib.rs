//! # vinsure-core
//!
//! Foundation shared by the vinsure pipeline crates: layered configuration,
//! per-stage config resolution, connection settings read from the environment,
//! and atomic persistence helpers.

pub mod config;
pub mod error;
pub mod persistence;
pub mod settings;

pub use config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, PipelineConfig,
    StageConfigs, load_config,
};
pub use error::ConfigError;
pub use settings::{ConnectionSettings, StorageCredentials};
