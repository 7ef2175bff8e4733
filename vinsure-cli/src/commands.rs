//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::SchemaAction;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vinsure_core::config::CONFIG_FILE_NAME;
use vinsure_core::{ConnectionSettings, PipelineConfig, load_config};
use vinsure_ml::components::apply_preprocessor;
use vinsure_ml::{ColumnTransformer, MongoStore, SchemaDefinition, TrainingPipeline};

/// Absolute path of an existing workspace directory.
pub fn resolve_workspace(path: &Path) -> anyhow::Result<PathBuf> {
    let workspace = path
        .canonicalize()
        .with_context(|| format!("Workspace {} is not accessible", path.display()))?;
    if !workspace.is_dir() {
        anyhow::bail!("Workspace {} is not a directory", workspace.display());
    }
    Ok(workspace)
}

/// Load, anchor and validate the layered configuration.
pub fn load_pipeline_config(
    workspace: &Path,
    explicit: Option<&Path>,
) -> anyhow::Result<PipelineConfig> {
    let config = load_config(Some(workspace), explicit)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?
        .anchor(workspace);
    config.validate()?;
    Ok(config)
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    explicit_config: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Run => handle_run(workspace, explicit_config).await,
        Commands::Schema { action } => handle_schema(action, workspace, explicit_config),
        Commands::Apply {
            preprocessor,
            input,
            output,
        } => handle_apply(&preprocessor, &input, &output, workspace, explicit_config),
        Commands::Config { action } => handle_config(action, workspace, explicit_config),
    }
}

async fn handle_run(workspace: &Path, explicit_config: Option<&Path>) -> anyhow::Result<()> {
    // Everything the run needs is checked before the first connection.
    let config = load_pipeline_config(workspace, explicit_config)?;
    let schema = SchemaDefinition::load(&config.schema_file)?;
    let settings = ConnectionSettings::from_env()?;
    tracing::debug!(?settings, "Connection settings loaded");

    let store = MongoStore::connect(&settings.mongodb_url, &config.database.database_name).await?;
    let pipeline = TrainingPipeline::new(config, schema, Arc::new(store))?;
    let manifest = pipeline.run().await?;

    println!("Run {} completed in {}", manifest.run_id, manifest.run_dir.display());
    println!(
        "  train split:        {}",
        manifest.data_ingestion.trained_file_path.display()
    );
    println!(
        "  test split:         {}",
        manifest.data_ingestion.test_file_path.display()
    );
    println!(
        "  validation report:  {}",
        manifest.data_validation.validation_report_file_path.display()
    );
    println!(
        "  preprocessor:       {}",
        manifest
            .data_transformation
            .transformed_object_file_path
            .display()
    );
    println!(
        "  train array:        {}",
        manifest
            .data_transformation
            .transformed_train_file_path
            .display()
    );
    println!(
        "  test array:         {}",
        manifest
            .data_transformation
            .transformed_test_file_path
            .display()
    );
    Ok(())
}

fn handle_schema(
    action: SchemaAction,
    workspace: &Path,
    explicit_config: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        SchemaAction::Check { path } => {
            let path = match path {
                Some(p) => p,
                None => load_pipeline_config(workspace, explicit_config)?.schema_file,
            };
            let schema = SchemaDefinition::load(&path)?;
            println!("Schema OK: {}", path.display());
            println!("  columns:             {}", schema.expected_column_count());
            println!("  numerical_columns:   {}", schema.numerical_columns.join(", "));
            println!("  categorical_columns: {}", schema.categorical_columns.join(", "));
            println!("  num_features:        {}", schema.num_features.join(", "));
            println!("  nm_columns:          {}", schema.nm_columns.join(", "));
            println!("  drop_columns:        {}", schema.drop_columns);
            Ok(())
        }
    }
}

fn handle_apply(
    preprocessor_path: &Path,
    input: &Path,
    output: &Path,
    workspace: &Path,
    explicit_config: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_pipeline_config(workspace, explicit_config)?;
    let schema = SchemaDefinition::load(&config.schema_file)?;
    let preprocessor = ColumnTransformer::load(preprocessor_path)?;
    let batch = vinsure_ml::data::read_csv(input)?;

    let array = apply_preprocessor(
        &preprocessor,
        batch,
        &schema.drop_columns,
        &config.transformation.target_column,
    )?;
    vinsure_core::persistence::ensure_parent_dir(output)?;
    ndarray_npy::write_npy(output, &array)?;

    let (rows, cols) = array.dim();
    println!("Wrote {rows}x{cols} array to {}", output.display());
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    explicit_config: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = PipelineConfig::default().to_toml()?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), explicit_config)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
