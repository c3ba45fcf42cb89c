//! CLI command definitions for rating-forge.
//!
//! All commands read the same YAML configuration file. `compile` builds the
//! pipeline definition and uploads it; `run` executes it locally; `stage`
//! runs a single stage with the configured parameters.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::{
    publish_definition, PipelineConfig, PipelineDefinition, PipelineRunner, RunError, RunSummary,
};
use crate::stages::{StageKind, StageOutcome};

/// Movie-rating pipeline: fetch rows, rate them with a hosted model, export.
#[derive(Parser)]
#[command(name = "rating-forge")]
#[command(about = "Build and run the movie-rating pipeline")]
#[command(version)]
#[command(
    long_about = "rating-forge compiles and runs a three-stage pipeline: fetch movie rows, ask a hosted text model for a rating per row, and export the result to a warehouse table.\n\nExample usage:\n  rating-forge compile --config configs/defaults.yaml\n  rating-forge run --config configs/defaults.yaml"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Compile the pipeline definition and upload it to object storage.
    Compile(CompileArgs),

    /// Run the whole pipeline locally.
    Run(RunArgs),

    /// Run a single stage with the configured parameters.
    Stage(StageArgs),
}

/// Arguments for `rating-forge compile`.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Configuration file.
    #[arg(short, long, env = "RATING_FORGE_CONFIG")]
    pub config: PathBuf,

    /// Write the compiled definition without uploading it.
    #[arg(long)]
    pub skip_upload: bool,
}

/// Arguments for `rating-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file.
    #[arg(short, long, env = "RATING_FORGE_CONFIG")]
    pub config: PathBuf,

    /// Compiled definition to run instead of building one from the config.
    #[arg(short, long)]
    pub definition: Option<PathBuf>,

    /// Write Prometheus metrics to this file after the run.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `rating-forge stage`.
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// Stage to run.
    #[arg(value_enum)]
    pub kind: StageKind,

    /// Configuration file.
    #[arg(short, long, env = "RATING_FORGE_CONFIG")]
    pub config: PathBuf,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Compile(args) => run_compile_command(args).await?,
        Commands::Run(args) => run_pipeline_command(args).await?,
        Commands::Stage(args) => run_stage_command(args).await?,
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

async fn run_compile_command(args: CompileArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let definition = PipelineDefinition::build(config.pipelines.parameter_values.clone())?;

    let spec_path = &config.pipelines.pipeline_job_spec_path;
    definition.compile_to_file(spec_path)?;
    println!("Compiled {} to {}", definition.name(), spec_path.display());

    if args.skip_upload {
        return Ok(());
    }

    let store = config.object_store()?;
    let location = publish_definition(
        store.as_ref(),
        &config.pipelines.gs_pipeline_job_spec_path,
        spec_path,
    )
    .await?;
    if location.bucket != config.gcp.storage_bucket_name {
        tracing::warn!(
            uri_bucket = %location.bucket,
            config_bucket = %config.gcp.storage_bucket_name,
            "Upload bucket differs from gcp.storage_bucket_name"
        );
    }
    println!("Uploaded to {}", location);
    Ok(())
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    init_metrics().context("Failed to initialize metrics")?;

    let config = load_config(&args.config)?;
    let definition = match &args.definition {
        Some(path) => PipelineDefinition::load_file(path)
            .with_context(|| format!("Failed to load definition from {}", path.display()))?,
        None => PipelineDefinition::build(config.pipelines.parameter_values.clone())?,
    };
    let ctx = config.stage_context()?;

    info!(pipeline = %definition.name(), model = %definition.model(), "Running pipeline");
    let result = PipelineRunner::new().run(&definition, &ctx).await;

    if let Some(path) = &args.metrics_file {
        std::fs::write(path, export_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    match result {
        Ok(summary) => {
            print_summary(&summary, args.json)?;
            Ok(())
        }
        Err(RunError::NodeFailed {
            node,
            summary,
            source,
        }) => {
            print_summary(&summary, args.json)?;
            Err(anyhow::anyhow!("Node '{}' failed: {}", node, source))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("\n=== Pipeline Run {} ===", summary.run_id);
    println!("Pipeline: {}", summary.pipeline_name);
    println!("Started:  {}", summary.started_at.to_rfc3339());
    println!();
    for node in &summary.nodes {
        println!(
            "  {:<36} {:<10} rows={} failed_rows={} {}ms",
            node.name,
            format!("{:?}", node.status).to_lowercase(),
            node.rows,
            node.failed_rows,
            node.duration_ms
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StageOutput {
    status: String,
    #[serde(flatten)]
    outcome: StageOutcome,
}

async fn run_stage_command(args: StageArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let definition = PipelineDefinition::build(config.pipelines.parameter_values.clone())?;
    let node = definition
        .nodes()
        .iter()
        .find(|n| n.kind() == args.kind)
        .ok_or_else(|| anyhow::anyhow!("Pipeline has no {} node", args.kind))?;

    let ctx = config.stage_context()?;
    let outcome = node.task.run(&ctx).await?;

    if args.json {
        let output = StageOutput {
            status: "success".to_string(),
            outcome,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "Stage {} completed: rows={} failed_rows={}",
            outcome.stage, outcome.rows, outcome.failed_rows
        );
    }
    Ok(())
}
