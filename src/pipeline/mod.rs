//! Pipeline coordination for the movie-rating stages.
//!
//! # Architecture
//!
//! - **Definition**: the three stage nodes and their `after` edges, built
//!   from [`PipelineParams`] and compiled to a YAML artifact
//! - **Publish**: uploads a compiled artifact to object storage
//! - **Runner**: executes a definition locally, node by node
//! - **Config**: the YAML configuration file and the backends it selects
//!
//! # Example
//!
//! ```rust,ignore
//! use rating_forge::pipeline::{PipelineConfig, PipelineDefinition, PipelineRunner};
//!
//! let config = PipelineConfig::from_file(Path::new("configs/defaults.yaml"))?;
//! let definition = PipelineDefinition::build(config.pipelines.parameter_values.clone())?;
//! let summary = PipelineRunner::new()
//!     .run(&definition, &config.stage_context()?)
//!     .await?;
//! println!("run {} finished", summary.run_id);
//! ```

pub mod config;
pub mod definition;
pub mod publish;
pub mod runner;

pub use config::{ConfigError, PipelineConfig, StorageBackend};
pub use definition::{
    PipelineDefinition, PipelineError, PipelineNode, PipelineParams, PIPELINE_NAME,
};
pub use publish::publish_definition;
pub use runner::{NodeRun, NodeStatus, PipelineRunner, RunError, RunSummary};
