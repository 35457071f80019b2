//! Troilkatt: periodic fetch, transform and publish of versioned datasets through pipelines,
//! with crash recovery from an append-only status log and retention of versioned outputs.

pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod status;
pub mod steps;
pub mod storage;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::{Result, StepError, StepResult, TroilkattError};
pub use orchestrator::Orchestrator;
pub use pipeline::{Pipeline, RunContext, Sink, Source, Stage, StepContext};
pub use status::StatusLog;
pub use steps::StepRegistry;
pub use storage::{LocalStorage, Storage};

use std::path::Path;

/// Single entry point for library users: load `config_path`, open the pipelines listed in
/// `manifest` with `registry`, and run one recovery check plus one pass.
pub fn run_once(
    config_path: &Path,
    manifest: &Path,
    opts: Opts,
    registry: &StepRegistry,
) -> Result<PassReport> {
    let config = utils::load_config(config_path)?;
    let mut orchestrator = Orchestrator::open(config, opts, manifest, registry)?;
    orchestrator.run_once()
}
