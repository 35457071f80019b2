//! Pipeline components: step traits, contexts, the runner, and document loading.

pub mod context;
pub mod loader;
pub mod runner;
pub mod step;

pub use context::{RunContext, StepContext};
pub use loader::{open_pipeline, open_pipelines, parse_pipeline, pipeline_name, read_manifest};
pub use runner::Pipeline;
pub use step::{BuiltStep, Sink, Source, Stage, StepHandle};
