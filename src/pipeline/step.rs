//! Step capabilities: one trait per kind instead of a shared base class.
//!
//! A step that persists its outputs writes them to its output dir itself (see
//! [`StepContext::save_outputs`]). The default `recover_outputs` lists that dir at the crashed
//! timestamp, and falls back to a full re-run when the step has no output dir.

use log::debug;
use std::path::PathBuf;

use super::context::StepContext;
use crate::error::StepResult;
use crate::{FileList, StepConfig, Timestamp};

/// First step of a pipeline: produces the file list.
pub trait Source {
    fn retrieve(&mut self, ctx: &StepContext<'_>, timestamp: Timestamp) -> StepResult<FileList>;

    /// Re-derive the output of a `retrieve` that already completed at `timestamp`.
    fn recover_outputs(
        &mut self,
        ctx: &StepContext<'_>,
        timestamp: Timestamp,
    ) -> StepResult<FileList> {
        match ctx.outputs_at(timestamp)? {
            Some(files) => Ok(files),
            None => {
                debug!(target: ctx.log_target(), "No output directory; retrieving again");
                self.retrieve(ctx, timestamp)
            }
        }
    }
}

/// Middle step: transforms the file list.
pub trait Stage {
    fn process(
        &mut self,
        ctx: &StepContext<'_>,
        input: FileList,
        timestamp: Timestamp,
    ) -> StepResult<FileList>;

    /// Re-derive the output of a `process` that already completed at `timestamp`.
    fn recover_outputs(
        &mut self,
        ctx: &StepContext<'_>,
        input: FileList,
        timestamp: Timestamp,
    ) -> StepResult<FileList> {
        match ctx.outputs_at(timestamp)? {
            Some(files) => Ok(files),
            None => {
                debug!(target: ctx.log_target(), "No output directory; processing again");
                self.process(ctx, input, timestamp)
            }
        }
    }
}

/// Last step of a pipeline: consumes the final file list.
pub trait Sink {
    fn consume(
        &mut self,
        ctx: &StepContext<'_>,
        input: &[PathBuf],
        timestamp: Timestamp,
    ) -> StepResult<()>;
}

/// A step implementation together with its immutable config.
pub struct StepHandle<T: ?Sized> {
    pub config: StepConfig,
    pub step: Box<T>,
}

impl<T: ?Sized> StepHandle<T> {
    pub fn new(config: StepConfig, step: Box<T>) -> Self {
        Self { config, step }
    }
}

/// A constructed step, tagged by kind.
pub enum BuiltStep {
    Source(StepHandle<dyn Source>),
    Stage(StepHandle<dyn Stage>),
    Sink(StepHandle<dyn Sink>),
}

impl BuiltStep {
    pub fn config(&self) -> &StepConfig {
        match self {
            BuiltStep::Source(h) => &h.config,
            BuiltStep::Stage(h) => &h.config,
            BuiltStep::Sink(h) => &h.config,
        }
    }
}
