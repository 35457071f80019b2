//! Steps that do nothing: placeholders for pipelines under construction and for tests.

use std::path::PathBuf;

use crate::error::StepResult;
use crate::pipeline::{Sink, Source, Stage, StepContext};
use crate::{FileList, Timestamp};

/// Produces an empty file list.
#[derive(Debug, Default)]
pub struct NullSource;

impl Source for NullSource {
    fn retrieve(&mut self, _ctx: &StepContext<'_>, _timestamp: Timestamp) -> StepResult<FileList> {
        Ok(Vec::new())
    }

    fn recover_outputs(
        &mut self,
        _ctx: &StepContext<'_>,
        _timestamp: Timestamp,
    ) -> StepResult<FileList> {
        Ok(Vec::new())
    }
}

/// Passes its input through unchanged.
#[derive(Debug, Default)]
pub struct NullStage;

impl Stage for NullStage {
    fn process(
        &mut self,
        _ctx: &StepContext<'_>,
        input: FileList,
        _timestamp: Timestamp,
    ) -> StepResult<FileList> {
        Ok(input)
    }

    fn recover_outputs(
        &mut self,
        _ctx: &StepContext<'_>,
        input: FileList,
        _timestamp: Timestamp,
    ) -> StepResult<FileList> {
        Ok(input)
    }
}

/// Discards its input.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn consume(
        &mut self,
        _ctx: &StepContext<'_>,
        _input: &[PathBuf],
        _timestamp: Timestamp,
    ) -> StepResult<()> {
        Ok(())
    }
}
