//! One pipeline: a source, ordered stages and a sink, driven through an iteration, a recovery
//! pass or a retention sweep. Every step transition is bracketed by status log writes.

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::context::{RunContext, StepContext};
use super::step::{BuiltStep, Sink, Source, Stage, StepHandle};
use crate::error::{Result, StepError, TroilkattError};
use crate::status::format_timestamp;
use crate::storage::Storage;
use crate::utils::config::PackagePaths;
use crate::{FileList, State, StepConfig, StepKind, Timestamp};

pub struct Pipeline {
    name: String,
    log_target: String,
    scratch_dir: PathBuf,
    source: StepHandle<dyn Source>,
    stages: Vec<StepHandle<dyn Stage>>,
    sink: StepHandle<dyn Sink>,
}

/// Log a step failure under the step's target and wrap it with the step ID.
fn step_failed(config: &StepConfig, cause: StepError) -> TroilkattError {
    error!(target: config.log_target(), "Step failed: {cause}");
    TroilkattError::Step {
        step_id: config.id.clone(),
        cause,
    }
}

impl Pipeline {
    /// Assemble a pipeline. Step kinds must match their position and step IDs must be unique.
    pub fn new(
        name: &str,
        scratch_dir: PathBuf,
        source: StepHandle<dyn Source>,
        stages: Vec<StepHandle<dyn Stage>>,
        sink: StepHandle<dyn Sink>,
    ) -> Result<Self> {
        let pipeline = Self {
            name: name.to_string(),
            log_target: PackagePaths::get().pipeline_log_target(name),
            scratch_dir,
            source,
            stages,
            sink,
        };
        pipeline.check_steps()?;
        Ok(pipeline)
    }

    /// Assemble a pipeline from steps in document order: exactly one source first, exactly one sink last.
    pub fn from_steps(name: &str, scratch_dir: PathBuf, steps: Vec<BuiltStep>) -> Result<Self> {
        let mut source = None;
        let mut stages = Vec::new();
        let mut sink = None;
        for step in steps {
            let misplaced = match step {
                BuiltStep::Source(h) if source.is_none() && stages.is_empty() && sink.is_none() => {
                    source = Some(h);
                    None
                }
                BuiltStep::Stage(h) if source.is_some() && sink.is_none() => {
                    stages.push(h);
                    None
                }
                BuiltStep::Sink(h) if source.is_some() && sink.is_none() => {
                    sink = Some(h);
                    None
                }
                other => Some(other.config().id.clone()),
            };
            if let Some(id) = misplaced {
                return Err(TroilkattError::StepInit {
                    step: id,
                    message: format!("step out of place in pipeline {name}"),
                });
            }
        }
        match (source, sink) {
            (Some(source), Some(sink)) => Self::new(name, scratch_dir, source, stages, sink),
            _ => Err(TroilkattError::StepInit {
                step: name.to_string(),
                message: "a pipeline needs exactly one source and one sink".to_string(),
            }),
        }
    }

    fn check_steps(&self) -> Result<()> {
        let expected = std::iter::once(StepKind::Source)
            .chain(self.stages.iter().map(|_| StepKind::Middle))
            .chain(std::iter::once(StepKind::Sink));
        let mut seen = HashSet::new();
        for (config, kind) in self.step_configs().zip(expected) {
            if config.kind != kind {
                return Err(TroilkattError::StepInit {
                    step: config.id.clone(),
                    message: format!("configured as {} but used as {}", config.kind, kind),
                });
            }
            if !seen.insert(config.id.as_str()) {
                return Err(TroilkattError::StepInit {
                    step: config.id.clone(),
                    message: format!("duplicate step ID in pipeline {}", self.name),
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Configs of all steps in execution order: source, stages, sink.
    pub fn step_configs(&self) -> impl Iterator<Item = &StepConfig> {
        std::iter::once(&self.source.config)
            .chain(self.stages.iter().map(|s| &s.config))
            .chain(std::iter::once(&self.sink.config))
    }

    /// Run one clean iteration at `timestamp`. Returns the file list handed to the sink.
    ///
    /// The first failing step aborts the run; its `start` record without a `done` is left in the
    /// log for recovery to find. A cancelled context stops the run the same way before the next
    /// step starts.
    pub fn run(&mut self, ctx: &mut RunContext<'_>, timestamp: Timestamp) -> Result<FileList> {
        info!(target: self.log_target.as_str(), "Update pipeline at {}", format_timestamp(timestamp));
        let storage = ctx.storage;

        let (config, step) = (&self.source.config, &mut self.source.step);
        ctx.check_cancelled(&config.id)?;
        ctx.status.set_status(&config.id, timestamp, State::Start)?;
        let sctx = StepContext::new(config, storage, &self.scratch_dir);
        let mut files = step
            .retrieve(&sctx, timestamp)
            .map_err(|e| step_failed(config, e))?;
        ctx.status.set_status(&config.id, timestamp, State::Done)?;
        info!(target: config.log_target(), "Retrieved {} files", files.len());

        for stage in &mut self.stages {
            let (config, step) = (&stage.config, &mut stage.step);
            ctx.check_cancelled(&config.id)?;
            ctx.status.set_status(&config.id, timestamp, State::Start)?;
            let sctx = StepContext::new(config, storage, &self.scratch_dir);
            files = step
                .process(&sctx, files, timestamp)
                .map_err(|e| step_failed(config, e))?;
            ctx.status.set_status(&config.id, timestamp, State::Done)?;
            info!(target: config.log_target(), "Processed {} files", files.len());
        }

        self.consume(ctx, &files, timestamp)?;
        Ok(files)
    }

    /// Resume an iteration that crashed at `timestamp`. Returns the file list handed to the sink.
    ///
    /// Each step whose status at `timestamp` is `done` re-derives its outputs and records
    /// `recover`; every other step runs again. The sink always runs again. Every step writes
    /// `start` and `done`, so a recovered step leaves `start`, `recover`, `done` in the log.
    pub fn recover(&mut self, ctx: &mut RunContext<'_>, timestamp: Timestamp) -> Result<FileList> {
        info!(target: self.log_target.as_str(), "Recover pipeline at {}", format_timestamp(timestamp));
        let storage = ctx.storage;

        let (config, step) = (&self.source.config, &mut self.source.step);
        ctx.check_cancelled(&config.id)?;
        let previous = ctx.status.get_status(&config.id, timestamp);
        ctx.status.set_status(&config.id, timestamp, State::Start)?;
        let sctx = StepContext::new(config, storage, &self.scratch_dir);
        let mut files = if previous == Some(State::Done) {
            let files = step
                .recover_outputs(&sctx, timestamp)
                .map_err(|e| step_failed(config, e))?;
            ctx.status.set_status(&config.id, timestamp, State::Recover)?;
            files
        } else {
            info!(target: config.log_target(), "Cannot recover source since it was not run");
            step.retrieve(&sctx, timestamp)
                .map_err(|e| step_failed(config, e))?
        };
        ctx.status.set_status(&config.id, timestamp, State::Done)?;
        info!(target: config.log_target(), "Retrieved during recovery: {}", files.len());

        for stage in &mut self.stages {
            let (config, step) = (&stage.config, &mut stage.step);
            ctx.check_cancelled(&config.id)?;
            let previous = ctx.status.get_status(&config.id, timestamp);
            ctx.status.set_status(&config.id, timestamp, State::Start)?;
            let sctx = StepContext::new(config, storage, &self.scratch_dir);
            files = if previous == Some(State::Done) {
                let files = step
                    .recover_outputs(&sctx, files, timestamp)
                    .map_err(|e| step_failed(config, e))?;
                ctx.status.set_status(&config.id, timestamp, State::Recover)?;
                files
            } else {
                info!(target: config.log_target(), "Cannot recover stage since it was not run");
                step.process(&sctx, files, timestamp)
                    .map_err(|e| step_failed(config, e))?
            };
            ctx.status.set_status(&config.id, timestamp, State::Done)?;
            info!(target: config.log_target(), "Processed during recovery: {}", files.len());
        }

        self.consume(ctx, &files, timestamp)?;
        Ok(files)
    }

    fn consume(
        &mut self,
        ctx: &mut RunContext<'_>,
        files: &[PathBuf],
        timestamp: Timestamp,
    ) -> Result<()> {
        let (config, step) = (&self.sink.config, &mut self.sink.step);
        ctx.check_cancelled(&config.id)?;
        ctx.status.set_status(&config.id, timestamp, State::Start)?;
        let sctx = StepContext::new(config, ctx.storage, &self.scratch_dir);
        step.consume(&sctx, files, timestamp)
            .map_err(|e| step_failed(config, e))?;
        ctx.status.set_status(&config.id, timestamp, State::Done)?;
        info!(target: config.log_target(), "Sunk {} files", files.len());
        Ok(())
    }

    /// Purge expired versions in the output and meta dirs of every step that has an output dir.
    /// Returns the dirs that were cleaned, including ones kept forever and ones that do not exist
    /// yet. A dir whose purge fails is logged and left out.
    pub fn cleanup(&self, ctx: &RunContext<'_>, timestamp: Timestamp) -> Vec<PathBuf> {
        info!(target: self.log_target.as_str(), "Clean pipeline at {}", format_timestamp(timestamp));
        let mut cleaned = Vec::new();
        for config in self.step_configs() {
            let Some(output_dir) = &config.output_dir else {
                continue;
            };
            if config.retention_days == crate::storage::retention::KEEP_FOREVER {
                debug!(target: config.log_target(), "Outputs are kept forever");
                cleaned.push(output_dir.clone());
                cleaned.push(config.meta_dir.clone());
                continue;
            }
            let purged = clean_dir(ctx.storage, config, output_dir, |s, d| {
                s.cleanup_older_than(d, timestamp, config.retention_days)
            });
            if purged {
                cleaned.push(output_dir.clone());
            }
            let purged = clean_dir(ctx.storage, config, &config.meta_dir, |s, d| {
                s.cleanup_meta_older_than(d, timestamp, config.retention_days)
            });
            if purged {
                cleaned.push(config.meta_dir.clone());
            }
        }
        cleaned
    }
}

/// Run `purge` on `dir` if it exists. Returns false when the dir could not be checked or purged.
fn clean_dir<F>(storage: &dyn Storage, config: &StepConfig, dir: &Path, purge: F) -> bool
where
    F: FnOnce(&dyn Storage, &Path) -> Result<usize>,
{
    match storage.is_dir(dir) {
        Ok(true) => {}
        Ok(false) => {
            debug!(target: config.log_target(), "Nothing to clean in {}", dir.display());
            return true;
        }
        Err(e) => {
            warn!(target: config.log_target(), "Could not check {}: {e}", dir.display());
            return false;
        }
    }
    match purge(storage, dir) {
        Ok(n) => {
            debug!(target: config.log_target(), "Deleted {n} versions in {}", dir.display());
            true
        }
        Err(e) => {
            warn!(target: config.log_target(), "Cleanup failed for {}: {e}", dir.display());
            false
        }
    }
}
