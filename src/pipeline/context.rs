//! Context objects handed through a pass: the run-wide handles and the per-step view steps see.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, StepError, StepResult, TroilkattError};
use crate::status::StatusLog;
use crate::storage::Storage;
use crate::{FileList, StepConfig, Timestamp};

/// Handles shared by every pipeline in a pass. Built by the orchestrator (or a test) and passed
/// into `Pipeline::run`, `Pipeline::recover` and `Pipeline::cleanup`.
pub struct RunContext<'a> {
    pub status: &'a mut StatusLog,
    pub storage: &'a dyn Storage,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> RunContext<'a> {
    pub fn new(status: &'a mut StatusLog, storage: &'a dyn Storage) -> Self {
        Self {
            status,
            storage,
            cancel: None,
        }
    }

    /// Stop before the next step once `flag` is set.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Fail with [`TroilkattError::Interrupted`] if cancellation was requested before `next`.
    pub fn check_cancelled(&self, next: &str) -> Result<()> {
        if self.is_cancelled() {
            warn!("Interrupted before {next}");
            return Err(TroilkattError::Interrupted(next.to_string()));
        }
        Ok(())
    }
}

/// What a step sees while it runs: its own config, storage, and the pipeline's local scratch dir.
pub struct StepContext<'a> {
    pub config: &'a StepConfig,
    pub storage: &'a dyn Storage,
    pub scratch_dir: &'a Path,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a StepConfig, storage: &'a dyn Storage, scratch_dir: &'a Path) -> Self {
        Self {
            config,
            storage,
            scratch_dir,
        }
    }

    /// `log` target of the step, for `log::info!(target: ctx.log_target(), ..)`.
    pub fn log_target(&self) -> &str {
        self.config.log_target()
    }

    /// Store local `files` in the step's output dir as versions at `timestamp`, using the step's
    /// compression. Returns the stored paths. Fails if the step has no output dir.
    pub fn save_outputs(&self, files: &[PathBuf], timestamp: Timestamp) -> StepResult<FileList> {
        let dir = self.output_dir()?;
        let mut stored = Vec::with_capacity(files.len());
        for f in files {
            stored.push(
                self.storage
                    .put_file(f, dir, timestamp, self.config.compression)?,
            );
        }
        debug!(target: self.log_target(), "Saved {} files to {}", stored.len(), dir.display());
        Ok(stored)
    }

    /// Versions written to the step's output dir at exactly `timestamp`, or `None` if the step has
    /// no output dir.
    pub fn outputs_at(&self, timestamp: Timestamp) -> StepResult<Option<FileList>> {
        match &self.config.output_dir {
            Some(dir) => Ok(Some(self.storage.list_at_timestamp(dir, timestamp)?)),
            None => Ok(None),
        }
    }

    fn output_dir(&self) -> StepResult<&Path> {
        self.config.output_dir.as_deref().ok_or_else(|| {
            StepError::new(format!("step {} has no output directory", self.config.id))
        })
    }
}
