//! `filter` stage: keep the files whose path matches a regular expression.

use log::debug;
use regex::Regex;

use crate::error::{Result, StepResult, TroilkattError};
use crate::pipeline::{Stage, StepContext};
use crate::{FileList, StepConfig, Timestamp};

#[derive(Debug)]
pub struct Filter {
    pattern: Regex,
}

impl Filter {
    /// `args` is the pattern. It matches anywhere in the path.
    pub fn new(config: &StepConfig) -> Result<Self> {
        let pattern = Regex::new(config.args.trim()).map_err(|e| TroilkattError::StepInit {
            step: config.id.clone(),
            message: format!("invalid filter pattern {:?}: {e}", config.args),
        })?;
        Ok(Self { pattern })
    }

    fn keep(&self, input: FileList) -> FileList {
        input
            .into_iter()
            .filter(|f| self.pattern.is_match(&f.to_string_lossy()))
            .collect()
    }
}

impl Stage for Filter {
    fn process(
        &mut self,
        ctx: &StepContext<'_>,
        input: FileList,
        _timestamp: Timestamp,
    ) -> StepResult<FileList> {
        let total = input.len();
        let kept = self.keep(input);
        debug!(target: ctx.log_target(), "Kept {} of {} files", kept.len(), total);
        Ok(kept)
    }

    fn recover_outputs(
        &mut self,
        ctx: &StepContext<'_>,
        input: FileList,
        timestamp: Timestamp,
    ) -> StepResult<FileList> {
        self.process(ctx, input, timestamp)
    }
}
