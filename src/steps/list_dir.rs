//! `list_dir` source: the newest version of every file under a storage directory.

use log::info;
use std::path::PathBuf;

use crate::error::{Result, StepResult, TroilkattError};
use crate::pipeline::{Source, StepContext};
use crate::{FileList, StepConfig, Timestamp};

#[derive(Debug)]
pub struct ListDir {
    dir: PathBuf,
}

impl ListDir {
    /// `args` is the storage directory to list.
    pub fn new(config: &StepConfig) -> Result<Self> {
        let dir = config.args.trim();
        if dir.is_empty() {
            return Err(TroilkattError::StepInit {
                step: config.id.clone(),
                message: "list_dir needs a directory argument".to_string(),
            });
        }
        Ok(Self {
            dir: PathBuf::from(dir),
        })
    }
}

impl Source for ListDir {
    fn retrieve(&mut self, ctx: &StepContext<'_>, _timestamp: Timestamp) -> StepResult<FileList> {
        let files = ctx.storage.list_newest(&self.dir)?;
        info!(target: ctx.log_target(), "Listed {} files in {}", files.len(), self.dir.display());
        Ok(files)
    }

    /// The listing is cheap, so recovery lists again.
    fn recover_outputs(
        &mut self,
        ctx: &StepContext<'_>,
        timestamp: Timestamp,
    ) -> StepResult<FileList> {
        self.retrieve(ctx, timestamp)
    }
}
