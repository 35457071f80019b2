//! `file_list` sink: write the final file list, one path per line, to a local file.

use log::info;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Result, StepError, StepResult, TroilkattError};
use crate::pipeline::{Sink, StepContext};
use crate::{StepConfig, Timestamp};

#[derive(Debug)]
pub struct FileListSink {
    path: PathBuf,
}

impl FileListSink {
    /// `args` is the local file to write. A relative path is taken relative to the pipeline's scratch dir.
    pub fn new(config: &StepConfig) -> Result<Self> {
        let path = config.args.trim();
        if path.is_empty() {
            return Err(TroilkattError::StepInit {
                step: config.id.clone(),
                message: "file_list needs an output file argument".to_string(),
            });
        }
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

impl Sink for FileListSink {
    fn consume(
        &mut self,
        ctx: &StepContext<'_>,
        input: &[PathBuf],
        _timestamp: Timestamp,
    ) -> StepResult<()> {
        let path = ctx.scratch_dir.join(&self.path);
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = std::io::BufWriter::new(fs::File::create(&path)?);
            for f in input {
                writeln!(out, "{}", f.display())?;
            }
            out.flush()
        };
        write().map_err(|e| {
            StepError::with_source(format!("could not write to file: {}", path.display()), e)
        })?;
        info!(target: ctx.log_target(), "Wrote {} paths to {}", input.len(), path.display());
        Ok(())
    }
}
