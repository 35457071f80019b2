//! Public and internal types for the troilkatt API: status records, step configuration and run options.

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TroilkattError};
use crate::storage::naming::CompressionTag;

/// Milliseconds since the Unix epoch. Identifies one iteration.
pub type Timestamp = i64;

/// Storage paths handed from one step to the next.
pub type FileList = Vec<PathBuf>;

/// Reserved step ID for the whole-run status in the status log.
pub const TROILKATT_ID: &str = "Troilkatt";

/// State of one step (or of the whole run) at one timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    Start,
    Done,
    Recover,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Start => "start",
            State::Done => "done",
            State::Recover => "recover",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    /// `recovered` is accepted for logs written by older releases.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(State::Start),
            "done" => Ok(State::Done),
            "recover" | "recovered" => Ok(State::Recover),
            other => Err(format!("unknown state: {other}")),
        }
    }
}

/// One line of the status log: `<timestamp>:<stepID>:<state>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusRecord {
    pub timestamp: Timestamp,
    pub step_id: String,
    pub state: State,
}

/// Capability of a step within a pipeline. Used to dispatch construction and for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepKind {
    Source,
    Middle,
    Sink,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepKind::Source => "source",
            StepKind::Middle => "stage",
            StepKind::Sink => "sink",
        })
    }
}

/// Identity and storage settings of one step. Immutable after construction.
#[derive(Clone, Debug)]
pub struct StepConfig {
    /// `NNN-name`, unique within the pipeline.
    pub id: String,
    pub name: String,
    pub kind: StepKind,
    pub args: String,
    /// `None`: the step persists nothing and is never cleaned up.
    pub output_dir: Option<PathBuf>,
    pub meta_dir: PathBuf,
    pub compression: CompressionTag,
    /// Days to keep output versions. `-1` keeps them forever.
    pub retention_days: i32,
    log_target: String,
}

impl StepConfig {
    /// Build a step config without output directory. `seq` is the position in the pipeline (source = 0).
    pub fn new(
        kind: StepKind,
        seq: usize,
        name: &str,
        args: &str,
        meta_dir: PathBuf,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() || name.contains(':') || name.contains('\n') {
            return Err(TroilkattError::StepInit {
                step: name.to_string(),
                message: "step name must be non-empty and must not contain ':' or newlines"
                    .to_string(),
            });
        }
        let id = format!("{seq:03}-{name}");
        Ok(Self {
            log_target: format!("{}::step::{}", env!("CARGO_PKG_NAME"), id),
            id,
            name: name.to_string(),
            kind,
            args: args.to_string(),
            output_dir: None,
            meta_dir,
            compression: CompressionTag::None,
            retention_days: 0,
        })
    }

    /// Attach an output directory with compression and retention. Retention below -1 is rejected.
    pub fn with_output(
        mut self,
        output_dir: PathBuf,
        compression: CompressionTag,
        retention_days: i32,
    ) -> Result<Self> {
        if retention_days < -1 {
            return Err(TroilkattError::StepInit {
                step: self.id,
                message: format!("invalid storage time: {retention_days}"),
            });
        }
        self.output_dir = Some(output_dir);
        self.compression = compression;
        self.retention_days = retention_days;
        Ok(self)
    }

    /// `log` target for records emitted on behalf of this step.
    pub fn log_target(&self) -> &str {
        &self.log_target
    }
}

/// `-s/--skip`: part of the pass to leave out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SkipMode {
    #[default]
    None,
    Recovery,
    Cleanup,
}

impl fmt::Display for SkipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipMode::None => "none",
            SkipMode::Recovery => "recovery",
            SkipMode::Cleanup => "cleanup",
        })
    }
}

/// `-o/--only`: restrict the pass to one part.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OnlyMode {
    #[default]
    All,
    Recovery,
    Cleanup,
}

impl fmt::Display for OnlyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnlyMode::All => "all",
            OnlyMode::Recovery => "recovery",
            OnlyMode::Cleanup => "cleanup",
        })
    }
}

/// Loop control: a single pass per process, or passes separated by the crawl interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Once,
    Continuous,
}

/// Process-level options (CLI and lib).
#[derive(Clone, Debug, Default)]
pub struct Opts {
    pub skip: SkipMode,
    pub only: OnlyMode,
    /// Overrides `run_mode` from the configuration file.
    pub run_mode: Option<RunMode>,
    /// Do not prompt; continue without recovery when the status log has no run status.
    pub assume_yes: bool,
}

impl Opts {
    /// Reject `skip` and `only` naming the same part of the pass.
    pub fn validate(&self) -> Result<()> {
        let clash = matches!(
            (self.skip, self.only),
            (SkipMode::Recovery, OnlyMode::Recovery) | (SkipMode::Cleanup, OnlyMode::Cleanup)
        );
        if clash {
            return Err(TroilkattError::Config(format!(
                "both skip and only set to: {}",
                self.skip
            )));
        }
        Ok(())
    }

    pub fn recovery_enabled(&self) -> bool {
        self.skip != SkipMode::Recovery && self.only != OnlyMode::Cleanup
    }

    pub fn update_enabled(&self) -> bool {
        self.only == OnlyMode::All
    }

    pub fn cleanup_enabled(&self) -> bool {
        self.skip != SkipMode::Cleanup && self.only != OnlyMode::Recovery
    }
}

/// What the recovery check at process start decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Last run completed.
    NotNeeded,
    /// No run status in the log; continued without recovery.
    FirstRun,
    /// No run status and the operator chose not to continue.
    Declined,
    /// Recovery was needed for this timestamp but skipped by options.
    Skipped(Timestamp),
    /// The crashed iteration at this timestamp was recovered.
    Recovered(Timestamp),
}

/// Summary of one orchestrator pass.
#[derive(Clone, Debug, Default)]
pub struct PassReport {
    pub recovery: Option<RecoveryOutcome>,
    /// Timestamp of the iteration run in this pass, if pipelines were updated.
    pub iteration: Option<Timestamp>,
    pub swept: bool,
    /// Leaf directories under `data/` and `meta/` that no configured step cleaned.
    pub orphans: Vec<PathBuf>,
}
