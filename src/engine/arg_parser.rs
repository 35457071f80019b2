use clap::Parser;
use std::path::PathBuf;

use crate::{OnlyMode, Opts, RunMode, SkipMode};

struct DefaultArgs;

impl DefaultArgs {
    pub const CONFIG: &'static str = "conf/troilkatt.toml";
    pub const DATASETS: &'static str = "conf/pipelines";
}

/// Periodic fetch, transform and publish of versioned datasets through configured pipelines.
#[derive(Clone, Parser)]
#[command(name = "troilkatt")]
#[command(about = "Run all configured pipelines, recovering a crashed iteration first.")]
pub struct Cli {
    /// Process configuration file.
    #[arg(long, short = 'c', value_name = "FILE", default_value = DefaultArgs::CONFIG)]
    pub config: PathBuf,

    /// Pipeline manifest: one pipeline document per line.
    #[arg(long, short = 'd', value_name = "FILE", default_value = DefaultArgs::DATASETS)]
    pub datasets: PathBuf,

    /// Part of the pass to skip.
    #[arg(long, short = 's', value_enum, default_value_t = SkipMode::None)]
    pub skip: SkipMode,

    /// Run only this part of the pass.
    #[arg(long, short = 'o', value_enum, default_value_t = OnlyMode::All)]
    pub only: OnlyMode,

    /// Override the run mode from the configuration file.
    #[arg(long, value_enum)]
    pub run_mode: Option<RunMode>,

    /// Do not ask before continuing without recovery on a first run.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Verbose output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    pub fn opts(&self) -> Opts {
        Opts {
            skip: self.skip,
            only: self.only,
            run_mode: self.run_mode,
            assume_yes: self.yes,
        }
    }
}
