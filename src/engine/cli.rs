//! CLI command handler: load configuration and pipelines, then run the orchestrator.

use anyhow::{Context, Result};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::orchestrator::Orchestrator;
use crate::steps::StepRegistry;
use crate::utils::{load_config, setup_logging};

fn setup_opts(cli: &Cli) -> Result<Opts> {
    setup_logging(cli.verbose);
    let opts = cli.opts();
    opts.validate()?;
    Ok(opts)
}

/// Run recovery, iterations and cleanup as selected by the flags.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    let config = load_config(&cli.config)
        .with_context(|| format!("load configuration {}", cli.config.display()))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("set Ctrl+C handler")?;

    let registry = StepRegistry::with_builtins();
    let mut orchestrator = Orchestrator::open(config, opts, &cli.datasets, &registry)
        .with_context(|| format!("load pipelines from {}", cli.datasets.display()))?
        .with_cancel_flag(cancel);
    let report = orchestrator.run()?;
    debug!("Last pass: {:?}", report);
    Ok(())
}
