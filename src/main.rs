//! Troilkatt CLI: recover, update and clean all configured pipelines.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use troilkatt::engine::arg_parser::Cli;
use troilkatt::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
