//! Top-level driver: crash detection and recovery, iterations across all pipelines, the
//! retention sweep, and the run loop.
//!
//! One orchestrator process may use a status log at a time. Nothing here locks it.

pub mod global_meta;
pub mod layout;
pub mod sweep;

use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Result, TroilkattError};
use crate::pipeline::{Pipeline, RunContext, open_pipelines};
use crate::status::{StatusLog, format_timestamp, now_millis};
use crate::steps::StepRegistry;
use crate::storage::{self, Storage};
use crate::utils::config::{SLEEP_SLICE, TroilkattConfig};
use crate::utils::prompt;
use crate::{Opts, PassReport, RecoveryOutcome, RunMode, State, TROILKATT_ID, Timestamp};

pub struct Orchestrator {
    config: TroilkattConfig,
    opts: Opts,
    storage: Box<dyn Storage>,
    status: StatusLog,
    pipelines: Vec<Pipeline>,
    global_meta_synced: bool,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Build storage from the config, then continue as [`Orchestrator::with_storage`].
    pub fn open(
        config: TroilkattConfig,
        opts: Opts,
        manifest: &Path,
        registry: &StepRegistry,
    ) -> Result<Self> {
        let storage = storage::from_config(&config)?;
        Self::with_storage(config, opts, storage, manifest, registry)
    }

    /// Validate options, create the layout, load the manifest's pipelines and open the status log
    /// on a caller-supplied storage backend.
    pub fn with_storage(
        config: TroilkattConfig,
        opts: Opts,
        storage: Box<dyn Storage>,
        manifest: &Path,
        registry: &StepRegistry,
    ) -> Result<Self> {
        opts.validate()?;
        layout::ensure_layout(&config, storage.as_ref())?;
        let pipelines = open_pipelines(manifest, &config, storage.as_ref(), registry)?;
        let status = StatusLog::open(storage.as_ref(), &config.localfs_dir, &config.tfs_status_file)?;
        Self::assemble(config, opts, storage, status, pipelines)
    }

    /// Assemble from parts that are already set up. The layout is created if missing.
    pub fn new(
        config: TroilkattConfig,
        opts: Opts,
        storage: Box<dyn Storage>,
        status: StatusLog,
        pipelines: Vec<Pipeline>,
    ) -> Result<Self> {
        opts.validate()?;
        layout::ensure_layout(&config, storage.as_ref())?;
        Self::assemble(config, opts, storage, status, pipelines)
    }

    fn assemble(
        config: TroilkattConfig,
        opts: Opts,
        storage: Box<dyn Storage>,
        status: StatusLog,
        pipelines: Vec<Pipeline>,
    ) -> Result<Self> {
        let run_mode = opts.run_mode.unwrap_or(config.run_mode);
        if run_mode == RunMode::Continuous && config.crawl_interval_hours <= 0.0 {
            return Err(TroilkattError::Config(
                "crawl interval must be positive in continuous mode".to_string(),
            ));
        }
        info!(
            "{} pipelines loaded (skip: {}, only: {}, mode: {:?})",
            pipelines.len(),
            opts.skip,
            opts.only,
            run_mode
        );
        Ok(Self {
            config,
            opts,
            storage,
            status,
            pipelines,
            global_meta_synced: false,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share `flag` as the cancellation flag, e.g. with a Ctrl+C handler. Once it is set, recovery
    /// and iterations stop before their next step with [`TroilkattError::Interrupted`], and the
    /// run loop does not start another pass.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &TroilkattConfig {
        &self.config
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn run_mode(&self) -> RunMode {
        self.opts.run_mode.unwrap_or(self.config.run_mode)
    }

    fn cleanup_enabled(&self) -> bool {
        self.opts.cleanup_enabled() && self.config.cleanup
    }

    /// Check whether the previous process finished its last iteration, and recover it if not.
    ///
    /// With no run status in the log this is a first run: the operator is asked whether to go on
    /// without recovery, unless `assume_yes` is set.
    pub fn recover(&mut self) -> Result<RecoveryOutcome> {
        let last = self.status.get_last_record(TROILKATT_ID);
        let Some((last_ts, last_state)) = last else {
            if !self.opts.recovery_enabled() || self.opts.assume_yes {
                info!("No previous run status; continuing without recovery");
                return Ok(RecoveryOutcome::FirstRun);
            }
            return if prompt::confirm("Continue without doing recovery", true)? {
                Ok(RecoveryOutcome::FirstRun)
            } else {
                info!("Recovery declined; nothing to do");
                Ok(RecoveryOutcome::Declined)
            };
        };
        if last_state == State::Done {
            info!("Last iteration completed at {}", format_timestamp(last_ts));
            return Ok(RecoveryOutcome::NotNeeded);
        }
        if !self.opts.recovery_enabled() {
            warn!("Skipping recovery of iteration at {}", format_timestamp(last_ts));
            return Ok(RecoveryOutcome::Skipped(last_ts));
        }

        info!("Recover iteration at {}", format_timestamp(last_ts));
        self.status.set_status(TROILKATT_ID, last_ts, State::Recover)?;
        let mut ctx =
            RunContext::new(&mut self.status, self.storage.as_ref()).with_cancel(&self.cancel);
        for p in &mut self.pipelines {
            p.recover(&mut ctx, last_ts).inspect_err(|e| {
                error!("Recovery of pipeline {} failed: {e}", p.name());
            })?;
        }
        global_meta::upload(self.storage.as_ref(), &self.config, last_ts)?;
        self.status.set_status(TROILKATT_ID, last_ts, State::Done)?;
        self.status.persist(self.storage.as_ref())?;
        info!("Recovery done");
        Ok(RecoveryOutcome::Recovered(last_ts))
    }

    /// Recovery check followed by one pass.
    pub fn run_once(&mut self) -> Result<PassReport> {
        let recovery = self.recover()?;
        if recovery == RecoveryOutcome::Declined {
            return Ok(PassReport {
                recovery: Some(recovery),
                ..PassReport::default()
            });
        }
        let mut report = self.pass()?;
        report.recovery = Some(recovery);
        Ok(report)
    }

    /// One pass without the recovery check: an iteration (when `only == all`) and the sweep
    /// (when enabled).
    pub fn pass(&mut self) -> Result<PassReport> {
        let timestamp = self.next_timestamp();
        let mut report = PassReport::default();
        if self.opts.update_enabled() {
            if !self.global_meta_synced {
                global_meta::download(self.storage.as_ref(), &self.config)?;
                self.global_meta_synced = true;
            }
            report.iteration = Some(self.iterate(timestamp)?);
        }
        if self.cleanup_enabled() {
            report.orphans = self.sweep(timestamp)?;
            report.swept = true;
        } else {
            info!("Skipping cleanup");
        }
        Ok(report)
    }

    /// Current time, but strictly after the last run status so iterations never share a timestamp.
    fn next_timestamp(&self) -> Timestamp {
        let now = now_millis();
        match self.status.get_last_status_timestamp(TROILKATT_ID) {
            Some(last) if last >= now => last + 1,
            _ => now,
        }
    }

    /// Run every pipeline at `timestamp`, stopping at the first failure.
    fn iterate(&mut self, timestamp: Timestamp) -> Result<Timestamp> {
        info!("Start iteration at {}", format_timestamp(timestamp));
        self.status.set_status(TROILKATT_ID, timestamp, State::Start)?;
        let mut ctx =
            RunContext::new(&mut self.status, self.storage.as_ref()).with_cancel(&self.cancel);
        for p in &mut self.pipelines {
            p.run(&mut ctx, timestamp).inspect_err(|e| {
                error!("Pipeline {} failed: {e}", p.name());
            })?;
        }
        global_meta::upload(self.storage.as_ref(), &self.config, timestamp)?;
        self.status.set_status(TROILKATT_ID, timestamp, State::Done)?;
        self.status.persist(self.storage.as_ref())?;
        info!("Iteration done at {}", format_timestamp(timestamp));
        Ok(timestamp)
    }

    /// Clean every pipeline, report leaf dirs under `data/` and `meta/` that no pipeline cleaned,
    /// and reset the scratch log and tmp dirs.
    fn sweep(&mut self, timestamp: Timestamp) -> Result<Vec<PathBuf>> {
        let storage = self.storage.as_ref();
        let mut leaves = Vec::new();
        for root in [self.config.tfs_data_dir(), self.config.tfs_meta_dir()] {
            match sweep::leaf_dirs(storage, &root) {
                Ok(dirs) => leaves.extend(dirs),
                Err(e) => warn!("Could not list {}: {e}", root.display()),
            }
        }

        let ctx = RunContext::new(&mut self.status, storage);
        let mut cleaned = Vec::new();
        for p in &self.pipelines {
            cleaned.extend(p.cleanup(&ctx, timestamp));
        }

        let orphans = sweep::orphan_dirs(leaves, &cleaned);
        for dir in &orphans {
            warn!("Directory not cleaned (not in any pipeline): {}", dir.display());
        }
        sweep::reset_scratch_dir(&self.config.root_log_dir())?;
        sweep::reset_scratch_dir(&self.config.root_tmp_dir())?;
        Ok(orphans)
    }

    /// [`Orchestrator::run_once`], then more passes separated by the crawl interval in continuous
    /// mode until the cancel flag is set. Only one pass runs when `only` is not `all`. Returns the
    /// report of the last pass, or [`TroilkattError::Interrupted`] if the flag stopped a pass
    /// halfway.
    pub fn run(&mut self) -> Result<PassReport> {
        let mut report = self.run_once()?;
        loop {
            if report.recovery == Some(RecoveryOutcome::Declined)
                || !self.opts.update_enabled()
                || self.run_mode() == RunMode::Once
            {
                break;
            }
            if !sleep_unless_cancelled(self.config.crawl_interval(), &self.cancel) {
                info!("Interrupted; not starting another iteration");
                break;
            }
            report = self.pass()?;
        }
        info!("Troilkatt was shut down");
        Ok(report)
    }
}

/// Sleep for `total` in short slices. Returns false as soon as `cancel` is set.
fn sleep_unless_cancelled(total: Duration, cancel: &AtomicBool) -> bool {
    let start = Instant::now();
    info!("Sleeping {:?} until next iteration", total);
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let elapsed = start.elapsed();
        if elapsed >= total {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(total - elapsed));
    }
}
