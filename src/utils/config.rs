//! Application configuration: package-derived names, layout constants, and the resolved
//! process configuration loaded from `troilkatt.toml`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::RunMode;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    status_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                status_filename: format!("{pkg}-status.txt"),
                env_prefix: format!("{}_", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Local status file name used when the remote path has no file name.
    pub fn status_filename(&self) -> &str {
        &self.status_filename
    }

    /// Prefix of environment variables overriding config keys, e.g. `TROILKATT_TFS_ROOT_DIR`.
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// `log` target for records emitted on behalf of a pipeline.
    pub fn pipeline_log_target(&self, pipeline: &str) -> String {
        format!("{}::pipeline::{}", self.pkg_name, pipeline)
    }
}

// ---- Storage layout ----

/// Directory names under the storage root (`tfs_root_dir`).
pub struct TfsLayout;

impl TfsLayout {
    pub const DATA: &'static str = "data";
    pub const META: &'static str = "meta";
    pub const LOG: &'static str = "log";
    pub const GLOBAL_META: &'static str = "global-meta";
}

/// Orchestrator scratch directories, relative to `localfs_log_dir` and `localfs_dir`.
pub struct ScratchLayout;

impl ScratchLayout {
    /// `<localfs_log_dir>/troilkatt`
    pub const ROOT_LOG: &'static str = "troilkatt";
    /// `<localfs_dir>/tmp/troilkatt`
    pub const ROOT_TMP: &'static str = "tmp/troilkatt";
}

// ---- Time ----

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Granularity of the interruptible sleep between continuous-mode passes.
pub const SLEEP_SLICE: Duration = Duration::from_secs(1);

// ---- Pipeline documents ----

/// Required extension of pipeline documents listed in the manifest.
pub const PIPELINE_DOC_EXTENSION: &str = "toml";

/// Defaults for optional step keys in pipeline documents.
pub struct StepDefaults;

impl StepDefaults {
    pub const COMPRESSION: &'static str = "none";
    /// Keep forever.
    pub const STORAGE_TIME: i32 = -1;
}

// ---- Process configuration ----

/// Process configuration after file load, environment overrides and validation.
#[derive(Clone, Debug)]
pub struct TroilkattConfig {
    /// Storage backend name: `local` (or its alias `nfs`).
    pub persistent_storage: String,
    /// Local scratch root. The local status copy and per-pipeline scratch dirs live here.
    pub localfs_dir: PathBuf,
    pub localfs_log_dir: PathBuf,
    /// Local working tree of the global-meta snapshot.
    pub global_meta_dir: PathBuf,
    pub mapreduce_dir: PathBuf,
    /// Storage root holding `data/`, `meta/`, `log/` and `global-meta/`.
    pub tfs_root_dir: PathBuf,
    pub tfs_status_file: PathBuf,
    pub run_mode: RunMode,
    pub crawl_interval_hours: f64,
    /// Retention sweep enabled.
    pub cleanup: bool,
}

impl TroilkattConfig {
    pub fn tfs_data_dir(&self) -> PathBuf {
        self.tfs_root_dir.join(TfsLayout::DATA)
    }

    pub fn tfs_meta_dir(&self) -> PathBuf {
        self.tfs_root_dir.join(TfsLayout::META)
    }

    pub fn tfs_log_dir(&self) -> PathBuf {
        self.tfs_root_dir.join(TfsLayout::LOG)
    }

    pub fn tfs_global_meta_dir(&self) -> PathBuf {
        self.tfs_root_dir.join(TfsLayout::GLOBAL_META)
    }

    pub fn root_log_dir(&self) -> PathBuf {
        self.localfs_log_dir.join(ScratchLayout::ROOT_LOG)
    }

    pub fn root_tmp_dir(&self) -> PathBuf {
        self.localfs_dir.join(ScratchLayout::ROOT_TMP)
    }

    /// Absolute output dirs are kept; relative ones resolve under `<tfs_root>/data`.
    pub fn resolve_output_dir(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.tfs_data_dir().join(dir)
        }
    }

    /// `<tfs_root>/meta/<pipeline>/<step_id>`
    pub fn step_meta_dir(&self, pipeline: &str, step_id: &str) -> PathBuf {
        self.tfs_meta_dir().join(pipeline).join(step_id)
    }

    /// Sleep between continuous-mode passes.
    pub fn crawl_interval(&self) -> Duration {
        Duration::from_secs_f64(self.crawl_interval_hours.max(0.0) * 3600.0)
    }
}
