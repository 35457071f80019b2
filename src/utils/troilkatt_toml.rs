//! Load the process configuration (`troilkatt.toml`), apply `TROILKATT_<KEY>` environment
//! overrides (after an optional `.env` beside the file), and validate it.

use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::config::{PackagePaths, TroilkattConfig};
use crate::RunMode;
use crate::error::{Result, TroilkattError};

#[derive(Debug, Deserialize)]
struct TroilkattToml {
    troilkatt: TroilkattSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TroilkattSection {
    persistent_storage: Option<String>,
    localfs_dir: Option<String>,
    localfs_log_dir: Option<String>,
    global_meta_dir: Option<String>,
    mapreduce_dir: Option<String>,
    tfs_root_dir: Option<String>,
    tfs_status_file: Option<String>,
    run_mode: Option<RunMode>,
    crawl_interval_hours: Option<f64>,
    cleanup: Option<bool>,
}

/// Overwrite a string key from `TROILKATT_<KEY>` when set and non-empty.
macro_rules! apply_env_opt {
    ($section:expr, $field:ident) => {
        if let Some(v) = env_override(stringify!($field)) {
            $section.$field = Some(v);
        }
    };
}

fn env_override(key: &str) -> Option<String> {
    let var = format!("{}{}", PackagePaths::get().env_prefix(), key.to_uppercase());
    let v = std::env::var(&var).ok()?;
    let v = v.trim().to_string();
    if v.is_empty() {
        return None;
    }
    debug!("Config key {key} overridden by {var}");
    Some(v)
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| TroilkattError::Config(format!("missing required key: troilkatt.{key}")))
}

fn required_path(value: Option<String>, key: &str) -> Result<PathBuf> {
    required(value, key).map(PathBuf::from)
}

/// Parse a configuration document. Environment overrides are applied; `.env` is not read.
pub fn parse_config(text: &str) -> Result<TroilkattConfig> {
    let file: TroilkattToml =
        toml::from_str(text).map_err(|e| TroilkattError::Config(e.to_string()))?;
    let mut s = file.troilkatt;

    apply_env_opt!(s, persistent_storage);
    apply_env_opt!(s, localfs_dir);
    apply_env_opt!(s, localfs_log_dir);
    apply_env_opt!(s, global_meta_dir);
    apply_env_opt!(s, mapreduce_dir);
    apply_env_opt!(s, tfs_root_dir);
    apply_env_opt!(s, tfs_status_file);

    let config = TroilkattConfig {
        persistent_storage: required(s.persistent_storage, "persistent_storage")?,
        localfs_dir: required_path(s.localfs_dir, "localfs_dir")?,
        localfs_log_dir: required_path(s.localfs_log_dir, "localfs_log_dir")?,
        global_meta_dir: required_path(s.global_meta_dir, "global_meta_dir")?,
        mapreduce_dir: required_path(s.mapreduce_dir, "mapreduce_dir")?,
        tfs_root_dir: required_path(s.tfs_root_dir, "tfs_root_dir")?,
        tfs_status_file: required_path(s.tfs_status_file, "tfs_status_file")?,
        run_mode: s.run_mode.unwrap_or_default(),
        crawl_interval_hours: s.crawl_interval_hours.unwrap_or(24.0),
        cleanup: s.cleanup.unwrap_or(true),
    };
    validate(&config)?;
    Ok(config)
}

/// Load `path`. A `.env` file in the same directory is read first so its variables can override keys.
pub fn load_config(path: &Path) -> Result<TroilkattConfig> {
    if let Some(env_path) = path.parent().map(|d| d.join(".env"))
        && env_path.is_file()
    {
        dotenvy::from_path(&env_path).map_err(|e| {
            TroilkattError::Config(format!("could not load {}: {e}", env_path.display()))
        })?;
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        TroilkattError::Config(format!("could not read {}: {}", path.display(), e))
    })?;
    let config = parse_config(&text)?;
    debug!("{} CONFIG:{:#?}", PackagePaths::get().pkg_name().to_uppercase(), config);
    Ok(config)
}

/// Checks that do not touch the filesystem. The storage backend name is checked when storage is built.
pub fn validate(config: &TroilkattConfig) -> Result<()> {
    if !config.crawl_interval_hours.is_finite() || config.crawl_interval_hours < 0.0 {
        return Err(TroilkattError::Config(format!(
            "invalid crawl interval: {}",
            config.crawl_interval_hours
        )));
    }
    if config.run_mode == RunMode::Continuous && config.crawl_interval_hours <= 0.0 {
        return Err(TroilkattError::Config(
            "crawl interval must be positive in continuous mode".to_string(),
        ));
    }
    if config.tfs_status_file.file_name().is_none() {
        return Err(TroilkattError::Config(format!(
            "status file path has no file name: {}",
            config.tfs_status_file.display()
        )));
    }
    Ok(())
}
