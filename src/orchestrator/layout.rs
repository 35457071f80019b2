//! Local and storage directory layout, created at startup and verified before anything runs.

use log::debug;
use std::fs;
use std::path::PathBuf;

use crate::error::{Result, TroilkattError};
use crate::storage::Storage;
use crate::utils::config::TroilkattConfig;

/// Local directories the orchestrator needs, including its own scratch log and tmp dirs.
pub fn local_dirs(config: &TroilkattConfig) -> Vec<PathBuf> {
    vec![
        config.localfs_dir.clone(),
        config.localfs_log_dir.clone(),
        config.global_meta_dir.clone(),
        config.mapreduce_dir.clone(),
        config.root_log_dir(),
        config.root_tmp_dir(),
    ]
}

/// Storage directories: the root and its `data`, `meta`, `log` and `global-meta` children.
pub fn storage_dirs(config: &TroilkattConfig) -> Vec<PathBuf> {
    vec![
        config.tfs_root_dir.clone(),
        config.tfs_data_dir(),
        config.tfs_meta_dir(),
        config.tfs_log_dir(),
        config.tfs_global_meta_dir(),
    ]
}

/// Create missing directories, then check that each one is a directory.
pub fn ensure_layout(config: &TroilkattConfig, storage: &dyn Storage) -> Result<()> {
    for dir in local_dirs(config) {
        fs::create_dir_all(&dir).map_err(|e| {
            TroilkattError::Layout(format!("could not create local dir {}: {e}", dir.display()))
        })?;
        if !dir.is_dir() {
            return Err(TroilkattError::Layout(format!(
                "not a directory: {}",
                dir.display()
            )));
        }
    }
    for dir in storage_dirs(config) {
        let created = storage
            .mkdir_all(&dir)
            .and_then(|()| storage.is_dir(&dir));
        match created {
            Ok(true) => {}
            Ok(false) => {
                return Err(TroilkattError::Layout(format!(
                    "not a directory in storage: {}",
                    dir.display()
                )));
            }
            Err(e) => {
                return Err(TroilkattError::Layout(format!(
                    "could not create storage dir {}: {e}",
                    dir.display()
                )));
            }
        }
    }
    debug!("Directory layout verified");
    Ok(())
}
