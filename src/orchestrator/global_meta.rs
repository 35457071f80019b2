//! Global-meta: a metadata tree shared by all pipelines, kept locally in `global_meta_dir` and
//! archived in storage under `global-meta/<timestamp>.tar.gz` after every completed iteration.

use log::{info, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::error::{Result, TroilkattError};
use crate::storage::{ArchiveFormat, Storage};
use crate::utils::config::TroilkattConfig;
use crate::{FileList, Timestamp};

/// Unpack the newest global-meta archive into the local working tree. Returns the number of files;
/// zero when storage holds no archive yet.
pub fn download(storage: &dyn Storage, config: &TroilkattConfig) -> Result<usize> {
    let Some(newest) = storage.newest_subdir(&config.tfs_global_meta_dir())? else {
        warn!("No global meta data!");
        return Ok(0);
    };
    let files = storage.get_archive(&newest, &config.global_meta_dir)?;
    info!(
        "Downloaded {} global meta files from {}",
        files.len(),
        newest.display()
    );
    Ok(files.len())
}

/// Archive the local working tree into storage under `timestamp`. Returns the archive path.
pub fn upload(
    storage: &dyn Storage,
    config: &TroilkattConfig,
    timestamp: Timestamp,
) -> Result<PathBuf> {
    let files = local_files(config)?;
    let archive = storage.put_archive(
        &config.tfs_global_meta_dir(),
        timestamp,
        &config.global_meta_dir,
        &files,
        ArchiveFormat::TarGz,
    )?;
    info!("Saved {} global meta files to {}", files.len(), archive.display());
    Ok(archive)
}

fn local_files(config: &TroilkattConfig) -> Result<FileList> {
    let mut files = Vec::new();
    for entry in WalkDir::new(&config.global_meta_dir).min_depth(1) {
        let entry = entry.map_err(|e| TroilkattError::Storage {
            path: config.global_meta_dir.clone(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
