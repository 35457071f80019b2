//! Versioned, path-based blob store consumed by the status log, global-meta sync and cleanup.
//!
//! Implementors provide the primitive operations (listing, copying, deleting, archiving); the
//! version-aware queries and the retention sweep are derived from them here.

pub mod local;
pub mod naming;
pub mod retention;

use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TroilkattError};
use crate::utils::config::TroilkattConfig;
use crate::{FileList, Timestamp};

pub use local::LocalStorage;
pub use naming::{ArchiveFormat, CompressionTag, VersionedName};

pub trait Storage {
    /// Create `dir` and its parents. Existing directories are not an error.
    fn mkdir_all(&self, dir: &Path) -> Result<()>;

    fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Entries (files and directories) directly under `dir`, sorted.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// All files under `dir`, recursively, sorted.
    fn list_recursive(&self, dir: &Path) -> Result<FileList>;

    /// Delete a file or a whole directory.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Store `files` (all under `base`) as one archive `<dir>/<timestamp>.<format>`. Returns the archive path.
    fn put_archive(
        &self,
        dir: &Path,
        timestamp: Timestamp,
        base: &Path,
        files: &[PathBuf],
        format: ArchiveFormat,
    ) -> Result<PathBuf>;

    /// Unpack an archive written by [`Storage::put_archive`] into `local_dir`. Returns the local files.
    fn get_archive(&self, archive: &Path, local_dir: &Path) -> Result<FileList>;

    /// Copy the remote status file to `local`, or create an empty `local` if there is none (first run).
    fn get_status_file(&self, remote: &Path, local: &Path) -> Result<()>;

    fn put_status_file(&self, local: &Path, remote: &Path) -> Result<()>;

    /// Store the local file `local` as `<dir>/<file name>.<timestamp>.<compression>`. Returns the stored path.
    fn put_file(
        &self,
        local: &Path,
        dir: &Path,
        timestamp: Timestamp,
        compression: CompressionTag,
    ) -> Result<PathBuf>;

    fn parse_versioned_name(&self, name: &str) -> Option<VersionedName> {
        VersionedName::parse(name)
    }

    /// Newest version of every file under `dir` (recursive). Unversioned files are skipped.
    fn list_newest(&self, dir: &Path) -> Result<FileList> {
        let mut newest: HashMap<PathBuf, (Timestamp, PathBuf)> = HashMap::new();
        for f in self.list_recursive(dir)? {
            let Some(v) = versioned(self, &f) else {
                warn!("File without a valid timestamp: {}", f.display());
                continue;
            };
            let key = f.with_file_name(&v.basename);
            match newest.get(&key) {
                Some((ts, _)) if *ts >= v.timestamp => {}
                _ => {
                    newest.insert(key, (v.timestamp, f));
                }
            }
        }
        let mut files: FileList = newest.into_values().map(|(_, f)| f).collect();
        files.sort();
        Ok(files)
    }

    /// Files under `dir` (recursive) whose version is exactly `timestamp`.
    fn list_at_timestamp(&self, dir: &Path, timestamp: Timestamp) -> Result<FileList> {
        Ok(self
            .list_recursive(dir)?
            .into_iter()
            .filter(|f| versioned(self, f).is_some_and(|v| v.timestamp == timestamp))
            .collect())
    }

    /// Archive under `dir` with the highest timestamp, or `None` if there is none.
    fn newest_subdir(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let mut newest: Option<(Timestamp, PathBuf)> = None;
        for entry in self.list_dir(dir)? {
            let Some(ts) = naming::dir_timestamp(&entry) else {
                warn!("Invalid subdirectory name: {}", entry.display());
                continue;
            };
            if newest.as_ref().is_none_or(|(max, _)| ts > *max) {
                newest = Some((ts, entry));
            }
        }
        Ok(newest.map(|(_, p)| p))
    }

    /// Delete versioned files under `dir` that are expired at `timestamp`. Returns the number deleted.
    /// `retention_days == -1` deletes nothing.
    fn cleanup_older_than(
        &self,
        dir: &Path,
        timestamp: Timestamp,
        retention_days: i32,
    ) -> Result<usize> {
        if retention_days <= retention::KEEP_FOREVER {
            info!("All files in directory are kept forever: {}", dir.display());
            return Ok(0);
        }
        let files = self.list_recursive(dir)?;
        let mut deleted = 0;
        for f in &files {
            let Some(v) = versioned(self, f) else {
                warn!("Could not get timestamp for file: {}", f.display());
                continue;
            };
            if retention::is_expired(timestamp, v.timestamp, retention_days) {
                match self.delete(f) {
                    Ok(()) => deleted += 1,
                    Err(e) => warn!("Could not delete file: {e}"),
                }
            }
        }
        if deleted > 0 {
            info!("Deleted {} of {} files in {}", deleted, files.len(), dir.display());
        }
        Ok(deleted)
    }

    /// Delete expired archives directly under `dir`. The newest archive is always kept.
    fn cleanup_meta_older_than(
        &self,
        dir: &Path,
        timestamp: Timestamp,
        retention_days: i32,
    ) -> Result<usize> {
        if retention_days <= retention::KEEP_FOREVER {
            info!("All files in directory are kept forever: {}", dir.display());
            return Ok(0);
        }
        let Some(newest) = self.newest_subdir(dir)? else {
            warn!("No directory archive found: {}", dir.display());
            return Ok(0);
        };
        let entries = self.list_dir(dir)?;
        let mut deleted = 0;
        for entry in entries.iter().filter(|e| **e != newest) {
            let Some(ts) = naming::dir_timestamp(entry) else {
                warn!("Could not get timestamp for archive: {}", entry.display());
                continue;
            };
            if retention::is_expired(timestamp, ts, retention_days) {
                match self.delete(entry) {
                    Ok(()) => deleted += 1,
                    Err(e) => warn!("Could not delete archive: {e}"),
                }
            }
        }
        if deleted > 0 {
            info!("Deleted {} of {} meta archives in {}", deleted, entries.len(), dir.display());
        }
        Ok(deleted)
    }
}

fn versioned<S: Storage + ?Sized>(storage: &S, path: &Path) -> Option<VersionedName> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| storage.parse_versioned_name(n))
}

/// Storage backend selected by `persistent_storage` in the configuration.
pub fn from_config(config: &TroilkattConfig) -> Result<Box<dyn Storage>> {
    match config.persistent_storage.as_str() {
        "local" | "nfs" => Ok(Box::new(LocalStorage::new())),
        other => Err(TroilkattError::Config(format!(
            "invalid value for persistent storage: {other}"
        ))),
    }
}
