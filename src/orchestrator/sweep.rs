//! Retention sweep helpers: leaf directory walk, orphan report, scratch reset.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, TroilkattError};
use crate::storage::{Storage, naming};

/// Directories below `root` that have no subdirectories. Timestamped archive directories
/// (`<ts>.none`) count as contents, not as subdirectories. `root` itself is never returned.
pub fn leaf_dirs(storage: &dyn Storage, root: &Path) -> Result<Vec<PathBuf>> {
    let mut leaves = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut children = Vec::new();
        for entry in storage.list_dir(&dir)? {
            if storage.is_dir(&entry)? && naming::dir_timestamp(&entry).is_none() {
                children.push(entry);
            }
        }
        if children.is_empty() {
            if dir != root {
                leaves.push(dir);
            }
        } else {
            pending.extend(children);
        }
    }
    leaves.sort();
    Ok(leaves)
}

/// Leaf dirs that are neither a cleaned dir nor inside one.
pub fn orphan_dirs(leaves: Vec<PathBuf>, cleaned: &[PathBuf]) -> Vec<PathBuf> {
    leaves
        .into_iter()
        .filter(|leaf| !cleaned.iter().any(|c| leaf.starts_with(c)))
        .collect()
}

/// Delete and recreate a local scratch directory. A failed delete only warns.
pub fn reset_scratch_dir(dir: &Path) -> Result<()> {
    debug!("Clean: {}", dir.display());
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not delete tmp directory {}: {e}", dir.display()),
    }
    fs::create_dir_all(dir).map_err(|e| {
        TroilkattError::Layout(format!("could not recreate {}: {e}", dir.display()))
    })
}
