//! Append-only status log: the crash-recovery ledger.
//!
//! The on-disk file is the audit trail and stays line-oriented text. Queries are answered from an
//! in-memory index that is built once when the file is loaded and updated on every append, so the
//! last appended record for a key always wins.

use log::{debug, error, warn};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::record::is_valid_step_id;
use crate::error::{Result, TroilkattError};
use crate::storage::Storage;
use crate::utils::config::PackagePaths;
use crate::{State, StatusRecord, Timestamp};

pub struct StatusLog {
    local_path: PathBuf,
    remote_path: PathBuf,
    by_key: HashMap<(String, Timestamp), State>,
    last_by_step: HashMap<String, (Timestamp, State)>,
    records: usize,
}

impl StatusLog {
    /// Open the status log. The local copy lives in `local_dir` under the remote file's name; if it
    /// does not exist it is fetched from storage, or created empty on the first run.
    pub fn open(storage: &dyn Storage, local_dir: &Path, remote_path: &Path) -> Result<Self> {
        let file_name = remote_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(PackagePaths::get().status_filename()));
        let local_path = local_dir.join(file_name);
        if !local_path.exists() {
            storage.get_status_file(remote_path, &local_path)?;
        }
        Self::load(local_path, remote_path.to_path_buf())
    }

    /// Load an existing local status file.
    pub fn load(local_path: PathBuf, remote_path: PathBuf) -> Result<Self> {
        let text = fs::read_to_string(&local_path).map_err(|e| {
            error!("Could not read status file: {e}");
            TroilkattError::status_log(&local_path)(e)
        })?;
        let mut log = Self {
            local_path,
            remote_path,
            by_key: HashMap::new(),
            last_by_step: HashMap::new(),
            records: 0,
        };
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match StatusRecord::parse_line(line) {
                Some(record) => log.index(record),
                None => warn!("Invalid line in status file: {line}"),
            }
        }
        debug!(
            "Loaded {} status records from {}",
            log.records,
            log.local_path.display()
        );
        Ok(log)
    }

    fn index(&mut self, record: StatusRecord) {
        self.records += 1;
        self.last_by_step
            .insert(record.step_id.clone(), (record.timestamp, record.state));
        self.by_key
            .insert((record.step_id, record.timestamp), record.state);
    }

    /// Append `<timestamp>:<step_id>:<state>` to the local file, then to the index.
    pub fn set_status(&mut self, step_id: &str, timestamp: Timestamp, state: State) -> Result<()> {
        if !is_valid_step_id(step_id) {
            return Err(TroilkattError::StatusLog {
                path: self.local_path.clone(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid step id: {step_id:?}"),
                ),
            });
        }
        let record = StatusRecord::new(timestamp, step_id, state);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.local_path)
            .and_then(|mut f| writeln!(f, "{}", record.to_line()).and_then(|()| f.flush()));
        if let Err(e) = written {
            error!("Could not update status file: {e}");
            return Err(TroilkattError::status_log(&self.local_path)(e));
        }
        self.index(record);
        Ok(())
    }

    /// State of the last record for `step_id` at exactly `timestamp`.
    pub fn get_status(&self, step_id: &str, timestamp: Timestamp) -> Option<State> {
        self.by_key
            .get(&(step_id.to_string(), timestamp))
            .copied()
    }

    /// Timestamp and state of the last record for `step_id`.
    pub fn get_last_record(&self, step_id: &str) -> Option<(Timestamp, State)> {
        let last = self.last_by_step.get(step_id).copied();
        if last.is_none() {
            warn!("Could not find previous status for step: {step_id}");
        }
        last
    }

    pub fn get_last_status(&self, step_id: &str) -> Option<State> {
        self.get_last_record(step_id).map(|(_, state)| state)
    }

    pub fn get_last_status_timestamp(&self, step_id: &str) -> Option<Timestamp> {
        self.get_last_record(step_id).map(|(ts, _)| ts)
    }

    /// Copy the local file to its remote location.
    pub fn persist(&self, storage: &dyn Storage) -> Result<()> {
        debug!("Persist status file to {}", self.remote_path.display());
        storage.put_status_file(&self.local_path, &self.remote_path)
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_path(&self) -> &Path {
        &self.remote_path
    }

    /// Number of valid records read or appended.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}
