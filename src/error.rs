//! Error kinds for the library. The CLI wraps these in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TroilkattError>;

/// Boxed cause carried by a [`StepError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TroilkattError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Directory layout error: {0}")]
    Layout(String),

    #[error("Could not initialize step {step}: {message}")]
    StepInit { step: String, message: String },

    #[error("Step {step_id} failed: {cause}")]
    Step {
        step_id: String,
        #[source]
        cause: StepError,
    },

    #[error("Storage operation failed for {path}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Status log I/O failed for {path}: {source}")]
    StatusLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Interrupted before {0}")]
    Interrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TroilkattError {
    /// Map an I/O error on `path` into a storage error. Use with `map_err`.
    pub fn storage(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| TroilkattError::Storage { path, source }
    }

    /// Map an I/O error on the status file into a status log error. Use with `map_err`.
    pub fn status_log(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| TroilkattError::StatusLog { path, source }
    }

    /// True for failures raised by a step implementation (as opposed to storage or status log I/O).
    pub fn is_step_failure(&self) -> bool {
        matches!(self, TroilkattError::Step { .. })
    }
}

/// Failure raised by a source, stage or sink. Aborts the current `run` or `recover`.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StepError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Storage errors hit inside a step surface as step failures.
impl From<TroilkattError> for StepError {
    fn from(err: TroilkattError) -> Self {
        StepError::with_source(err.to_string(), err)
    }
}

pub type StepResult<T> = std::result::Result<T, StepError>;
