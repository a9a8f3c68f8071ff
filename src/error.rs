use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::lock::LockError;
use crate::storage::CacheError;

/// The cache or its lock marker could not be resolved or opened.
///
/// Not retriable without the operator fixing something first.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("No cache file given and no default location could be determined; pass --cache-file")]
    NoCachePath,

    #[error("{0} must not be empty")]
    EmptyKey(&'static str),

    #[error("Failed to use lock file '{}': {source}", path.display())]
    LockMarker {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Everything a move can end in besides success.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Another process holds the cache; retry once it has exited
    #[error("The cache is opened by another process (PID: {holder})")]
    Busy { holder: String, marker: PathBuf },

    /// The transaction was rolled back; the cache is as it was before the run
    #[error("Failed to move feed URL, cache left unchanged: {0}")]
    MigrationFailed(#[source] sqlx::Error),
}

impl From<LockError> for MoveError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { holder, marker } => MoveError::Busy { holder, marker },
            LockError::Io { path, source } => SetupError::LockMarker { path, source }.into(),
        }
    }
}

impl From<CacheError> for MoveError {
    fn from(err: CacheError) -> Self {
        SetupError::Cache(err).into()
    }
}
