use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to clone {url} into {dest}: {source}")]
    CloneFailed {
        url: String,
        dest: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error(
        "repository at {dest} points at unexpected remote {actual} (expected {expected}); \
         fix the 'origin' remote or remove the checkout and re-run"
    )]
    DivergedRemote {
        dest: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(
        "local modifications under {subpath} of {dest} conflict with requested revision \
         {revision}; commit, stash or discard them manually"
    )]
    LocalChangesConflict {
        dest: PathBuf,
        subpath: String,
        revision: String,
    },

    #[error("cannot resolve revision '{revision}' in {dest}: {source}")]
    BadRevision {
        dest: PathBuf,
        revision: String,
        #[source]
        source: git2::Error,
    },

    #[error("repository at {dest} has no 'origin' remote")]
    MissingRemote { dest: PathBuf },

    #[error("git operation failed on {dest}: {source}")]
    Git {
        dest: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("source-control worker failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
