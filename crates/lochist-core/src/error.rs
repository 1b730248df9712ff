use std::path::PathBuf;

use thiserror::Error;

/// Errors raised inside the history engine.
///
/// [`crate::LocalHistory`] converts these to `bool`/`Option` at its boundary;
/// [`crate::ProjectRepository`] returns them directly.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no history initialized for {0}")]
    NotInitialized(PathBuf),

    #[error("no savers registered")]
    NoSavers,

    #[error("no files to snapshot")]
    NoFiles,

    #[error("history has no head commit")]
    NoHead,

    #[error("commit not found: {0}")]
    CommitNotFound(String),

    #[error("ambiguous commit prefix {prefix}: {matches} matches")]
    AmbiguousPrefix { prefix: String, matches: usize },

    #[error("editors refused to close")]
    EditorsBusy,

    #[error("path outside project: {0}")]
    OutsideProject(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] lochist_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] lochist_refs::RefError),

    #[error("diff error: {0}")]
    Diff(#[from] lochist_diff::DiffError),

    #[error("invalid id: {0}")]
    Id(#[from] lochist_types::TypeError),

    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HistoryResult<T> = Result<T, HistoryError>;
