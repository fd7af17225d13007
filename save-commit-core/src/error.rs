// error types shared across the core

use std::path::PathBuf;
use thiserror::Error;

/// failures from the git binary or libgit2 probes
#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("git executable not found on PATH")]
    GitUnavailable,

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("libgit2 error: {0}")]
    Probe(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// failures talking to the text generation backend
///
/// every variant degrades to the template fallback, none aborts a commit
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("backend returned an empty message")]
    Empty,
}

/// top-level errors surfaced by the save handler and undo
#[derive(Debug, Error)]
pub enum SaveCommitError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("HEAD moved since the last auto-commit (expected {expected}, found {actual}); refusing to undo")]
    HeadMoved { expected: String, actual: String },

    #[error("no auto-commit recorded to undo")]
    NothingToUndo,

    #[error("cancelled by user")]
    Cancelled,

    #[error("state file error: {0}")]
    State(String),
}

pub type Result<T, E = SaveCommitError> = std::result::Result<T, E>;
