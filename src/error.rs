use crate::model::RepoFailure;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiaryError>;

/// Run-level failures. Anything here aborts the whole invocation.
#[derive(Error, Debug)]
pub enum DiaryError {
    #[error("{} is not a git repository: {reason}", .path.display())]
    NotARepository { path: PathBuf, reason: String },
    #[error("Invalid date: {0}")]
    InvalidDateFormat(String),
    #[error("No activity found: none of {} repositories could be scanned", .failures.len())]
    NoActivityFound { failures: Vec<RepoFailure> },
    #[error("Root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while pulling history out of a single repository.
///
/// The engine converts these into [`RepoFailure`] entries; they never abort a run.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`git {command}` exited with status {code}: {stderr}")]
    Exited {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("`git {command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
    #[error("scan cancelled")]
    Cancelled,
    #[error("unparseable {what} output at line {line}: {reason}")]
    Parse {
        what: &'static str,
        line: usize,
        reason: String,
    },
}

impl ExtractionError {
    pub(crate) fn parse(what: &'static str, line: usize, reason: impl Into<String>) -> Self {
        ExtractionError::Parse {
            what,
            line,
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractionError::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Inference server unavailable at {endpoint}: {reason}")]
    InferenceUnavailable { endpoint: String, reason: String },
    #[error("Inference request timed out after {0:?}")]
    InferenceTimeout(Duration),
    #[error("Unexpected inference response: {0}")]
    BadResponse(String),
}
