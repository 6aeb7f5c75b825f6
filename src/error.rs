//! Error types for zap.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::execution::ExecutionResult;

/// Main error type for zap operations.
#[derive(Error, Debug)]
pub enum ZapError {
    /// The command ran to completion but exited with a nonzero status
    /// while enforcement was enabled.
    #[error("{}", failure_message(.0))]
    CommandFailed(Box<ExecutionResult>),

    /// The command overran its timeout and was killed.
    ///
    /// The carried result holds whatever output was captured before the kill.
    #[error("command timed out after {:?}: {}", .timeout, .result.command())]
    Timeout {
        timeout: Duration,
        result: Box<ExecutionResult>,
    },

    /// The process could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An argument list with no program in it.
    #[error("empty command")]
    EmptyCommand,

    /// Captured stdout is not valid JSON.
    #[error("output parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Scoped directory change could not enter the target.
    #[error("cannot change directory to {}: {source}", .path.display())]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while talking to the child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZapError {
    /// The execution result attached to a nonzero-exit or timeout failure.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::CommandFailed(result) | Self::Timeout { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Exit status of the failed command, if it got far enough to have one.
    pub fn code(&self) -> Option<i32> {
        self.result().map(ExecutionResult::code)
    }

    /// Captured stderr of the failed command.
    pub fn stderr(&self) -> Option<&str> {
        self.result().map(ExecutionResult::stderr)
    }

    /// Captured stdout of the failed command.
    pub fn stdout(&self) -> Option<&str> {
        self.result().map(ExecutionResult::stdout)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether a retry policy may re-attempt after this failure.
    ///
    /// Only outcomes of a process that actually ran are retried; spawn and
    /// setup failures would fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CommandFailed(_) | Self::Timeout { .. })
    }
}

fn failure_message(result: &ExecutionResult) -> String {
    let stderr = result.stderr().trim();
    if stderr.is_empty() {
        format!("command failed with exit code {}", result.code())
    } else {
        stderr.to_string()
    }
}

/// Convenience Result type for zap operations.
pub type Result<T> = std::result::Result<T, ZapError>;
