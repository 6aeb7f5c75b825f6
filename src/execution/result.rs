//! Execution result types.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::command::Command;
use crate::Result;

/// Characters of stdout shown by [`ExecutionResult::summary`].
const SUMMARY_PREVIEW_CHARS: usize = 60;

/// Outcome of one completed (or killed) process.
///
/// Built once when the process terminates and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    command: Command,
    stdout: String,
    stderr: String,
    code: i32,
    duration: Duration,
}

impl ExecutionResult {
    /// Create a new execution result.
    pub fn new(
        command: Command,
        stdout: String,
        stderr: String,
        code: i32,
        duration: Duration,
    ) -> Self {
        Self {
            command,
            stdout,
            stderr,
            code,
            duration,
        }
    }

    /// The command that produced this result.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Full captured stdout.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Full captured stderr.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Exit status. Negative when the process was killed by a signal.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Wall time from spawn to reap.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Check if command succeeded (exit code 0).
    pub fn ok(&self) -> bool {
        self.code == 0
    }

    /// Get stdout as string, trimmed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Stdout split into lines.
    ///
    /// Splits on `\n` and strips one trailing `\r` from each line, so CRLF
    /// output yields the same lines as LF. A final newline adds no empty
    /// entry; interior blank lines are kept.
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }

    /// Decode stdout as JSON into any deserializable type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.stdout)?)
    }

    /// Decode stdout as an untyped JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value> {
        self.json()
    }

    /// Short status line: `ok` or `err:<code>` plus a stdout preview.
    pub fn summary(&self) -> String {
        let status = if self.ok() {
            "ok".to_string()
        } else {
            format!("err:{}", self.code)
        };
        let preview: String = self
            .stdout_trimmed()
            .chars()
            .take(SUMMARY_PREVIEW_CHARS)
            .collect();
        format!("{status} {preview:?}")
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stdout_trimmed())
    }
}

impl From<&ExecutionResult> for bool {
    fn from(result: &ExecutionResult) -> Self {
        result.ok()
    }
}

impl From<ExecutionResult> for bool {
    fn from(result: ExecutionResult) -> Self {
        result.ok()
    }
}

/// Streaming output chunk from execution.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    /// Raw bytes.
    pub raw: Vec<u8>,
    /// Stream source.
    pub source: OutputSource,
}

/// Source of output data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputChunk {
    /// Create a new output chunk.
    pub fn new(raw: Vec<u8>, source: OutputSource) -> Self {
        Self { raw, source }
    }

    /// Create a stdout chunk.
    pub fn stdout(raw: Vec<u8>) -> Self {
        Self::new(raw, OutputSource::Stdout)
    }

    /// Create a stderr chunk.
    pub fn stderr(raw: Vec<u8>) -> Self {
        Self::new(raw, OutputSource::Stderr)
    }
}
