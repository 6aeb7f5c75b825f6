//! Command execution engine.
//!
//! This module provides command execution capabilities:
//! - Blocking and async execution with the same semantics
//! - Capture and live (echo while capturing) output modes
//! - Timeout handling with process-group kill
//! - Retry with a fixed delay
//! - Sequential pipe chaining
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use zap::execution::{run, Command, RunOptions};
//!
//! // Simple one-shot execution
//! let result = run("echo hello", RunOptions::default())?;
//! println!("Output: {}", result);
//!
//! // Command with options, piped into another
//! let words = Command::new(["ls", "-1"])
//!     .timeout(Duration::from_secs(60))
//!     .run()?;
//! let count = (words | "wc -l")?;
//! # Ok::<(), zap::ZapError>(())
//! ```

mod command;
mod executor;
mod pipe;
mod result;
mod retry;
mod stream;

pub use command::{Command, Program, RunOptions, DEFAULT_RETRY_DELAY};
pub use executor::{
    execute, execute_async, execute_once, execute_once_async, run, run_async, KILLED_EXIT_CODE,
};
pub use pipe::Pipeline;
pub use result::{ExecutionResult, OutputChunk, OutputSource};
pub use retry::RetryPolicy;
