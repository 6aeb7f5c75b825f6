//! # zap
//!
//! Run external commands without the ceremony.
//!
//! This crate wraps process spawning with the things scripts usually need:
//! captured stdout/stderr, optional live echo to the terminal, timeouts that
//! take down the whole process group, retries with a fixed delay, and
//! sequential pipes where one command's output becomes the next one's input.
//!
//! ## Features
//!
//! - **Two command shapes**: shell lines (`"ls | wc -l"`) or literal
//!   argument lists (`["echo", "$(whoami)"]`, never shell-expanded)
//! - **Enforcement**: nonzero exit is an error unless `check` is off
//! - **Live mode**: stream output to the terminal while still capturing it
//! - **Async**: the same contract on tokio, killing the child on cancel
//! - **Helpers**: `which` for PATH lookup and `cd` for scoped directory changes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use zap::{run, RunOptions};
//!
//! fn main() -> zap::Result<()> {
//!     // Initialize logging
//!     zap::logging::try_init().ok();
//!
//!     let branch = run("git rev-parse --abbrev-ref HEAD", RunOptions::default())?;
//!     println!("on {}", branch);
//!
//!     let errors = (run("cat app.log", RunOptions::default())? | "grep ERROR")?;
//!     for line in errors.lines() {
//!         println!("{line}");
//!     }
//!
//!     let flaky = RunOptions::new()
//!         .timeout(Duration::from_secs(10))
//!         .retries(2)
//!         .delay(Duration::from_millis(500));
//!     run(["curl", "-fsS", "https://example.com/health"], flaky)?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use env::{cd, which, DirGuard};
pub use error::{Result, ZapError};
pub use execution::{
    run, run_async, Command, ExecutionResult, Pipeline, Program, RetryPolicy, RunOptions,
};
