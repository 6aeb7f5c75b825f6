//! Sequential pipe chaining.
//!
//! A stage only starts after the previous one has exited; its stdin is the
//! previous stage's complete captured stdout. Nothing streams between stages.

use std::ops::BitOr;

use super::command::{Command, Program, RunOptions};
use super::executor::{execute, execute_async};
use super::result::ExecutionResult;
use crate::Result;

impl ExecutionResult {
    /// Run `next` with this result's stdout as its stdin.
    ///
    /// `next` keeps its own enforcement, timeout and retry settings; any
    /// stdin already present in `options` is replaced.
    pub fn pipe(&self, next: impl Into<Program>, options: RunOptions) -> Result<ExecutionResult> {
        execute(&self.feed(Command::new(next).with_options(options)))
    }

    /// Async form of [`pipe`](Self::pipe).
    pub async fn pipe_async(
        &self,
        next: impl Into<Program>,
        options: RunOptions,
    ) -> Result<ExecutionResult> {
        execute_async(&self.feed(Command::new(next).with_options(options))).await
    }

    /// Re-run the command that produced `next`, fed with this stdout.
    ///
    /// The re-run keeps every option of the original invocation except stdin.
    pub fn rerun_with_input(&self, next: &ExecutionResult) -> Result<ExecutionResult> {
        execute(&self.feed(next.command().clone()))
    }

    fn feed(&self, mut command: Command) -> Command {
        command.options.stdin = Some(self.stdout().to_string());
        command
    }
}

impl<P: Into<Program>> BitOr<P> for &ExecutionResult {
    type Output = Result<ExecutionResult>;

    /// `result | "grep x"` runs the right side with default options.
    fn bitor(self, next: P) -> Self::Output {
        self.pipe(next, RunOptions::default())
    }
}

impl<P: Into<Program>> BitOr<P> for ExecutionResult {
    type Output = Result<ExecutionResult>;

    fn bitor(self, next: P) -> Self::Output {
        self.pipe(next, RunOptions::default())
    }
}

/// A fixed chain of commands run left to right.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Command>,
}

impl Pipeline {
    /// Start a pipeline; the first stage uses its own stdin, if any.
    pub fn new(first: Command) -> Self {
        Self {
            stages: vec![first],
        }
    }

    /// Append a stage with its own options.
    pub fn pipe(mut self, next: Command) -> Self {
        self.stages.push(next);
        self
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    /// Run every stage, returning the last stage's result.
    ///
    /// Stops at the first stage that fails.
    pub fn run(&self) -> Result<ExecutionResult> {
        let (first, rest) = self.split();
        let mut result = execute(first)?;
        for stage in rest {
            result = execute(&result.feed(stage.clone()))?;
        }
        Ok(result)
    }

    /// Async form of [`run`](Self::run).
    pub async fn run_async(&self) -> Result<ExecutionResult> {
        let (first, rest) = self.split();
        let mut result = execute_async(first).await?;
        for stage in rest {
            result = execute_async(&result.feed(stage.clone())).await?;
        }
        Ok(result)
    }

    fn split(&self) -> (&Command, &[Command]) {
        // `new` guarantees at least one stage.
        let (first, rest) = self.stages.split_at(1);
        (&first[0], rest)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_feeds_stdout() {
        let first = execute(&Command::new("echo hello world")).unwrap();
        let second = first.pipe("wc -w", RunOptions::default()).unwrap();
        assert_eq!(second.to_string(), "2");
        assert_eq!(second.command().options.stdin.as_deref(), Some("hello world\n"));
    }

    #[test]
    fn test_pipe_operator_chain() {
        let first = execute(&Command::new("printf 'a\\nb\\nc\\n'")).unwrap();
        let result = (&first | "grep b").and_then(|r| r | "wc -l").unwrap();
        assert_eq!(result.to_string(), "1");
    }

    #[test]
    fn test_pipe_operator_enforces_exit() {
        let first = execute(&Command::new("echo nothing")).unwrap();
        let err = (first | "grep missing").unwrap_err();
        assert_eq!(err.code(), Some(1));
    }

    #[test]
    fn test_rerun_with_input() {
        let counter = execute(&Command::new("wc -w").stdin("one")).unwrap();
        let words = execute(&Command::new("echo a b c")).unwrap();
        let rerun = words.rerun_with_input(&counter).unwrap();
        assert_eq!(rerun.to_string(), "3");
    }

    #[test]
    fn test_pipeline_runs_stages_in_order() {
        let pipeline = Pipeline::new(Command::new("printf 'x\\ny\\nx\\n'"))
            .pipe(Command::new(["grep", "x"]))
            .pipe(Command::new("wc -l"));
        assert_eq!(pipeline.stages().len(), 3);
        assert_eq!(pipeline.run().unwrap().to_string(), "2");
    }

    #[test]
    fn test_pipeline_stage_options_respected() {
        let pipeline = Pipeline::new(Command::new("echo x"))
            .pipe(Command::new("grep nope").check(false))
            .pipe(Command::new("cat"));
        let result = pipeline.run().unwrap();
        assert!(result.ok());
        assert_eq!(result.stdout(), "");
    }

    #[tokio::test]
    async fn test_pipeline_async() {
        let pipeline = Pipeline::new(Command::new("echo hello")).pipe(Command::new("tr a-z A-Z"));
        let result = pipeline.run_async().await.unwrap();
        assert_eq!(result.to_string(), "HELLO");
    }
}
