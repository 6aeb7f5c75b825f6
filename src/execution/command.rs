//! Command building and representation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default pause between retry attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What to execute: a shell line or a literal argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// Passed as one line to the platform shell (`sh -c` / `cmd /C`).
    ///
    /// Shell metacharacters are expanded; never interpolate untrusted input.
    Shell(String),
    /// Executed directly with `argv[0]` as the program, no shell involved.
    Args(Vec<String>),
}

impl Program {
    /// Build an argument-list program from any iterable of tokens.
    pub fn args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Args(args.into_iter().map(Into::into).collect())
    }

    /// Returns true for an argument list with no program in it.
    ///
    /// A shell line is never empty: a blank one is handed to the shell,
    /// which runs it as a no-op.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(_) => false,
            Self::Args(args) => args.is_empty(),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(line) => f.write_str(line),
            Self::Args(args) => f.write_str(&args.join(" ")),
        }
    }
}

impl From<&str> for Program {
    fn from(line: &str) -> Self {
        Self::Shell(line.to_string())
    }
}

impl From<String> for Program {
    fn from(line: String) -> Self {
        Self::Shell(line)
    }
}

impl From<&String> for Program {
    fn from(line: &String) -> Self {
        Self::Shell(line.clone())
    }
}

impl From<Vec<String>> for Program {
    fn from(args: Vec<String>) -> Self {
        Self::Args(args)
    }
}

impl From<Vec<&str>> for Program {
    fn from(args: Vec<&str>) -> Self {
        Self::args(args)
    }
}

impl From<&[&str]> for Program {
    fn from(args: &[&str]) -> Self {
        Self::args(args.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Program {
    fn from(args: [&str; N]) -> Self {
        Self::args(args)
    }
}

/// Execution options shared by every entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Treat a nonzero exit status as an error.
    pub check: bool,
    /// Kill the process if it runs longer than this.
    pub timeout: Option<Duration>,
    /// Working directory override (if any).
    pub cwd: Option<PathBuf>,
    /// Variables merged over the inherited environment.
    pub env: HashMap<String, String>,
    /// Text written to the child's stdin before it is closed.
    pub stdin: Option<String>,
    /// Echo output to the terminal while capturing it.
    pub live: bool,
    /// Extra attempts after the first one fails.
    pub retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check: true,
            timeout: None,
            cwd: None,
            env: HashMap::new(),
            stdin: None,
            live: false,
            retries: 0,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RunOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether a nonzero exit is an error.
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Set the stdin payload.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Set live echo.
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Set the number of extra attempts.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the pause between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A command together with the options it runs under.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The program to execute.
    pub program: Program,
    /// How to execute it.
    pub options: RunOptions,
}

impl Command {
    /// Create a new command with default options.
    pub fn new(program: impl Into<Program>) -> Self {
        Self {
            program: program.into(),
            options: RunOptions::default(),
        }
    }

    /// Replace all options at once.
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Set whether a nonzero exit is an error.
    pub fn check(mut self, check: bool) -> Self {
        self.options.check = check;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.options.timeout = Some(duration);
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Set the stdin payload.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.options.stdin = Some(input.into());
        self
    }

    /// Set live echo.
    pub fn live(mut self, live: bool) -> Self {
        self.options.live = live;
        self
    }

    /// Set retry count and delay.
    pub fn retries(mut self, retries: u32, delay: Duration) -> Self {
        self.options.retries = retries;
        self.options.delay = delay;
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.program, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let opts = RunOptions::default();
        assert!(opts.check);
        assert!(opts.timeout.is_none());
        assert!(opts.cwd.is_none());
        assert!(opts.env.is_empty());
        assert!(opts.stdin.is_none());
        assert!(!opts.live);
        assert_eq!(opts.retries, 0);
        assert_eq!(opts.delay, DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_program_from_str_is_shell() {
        assert_eq!(Program::from("ls -la"), Program::Shell("ls -la".into()));
    }

    #[test]
    fn test_program_from_array_is_args() {
        let program = Program::from(["echo", "$(whoami)"]);
        assert_eq!(
            program,
            Program::Args(vec!["echo".into(), "$(whoami)".into()])
        );
        assert_eq!(program.to_string(), "echo $(whoami)");
    }

    #[test]
    fn test_program_is_empty() {
        assert!(!Program::from("   ").is_empty());
        assert!(!Program::from("").is_empty());
        assert!(Program::Args(Vec::new()).is_empty());
        assert!(!Program::from("true").is_empty());
    }

    #[test]
    fn test_command_builder_chain() {
        let cmd = Command::new("cargo build")
            .cwd("/project")
            .env("RUST_LOG", "debug")
            .timeout(Duration::from_secs(60))
            .stdin("input")
            .check(false)
            .retries(2, Duration::from_millis(50));

        assert_eq!(cmd.to_string(), "cargo build");
        assert_eq!(cmd.options.cwd, Some(PathBuf::from("/project")));
        assert_eq!(cmd.options.env.get("RUST_LOG"), Some(&"debug".to_string()));
        assert_eq!(cmd.options.timeout, Some(Duration::from_secs(60)));
        assert_eq!(cmd.options.stdin.as_deref(), Some("input"));
        assert!(!cmd.options.check);
        assert_eq!(cmd.options.retries, 2);
        assert_eq!(cmd.options.delay, Duration::from_millis(50));
    }

    #[test]
    fn test_options_envs() {
        let opts = RunOptions::new().envs([("KEY1", "val1"), ("KEY2", "val2")]);
        assert_eq!(opts.env.len(), 2);
        assert_eq!(opts.env.get("KEY2"), Some(&"val2".to_string()));
    }
}
