//! Command execution engine.
//!
//! One call spawns exactly one child. The blocking path drains stdout and
//! stderr on two reader threads and multiplexes their chunks over a
//! channel; the async path does the same with a `select!` over tokio pipes.
//! Either way the timeout clock is checked against the same deadline while
//! draining and while waiting for the exit status.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::command::{Command, Program, RunOptions};
use super::result::{ExecutionResult, OutputSource};
use super::retry::RetryPolicy;
use super::stream::{drain_async, spawn_reader, Capture};
use crate::error::ZapError;
use crate::Result;

/// Exit code recorded when the real status of a killed child is unknown.
pub const KILLED_EXIT_CODE: i32 = -1;

/// How long to keep collecting output after a timeout kill.
const KILL_GRACE: Duration = Duration::from_millis(250);

/// Poll interval while waiting for a child that closed its pipes.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Run a command and wait for it to finish.
///
/// `program` is either a shell line (`&str`/`String`) or an argument list
/// (`[&str; N]`, `Vec<String>`, ...). Fails with [`ZapError::CommandFailed`]
/// on a nonzero exit when `options.check` is set, and with
/// [`ZapError::Timeout`] whenever `options.timeout` elapses.
///
/// # Example
///
/// ```no_run
/// use zap::{run, RunOptions};
///
/// let result = run("echo hello", RunOptions::default())?;
/// assert_eq!(result.to_string(), "hello");
/// # Ok::<(), zap::ZapError>(())
/// ```
pub fn run(program: impl Into<Program>, options: RunOptions) -> Result<ExecutionResult> {
    execute(&Command::new(program).with_options(options))
}

/// Async form of [`run`].
pub async fn run_async(program: impl Into<Program>, options: RunOptions) -> Result<ExecutionResult> {
    execute_async(&Command::new(program).with_options(options)).await
}

impl Command {
    /// Execute this command, blocking until it finishes.
    pub fn run(&self) -> Result<ExecutionResult> {
        execute(self)
    }

    /// Execute this command on the tokio runtime.
    pub async fn run_async(&self) -> Result<ExecutionResult> {
        execute_async(self).await
    }
}

/// Run a command under its retry policy, blocking the current thread.
pub fn execute(command: &Command) -> Result<ExecutionResult> {
    RetryPolicy::from_options(&command.options).run(|| execute_once(command))
}

/// Run a command under its retry policy without blocking the executor.
pub async fn execute_async(command: &Command) -> Result<ExecutionResult> {
    RetryPolicy::from_options(&command.options)
        .run_async(|| execute_once_async(command))
        .await
}

/// Execute a single attempt synchronously.
pub fn execute_once(command: &Command) -> Result<ExecutionResult> {
    let start = Instant::now();
    let deadline = command.options.timeout.map(|t| start + t);

    let mut child = build_command(command)?
        .spawn()
        .map_err(|source| spawn_error(command, source))?;
    debug!(command = %command, pid = child.id(), "spawned");

    let (tx, rx) = mpsc::channel();
    let readers = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => spawn_reader(out, OutputSource::Stdout, tx.clone())
            .and_then(|_| spawn_reader(err, OutputSource::Stderr, tx)),
        _ => Err(io::Error::other("child pipes were not captured")),
    };
    if let Err(e) = readers.and_then(|_| feed_stdin(&mut child, command)) {
        terminate(&mut child, command);
        return Err(ZapError::Io(e));
    }

    let mut capture = Capture::new(command.options.live);
    let mut timed_out = false;
    loop {
        let next = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    timed_out = true;
                    break;
                }
                rx.recv_timeout(remaining)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(chunk) => capture.push(chunk),
            Err(RecvTimeoutError::Timeout) => {
                timed_out = true;
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = if timed_out {
        None
    } else {
        wait_until(&mut child, deadline)?
    };

    let Some(status) = status else {
        let code = terminate(&mut child, command);
        while let Ok(chunk) = rx.recv_timeout(KILL_GRACE) {
            capture.push(chunk);
        }
        return Err(timeout_error(command, capture, code, start.elapsed()));
    };

    finish(command, capture, exit_code(status), start.elapsed())
}

/// Execute a single attempt on the tokio runtime.
///
/// The child is killed if the returned future is dropped before completion.
pub async fn execute_once_async(command: &Command) -> Result<ExecutionResult> {
    let start = Instant::now();

    let mut cmd = tokio::process::Command::from(build_command(command)?);
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn().map_err(|source| spawn_error(command, source))?;
    debug!(command = %command, pid = child.id(), "spawned");
    let mut group = GroupKillGuard::new(&child, command);

    if let Some(mut stdin) = child.stdin.take() {
        let payload = command.options.stdin.clone().unwrap_or_default();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                debug!("stdin write failed: {}", e);
            }
        });
    }

    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(ZapError::Io(io::Error::other("child pipes were not captured")));
    };

    let mut capture = Capture::new(command.options.live);
    let completion = async {
        drain_async(&mut stdout, &mut stderr, &mut capture).await?;
        child.wait().await
    };

    let status = match command.options.timeout {
        Some(timeout) => tokio::time::timeout(timeout, completion).await.ok(),
        None => Some(completion.await),
    };

    let Some(status) = status else {
        group.kill();
        if let Err(e) = child.start_kill() {
            debug!("kill after timeout failed: {}", e);
        }
        let code = child.wait().await.map(exit_code).unwrap_or(KILLED_EXIT_CODE);
        match tokio::time::timeout(
            KILL_GRACE,
            drain_async(&mut stdout, &mut stderr, &mut capture),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("drain after timeout failed: {}", e),
            Err(_) => debug!("pipes still open {:?} after kill", KILL_GRACE),
        }
        return Err(timeout_error(command, capture, code, start.elapsed()));
    };
    group.disarm();

    finish(command, capture, exit_code(status?), start.elapsed())
}

/// Kills the child's process group if dropped while still armed.
///
/// `kill_on_drop` only reaches the direct child; a timed command leads its
/// own group, so a cancelled future must signal the group to reach
/// grandchildren too. Disarmed once the child has been reaped, since the
/// group id may then be reused.
struct GroupKillGuard {
    pgid: Option<u32>,
}

impl GroupKillGuard {
    fn new(child: &tokio::process::Child, command: &Command) -> Self {
        let pgid = if cfg!(unix) && command.options.timeout.is_some() {
            child.id()
        } else {
            None
        };
        Self { pgid }
    }

    /// Signal the group now and disarm.
    fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            kill_process_group(pgid);
        }
        self.pgid = None;
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            debug!("execution cancelled, killing process group");
            self.kill();
        }
    }
}

/// Translate a [`Command`] into a ready-to-spawn std command.
fn build_command(command: &Command) -> Result<std::process::Command> {
    if command.program.is_empty() {
        return Err(ZapError::EmptyCommand);
    }

    let mut cmd = match &command.program {
        Program::Shell(line) => shell_command(line),
        Program::Args(args) => {
            let mut cmd = std::process::Command::new(&args[0]);
            cmd.args(&args[1..]);
            cmd
        }
    };

    let opts = &command.options;
    if let Some(dir) = &opts.cwd {
        cmd.current_dir(dir);
    }
    cmd.envs(&opts.env);
    cmd.stdin(if opts.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    // Own process group so a timeout can take down grandchildren too.
    #[cfg(unix)]
    if opts.timeout.is_some() {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    Ok(cmd)
}

#[cfg(unix)]
fn shell_command(line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("/bin/sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// Write the stdin payload from a helper thread, then close the pipe.
fn feed_stdin(child: &mut Child, command: &Command) -> io::Result<()> {
    let (Some(stdin), Some(payload)) = (child.stdin.take(), command.options.stdin.clone()) else {
        return Ok(());
    };
    start_stdin_writer(stdin, payload, |writer| {
        thread::Builder::new()
            .name("zap-stdin".into())
            .spawn(writer)
            .map(drop)
    })
}

/// Hand the payload writer to `spawn`; a spawn failure is returned so the
/// child is never left running on silently missing input.
fn start_stdin_writer<S>(mut stdin: ChildStdin, payload: String, spawn: S) -> io::Result<()>
where
    S: FnOnce(Box<dyn FnOnce() + Send>) -> io::Result<()>,
{
    spawn(Box::new(move || {
        if let Err(e) = stdin.write_all(payload.as_bytes()) {
            debug!("stdin write failed: {}", e);
        }
    }))
}

/// Wait for exit, giving up at `deadline`. `None` means the deadline passed.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return Ok(Some(child.wait()?));
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

/// Kill the child (and its group when it has one) and reap it.
fn terminate(child: &mut Child, command: &Command) -> i32 {
    #[cfg(unix)]
    if command.options.timeout.is_some() {
        kill_process_group(child.id());
    }
    if let Err(e) = child.kill() {
        debug!("kill failed: {}", e);
    }
    child.wait().map(exit_code).unwrap_or(KILLED_EXIT_CODE)
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; a stale group id yields ESRCH.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

/// Map an exit status to an integer, using the negated signal on Unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    KILLED_EXIT_CODE
}

fn spawn_error(command: &Command, source: io::Error) -> ZapError {
    ZapError::Spawn {
        command: command.to_string(),
        source,
    }
}

fn timeout_error(command: &Command, capture: Capture, code: i32, elapsed: Duration) -> ZapError {
    let timeout = command.options.timeout.unwrap_or(elapsed);
    warn!(command = %command, ?timeout, "command timed out, killed");
    let (stdout, stderr) = capture.into_text();
    ZapError::Timeout {
        timeout,
        result: Box::new(ExecutionResult::new(
            command.clone(),
            stdout,
            stderr,
            code,
            elapsed,
        )),
    }
}

/// Build the result and apply enforcement.
fn finish(
    command: &Command,
    capture: Capture,
    code: i32,
    duration: Duration,
) -> Result<ExecutionResult> {
    debug!(command = %command, code, ?duration, "exited");
    let (stdout, stderr) = capture.into_text();
    let result = ExecutionResult::new(command.clone(), stdout, stderr, code, duration);
    if command.options.check && !result.ok() {
        return Err(ZapError::CommandFailed(Box::new(result)));
    }
    Ok(result)
}
