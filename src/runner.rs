//! src/runner.rs
//!
//! Interpreter execution with a wall-clock timeout.
//!
//! # Isolation
//! The interpreter runs as a plain child process with:
//! - No stdin (`/dev/null`)
//! - Its own process group, so a timeout kills every descendant, not just the child
//! - Bounded stdout/stderr capture, drained on background threads
//!
//! There is no filesystem or network isolation here; deploy behind a container or a
//! dedicated user if submissions are hostile.

use crate::error::{Result, SandboxError};
use crate::languages::LanguageSpec;
use crate::workspace::Workspace;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Time the readers get to reach EOF when the child exits right at the deadline.
const PIPE_GRACE: Duration = Duration::from_millis(100);

#[cfg(target_os = "linux")]
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Limits applied to one interpreter run.
#[derive(Clone, Copy, Debug)]
pub struct RunLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// How a single interpreter run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit status 0.
    Success { stdout: String },
    /// Non-zero exit, or killed by a signal (`exit_code` is `None`).
    RuntimeFailure {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    /// The wall-clock limit elapsed and the process group was killed.
    Timeout { limit: Duration },
    /// The interpreter could not be spawned or waited on.
    SystemError { message: String },
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Success { .. } => "success",
            RunOutcome::RuntimeFailure { .. } => "failure",
            RunOutcome::Timeout { .. } => "timeout",
            RunOutcome::SystemError { .. } => "system-error",
        }
    }
}

/// Output of a process that exited on its own before the deadline.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run the workspace file with the language's interpreter.
///
/// The interpreter gets the workspace's absolute path as its only argument and the
/// workspace directory as its working directory.
pub fn execute(workspace: &Workspace, spec: &LanguageSpec, limits: &RunLimits) -> RunOutcome {
    let mut cmd = Command::new(&spec.command);
    cmd.arg(workspace.path())
        .env("PYTHONPATH", "")
        .env("PYTHONDONTWRITEBYTECODE", "1");
    if let Some(dir) = workspace.path().parent() {
        cmd.current_dir(dir);
    }

    match run_captured(cmd, limits) {
        Ok(output) if output.status.success() => RunOutcome::Success {
            stdout: output.stdout,
        },
        Ok(output) => RunOutcome::RuntimeFailure {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        },
        Err(SandboxError::Timeout(limit)) => RunOutcome::Timeout { limit },
        Err(e) => RunOutcome::SystemError {
            message: e.to_string(),
        },
    }
}

/// Spawn `cmd`, wait up to `limits.timeout`, and collect its output.
///
/// # Returns
/// `Ok(CapturedOutput)` if the process exited and its pipes closed in time (whatever
/// its status), `Err(SandboxError::Timeout)` if the deadline passed first, and
/// `Err(SandboxError::SystemError)` on spawn or wait failures.
pub fn run_captured(mut cmd: Command, limits: &RunLimits) -> Result<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd.spawn().map_err(|e| {
        SandboxError::SystemError(format!("Failed to start '{}': {}", program, e))
    })?;
    let deadline = Instant::now() + limits.timeout;
    debug!(pid = child.id(), program = %program, "interpreter started");

    // Drain both pipes in the background so a chatty child never blocks on a full pipe
    let stdout_reader = child
        .stdout
        .take()
        .map(|stream| spawn_reader(stream, limits.max_output_bytes));
    let stderr_reader = child
        .stderr
        .take()
        .map(|stream| spawn_reader(stream, limits.max_output_bytes));

    let status = match wait_then_kill_group(&mut child, limits.timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            // Readers are left detached: a descendant that escaped the group could
            // keep the pipes open forever.
            warn!(program = %program, timeout_ms = limits.timeout.as_millis() as u64, "execution timed out");
            return Err(SandboxError::Timeout(limits.timeout));
        }
        Err(e) => {
            kill_process_group(&mut child);
            let _ = child.wait();
            return Err(SandboxError::SystemError(format!(
                "Error waiting for process: {}",
                e
            )));
        }
    };

    // A descendant that left the group (setsid) still holds the pipes; it may not
    // stretch the run past the deadline.
    let deadline = deadline.max(Instant::now() + PIPE_GRACE);
    let stdout = collect_reader(stdout_reader, deadline);
    let stderr = collect_reader(stderr_reader, deadline);
    let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
        warn!(program = %program, "output pipes still open at the deadline");
        return Err(SandboxError::Timeout(limits.timeout));
    };

    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R, limit: usize) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = (&mut stream).take(limit as u64).read_to_end(&mut buf);

        // Keep draining past the limit so the child does not block on write.
        let overflow = std::io::copy(&mut stream, &mut std::io::sink()).unwrap_or(0);

        let mut text = String::from_utf8_lossy(&buf).into_owned();
        if overflow > 0 {
            text.push_str(TRUNCATION_MARKER);
        }
        let _ = tx.send(text);
    });
    rx
}

/// `None` if the stream is still open at `deadline`.
fn collect_reader(reader: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = reader else {
        return Some(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// Wait for the child, then kill its whole process group and reap the child.
///
/// Returns `None` if `timeout` elapsed first. The child stays unreaped until the group
/// is killed, so its pid (the group id) cannot be handed to another process meanwhile.
#[cfg(target_os = "linux")]
fn wait_then_kill_group(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    use nix::errno::Errno;
    use nix::sys::wait::{Id, WaitPidFlag, WaitStatus, waitid};
    use nix::unistd::Pid;

    let deadline = Instant::now() + timeout;
    let pid = Pid::from_raw(child.id() as i32);
    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT | WaitPidFlag::WNOHANG;

    loop {
        match waitid(Id::Pid(pid), flags) {
            Ok(WaitStatus::StillAlive) => {}
            Ok(_) => {
                kill_process_group(child);
                return child.wait().map(Some);
            }
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }

        let now = Instant::now();
        if now >= deadline {
            kill_process_group(child);
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
    }
}

// Without waitid(WNOWAIT) the child is reaped before the group kill.
#[cfg(not(target_os = "linux"))]
fn wait_then_kill_group(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    use wait_timeout::ChildExt;

    let status = child.wait_timeout(timeout)?;
    kill_process_group(child);
    if status.is_none() {
        child.wait()?;
    }
    Ok(status)
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // ESRCH only means the group is already empty
    let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}
