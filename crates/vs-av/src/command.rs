//! Builder for executing external tool commands with timeout support.
//!
//! Every invocation has a wall-clock budget. When it expires the child is
//! asked to stop (SIGTERM on unix), given a short grace period, and then
//! killed. Timeouts surface as [`vs_core::Error::ToolTimeout`], distinct from
//! the [`vs_core::Error::Tool`] returned for a non-zero exit.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time a terminated child gets before it is killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Number of trailing stderr lines attached to failure messages.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use vs_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> vs_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("quiet")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("-show_streams")
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    kill_grace: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Set how long a terminated process may take to exit before it is
    /// killed.
    pub fn kill_grace(&mut self, d: Duration) -> &mut Self {
        self.kill_grace = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn spawn(&self, program_name: &str) -> vs_core::Result<Child> {
        tracing::debug!("exec: {} {}", self.program.display(), self.args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|e| vs_core::Error::tool(program_name, format!("failed to spawn: {e}")))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`vs_core::Error::ToolTimeout`] if the process outlives the timeout.
    /// - [`vs_core::Error::Tool`] if the process exits with a non-zero status
    ///   (message includes the tail of stderr) or cannot be spawned.
    pub async fn execute(&self) -> vs_core::Result<ToolOutput> {
        let program_name = self.program_name();
        let mut child = self.spawn(&program_name)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;

        match waited {
            Ok(Ok(status)) => {
                let output = ToolOutput {
                    status,
                    stdout: collect(stdout).await,
                    stderr: collect(stderr).await,
                };
                check_status(&program_name, output)
            }
            Ok(Err(e)) => Err(vs_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => {
                terminate(&mut child, self.kill_grace).await;
                Err(vs_core::Error::ToolTimeout {
                    tool: program_name,
                    after: self.timeout,
                })
            }
        }
    }

    /// Execute the command, handing each stderr line to `on_line` as it
    /// arrives.
    ///
    /// Used with ffmpeg's `-progress pipe:2` to follow an encode. Error
    /// semantics match [`execute`](Self::execute).
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
    ) -> vs_core::Result<ToolOutput> {
        let program_name = self.program_name();
        let mut child = self.spawn(&program_name)?;

        let stdout = drain(child.stdout.take());
        let stderr = child.stderr.take();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

        let run = async {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Some(line) = lines.next_line().await? {
                    on_line(&line);
                    if tail.len() == DIAGNOSTIC_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            child.wait().await
        };

        let waited = tokio::time::timeout(self.timeout, run).await;

        match waited {
            Ok(Ok(status)) => {
                let output = ToolOutput {
                    status,
                    stdout: collect(stdout).await,
                    stderr: Vec::from(tail).join("\n"),
                };
                check_status(&program_name, output)
            }
            Ok(Err(e)) => Err(vs_core::Error::tool(
                program_name,
                format!("I/O error reading process output: {e}"),
            )),
            Err(_elapsed) => {
                terminate(&mut child, self.kill_grace).await;
                Err(vs_core::Error::ToolTimeout {
                    tool: program_name,
                    after: self.timeout,
                })
            }
        }
    }
}

/// Ask a child to exit, then kill it if it has not done so within `grace`.
///
/// On unix the polite request is SIGTERM, which ffmpeg handles by finishing
/// the current packet and closing its outputs. Elsewhere the child is killed
/// straight away.
pub async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match i32::try_from(pid) {
            Ok(raw) => {
                if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                    tracing::debug!("SIGTERM to pid {pid} failed: {e}");
                }
                if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                    return;
                }
                tracing::warn!("pid {pid} ignored SIGTERM for {grace:?}; killing");
            }
            Err(_) => tracing::warn!("pid {pid} out of range; killing"),
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        tracing::debug!("kill failed (process likely exited): {e}");
    }
}

/// The last `n` lines of `text`, for attaching to error messages.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

fn check_status(program_name: &str, output: ToolOutput) -> vs_core::Result<ToolOutput> {
    if output.status.success() {
        return Ok(output);
    }
    Err(vs_core::Error::tool(
        program_name,
        format!(
            "exited with status {}: {}",
            output.status,
            tail_lines(&output.stderr, DIAGNOSTIC_TAIL_LINES)
        ),
    ))
}

fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                tracing::debug!("pipe read ended early: {e}");
            }
            buf
        })
    })
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    match handle {
        Some(handle) => handle
            .await
            .map(|buf| String::from_utf8_lossy(&buf).to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn execute_echo() {
        // `echo` should be universally available.
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert!(matches!(result, Err(vs_core::Error::Tool { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo 'Invalid data found' >&2; exit 3"])
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Invalid data found"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_fires_and_kills() {
        let started = Instant::now();
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .kill_grace(Duration::from_millis(100))
            .execute()
            .await;
        assert!(matches!(result, Err(vs_core::Error::ToolTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_ignoring_child_is_killed() {
        let started = Instant::now();
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "trap '' TERM; sleep 10"])
            .timeout(Duration::from_millis(200))
            .kill_grace(Duration::from_millis(200))
            .execute()
            .await;
        assert!(result.unwrap_err().is_timeout());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_callback_sees_every_line() {
        let mut seen = Vec::new();
        let output = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo out_time_us=1000 >&2; echo progress=end >&2"])
            .execute_with_stderr_callback(|line| seen.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["out_time_us=1000", "progress=end"]);
        assert!(output.stderr.contains("progress=end"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_callback_timeout() {
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo started >&2; sleep 10"])
            .timeout(Duration::from_millis(200))
            .kill_grace(Duration::from_millis(100))
            .execute_with_stderr_callback(|_| {})
            .await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[test]
    fn tail_lines_keeps_last() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("a", 5), "a");
        assert_eq!(tail_lines("", 5), "");
    }
}
