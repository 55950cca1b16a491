//! Subprocess lifecycle: spawn, bounded capture, timeout, cancellation.
//!
//! Every spawn is tracked in a process registry so shutdown can cancel
//! children in reverse-spawn order. The timeout path terminates gracefully
//! first, then force-kills after a grace window, and reports a
//! distinguished timeout result so callers never misread it as a plain
//! check failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::domain::ForemanResult;

/// Cap on captured bytes per stream; the head is kept, the rest dropped.
const CAPTURE_LIMIT: usize = 1024 * 1024;

/// Grace window between terminate and force-kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// A command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// None means no timeout (explicit opt-in).
    pub timeout: Option<Duration>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: None,
            stdin: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-style rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Completed subprocess result.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// None when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Tracks live children so shutdown can cancel them in reverse-spawn order.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    next_seq: AtomicU64,
    live: Mutex<HashMap<u64, u32>>,
}

impl ProcessRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn register(&self, pid: Option<u32>) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        if let Some(pid) = pid {
            self.live.lock().expect("registry poisoned").insert(seq, pid);
        }
        seq
    }

    fn unregister(&self, seq: u64) {
        self.live.lock().expect("registry poisoned").remove(&seq);
    }

    /// Terminate every live child, newest first.
    pub fn cancel_all(&self) {
        let mut entries: Vec<(u64, u32)> = {
            let live = self.live.lock().expect("registry poisoned");
            live.iter().map(|(seq, pid)| (*seq, *pid)).collect()
        };
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        for (seq, pid) in entries {
            tracing::debug!(pid, seq, "cancelling tracked subprocess");
            terminate_pid(pid);
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().expect("registry poisoned").len()
    }
}

/// Run a command to completion under the registry.
pub async fn run(registry: &ProcessRegistry, spec: &CommandSpec) -> ForemanResult<CommandOutput> {
    let started = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref cwd) = spec.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;
    let seq = registry.register(child.id());

    if let (Some(input), Some(mut stdin)) = (spec.stdin.clone(), child.stdin.take()) {
        // Write-then-close; a child that never reads stdin must not wedge us.
        tokio::spawn(async move {
            let _ = stdin.write_all(input.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
    }

    let result = match spec.timeout {
        Some(limit) => match tokio::time::timeout(limit, wait_with_capture(&mut child)).await {
            Ok(done) => done.map(|(code, stdout, stderr)| CommandOutput {
                exit_code: code,
                stdout,
                stderr,
                timed_out: false,
                duration: started.elapsed(),
            }),
            Err(_) => {
                tracing::warn!(
                    command = %spec.display(),
                    timeout_secs = limit.as_secs(),
                    "subprocess timed out, terminating"
                );
                let (stdout, stderr) = terminate_child(&mut child).await;
                Ok(CommandOutput {
                    exit_code: None,
                    stdout,
                    stderr,
                    timed_out: true,
                    duration: started.elapsed(),
                })
            }
        },
        None => wait_with_capture(&mut child)
            .await
            .map(|(code, stdout, stderr)| CommandOutput {
                exit_code: code,
                stdout,
                stderr,
                timed_out: false,
                duration: started.elapsed(),
            }),
    };

    registry.unregister(seq);
    result.map_err(Into::into)
}

async fn wait_with_capture(
    child: &mut Child,
) -> std::io::Result<(Option<i32>, String, String)> {
    use tokio::io::AsyncReadExt;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stderr_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = child.wait().await?;
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok((
        status.code(),
        truncate_capture(&stdout),
        truncate_capture(&stderr),
    ))
}

/// Graceful terminate, grace window, then force-kill. Pending pipe reads
/// drain whatever output is available.
async fn terminate_child(child: &mut Child) -> (String, String) {
    if let Some(pid) = child.id() {
        terminate_pid(pid);
    }

    let graceful = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    if graceful.is_err() {
        let _ = child.kill().await;
    }

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    use tokio::io::AsyncReadExt;
    if let Some(ref mut pipe) = child.stdout {
        let _ = tokio::time::timeout(Duration::from_millis(250), pipe.read_to_end(&mut stdout)).await;
    }
    if let Some(ref mut pipe) = child.stderr {
        let _ = tokio::time::timeout(Duration::from_millis(250), pipe.read_to_end(&mut stderr)).await;
    }

    (truncate_capture(&stdout), truncate_capture(&stderr))
}

#[cfg(unix)]
fn terminate_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    #[allow(clippy::cast_possible_wrap)]
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate_pid(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/T", "/PID", &pid.to_string()])
        .output();
}

fn truncate_capture(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= CAPTURE_LIMIT {
        text.into_owned()
    } else {
        let mut end = CAPTURE_LIMIT;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\n[... output truncated]", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let registry = ProcessRegistry::new();
        let spec = CommandSpec::new("echo").args(["hello"]);
        let out = run(&registry, &spec).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let registry = ProcessRegistry::new();
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]);
        let out = run(&registry, &spec).await.unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn stdin_delivery() {
        let registry = ProcessRegistry::new();
        let spec = CommandSpec::new("cat").stdin("piped prompt");
        let out = run(&registry, &spec).await.unwrap();
        assert_eq!(out.stdout, "piped prompt");
    }

    #[tokio::test]
    async fn timeout_is_distinguished_from_failure() {
        let registry = ProcessRegistry::new();
        let spec = CommandSpec::new("sleep")
            .args(["30"])
            .timeout(Duration::from_millis(100));
        let out = run(&registry, &spec).await.unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
        assert!(out.duration < Duration::from_secs(20));
    }

    #[tokio::test]
    async fn env_overlay_reaches_child() {
        let registry = ProcessRegistry::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$CI\""])
            .env("CI", "true");
        let out = run(&registry, &spec).await.unwrap();
        assert_eq!(out.stdout, "true");
    }

    #[test]
    fn capture_truncation_appends_marker() {
        let big = vec![b'a'; CAPTURE_LIMIT + 10];
        let text = truncate_capture(&big);
        assert!(text.ends_with("[... output truncated]"));
    }

    #[test]
    fn spec_display_joins_program_and_args() {
        let spec = CommandSpec::new("cargo").args(["test", "--workspace"]);
        assert_eq!(spec.display(), "cargo test --workspace");
    }
}
