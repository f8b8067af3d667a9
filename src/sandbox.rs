//! Execution Sandbox
//!
//! Runs one skill's command as an isolated child process:
//!
//! - own process group, so a timeout kill reaches forked grandchildren
//! - optional privilege drop to an unprivileged account when the host
//!   itself runs as root
//! - environment restricted to `PATH` plus a mode flag
//! - stdout/stderr capture bounded by a hard byte ceiling
//! - hard timeout delivered as `SIGKILL` to the whole group, with a
//!   direct-child fallback when group kill is not permitted
//!
//! The skill protocol is fixed: exactly one JSON document is written to
//! the child's stdin and the stream is closed; the child writes one JSON
//! document to stdout and exits 0 on success.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::manifest::RunCommand;

/// Grace period for pipe readers to drain after the child exits. A
/// surviving grandchild can hold the write end open after a best-effort
/// kill, so reads are never awaited unboundedly.
const IO_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK_SIZE: usize = 8192;

/// Privilege drop policy applied when the host runs as root: the child is
/// started under `account`, falling back to the numeric ids when the
/// account cannot be resolved.
#[derive(Debug, Clone)]
pub struct PrivilegeDrop {
    pub account: String,
    pub fallback_uid: u32,
    pub fallback_gid: u32,
}

impl Default for PrivilegeDrop {
    fn default() -> Self {
        Self {
            account: "nobody".to_string(),
            fallback_uid: 65534,
            fallback_gid: 65534,
        }
    }
}

impl PrivilegeDrop {
    /// Resolve the target uid/gid, preferring the named account.
    #[cfg(unix)]
    fn resolve(&self) -> (u32, u32) {
        if let Ok(name) = std::ffi::CString::new(self.account.as_str()) {
            let pw = unsafe { libc::getpwnam(name.as_ptr()) };
            if !pw.is_null() {
                let pw = unsafe { &*pw };
                return (pw.pw_uid, pw.pw_gid);
            }
        }
        warn!(
            account = %self.account,
            uid = self.fallback_uid,
            "sandbox account not resolvable; using numeric fallback"
        );
        (self.fallback_uid, self.fallback_gid)
    }
}

/// Sandbox configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Hard ceiling on captured bytes per stream
    pub max_output_bytes: usize,
    /// Value of the `SKILLBOX_ENV` variable passed to skills
    pub env_mode: String,
    /// Privilege drop policy; `None` never drops
    pub privilege_drop: Option<PrivilegeDrop>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: 256 * 1024 * 1024,
            env_mode: "production".to_string(),
            privilege_drop: Some(PrivilegeDrop::default()),
        }
    }
}

/// Raw outcome of one sandboxed execution. The registry folds this into
/// the normalized `ExecutionResult`.
#[derive(Debug, Clone)]
pub struct SandboxResult {
    /// -1 when the process was killed or died to a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// A capture stream hit the byte ceiling
    pub truncated: bool,
    pub timed_out: bool,
    /// False when only the direct child could be killed (best-effort
    /// cancellation; descendants may survive)
    pub group_killed: bool,
    pub duration: Duration,
}

/// Skill sandbox executor.
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Run `command` in `dir`, feed `input` on stdin, and wait for exit
    /// or the timeout. Errors only when the process cannot be spawned.
    pub async fn execute(
        &self,
        command: &RunCommand,
        dir: &Path,
        input: &[u8],
        timeout: Duration,
    ) -> io::Result<SandboxResult> {
        let start = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("SKILLBOX_ENV", &self.config.env_mode)
            .kill_on_drop(true);

        self.isolate(&mut cmd);

        let mut child = cmd.spawn()?;
        debug!(program = %command.program, pid = ?child.id(), "spawned skill process");

        feed_stdin(&mut child, input.to_vec());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout pipe not available"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr pipe not available"))?;

        let cap = self.config.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(stdout, cap));
        let stderr_task = tokio::spawn(read_capped(stderr, cap));

        let (status, timed_out, group_killed) = tokio::select! {
            status = child.wait() => (Some(status?), false, true),
            _ = tokio::time::sleep(timeout) => {
                let group_killed = kill_process_group(&mut child);
                warn!(
                    program = %command.program,
                    timeout_secs = timeout.as_secs_f64(),
                    group_killed,
                    "skill timed out; killed"
                );
                let _ = child.wait().await;
                (None, true, group_killed)
            }
        };

        let ((stdout_buf, stdout_trunc), (stderr_buf, stderr_trunc)) =
            futures_util::future::join(drain(stdout_task), drain(stderr_task)).await;

        let exit_code = status.as_ref().and_then(|s| s.code()).unwrap_or(-1);
        let success = status.map(|s| s.success()).unwrap_or(false) && !timed_out;

        Ok(SandboxResult {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout_buf).to_string(),
            stderr: String::from_utf8_lossy(&stderr_buf).to_string(),
            success,
            truncated: stdout_trunc || stderr_trunc,
            timed_out,
            group_killed,
            duration: start.elapsed(),
        })
    }

    /// Place the child in its own process group and arrange the privilege
    /// drop. uid/gid are resolved in the parent; only async-signal-safe
    /// calls happen after fork.
    #[cfg(unix)]
    fn isolate(&self, cmd: &mut Command) {
        let drop_ids = match &self.config.privilege_drop {
            Some(policy) if unsafe { libc::geteuid() } == 0 => Some(policy.resolve()),
            _ => None,
        };

        unsafe {
            cmd.pre_exec(move || {
                if libc::setpgid(0, 0) != 0 {
                    return Err(io::Error::last_os_error());
                }
                if let Some((uid, gid)) = drop_ids {
                    if libc::setgid(gid) != 0 {
                        return Err(io::Error::last_os_error());
                    }
                    if libc::setuid(uid) != 0 {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }
    }

    #[cfg(not(unix))]
    fn isolate(&self, _cmd: &mut Command) {}
}

/// Write the input document and close the stream in the background; a
/// skill that exits without reading stdin must not wedge the executor.
fn feed_stdin(child: &mut Child, payload: Vec<u8>) {
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        });
    }
}

/// Read a stream to EOF, buffering at most `cap` bytes. Bytes past the
/// cap are discarded rather than left unread, so a runaway child is
/// drained instead of blocking on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut truncated = false;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let take = n.min(cap.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..take]);
        if take < n {
            truncated = true;
        }
    }

    Ok((buf, truncated))
}

/// Await a capture task, giving up after the drain grace period.
async fn drain(mut handle: JoinHandle<io::Result<(Vec<u8>, bool)>>) -> (Vec<u8>, bool) {
    match tokio::time::timeout(IO_DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(Ok(captured))) => captured,
        Ok(_) => (Vec::new(), false),
        Err(_) => {
            handle.abort();
            (Vec::new(), false)
        }
    }
}

/// SIGKILL the child's whole process group; fall back to the direct
/// child when group kill is not permitted. Returns whether the group
/// kill took effect.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> bool {
    if let Some(pid) = child.id() {
        let pid = pid as libc::pid_t;
        let pgid = unsafe { libc::getpgid(pid) };
        if pgid != -1 && unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            return true;
        }
    }
    let _ = child.start_kill();
    false
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> bool {
    let _ = child.start_kill();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_sandbox(max_output_bytes: usize) -> Sandbox {
        Sandbox::new(SandboxConfig {
            max_output_bytes,
            env_mode: "test".to_string(),
            privilege_drop: None,
        })
    }

    fn sh(script: &str) -> RunCommand {
        RunCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_success_captures_stdout() {
        let tmp = TempDir::new().unwrap();
        let result = test_sandbox(1024)
            .execute(
                &sh("cat > /dev/null; printf '{\"ok\":true}'"),
                tmp.path(),
                b"{}",
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "{\"ok\":true}");
        assert!(!result.timed_out);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let tmp = TempDir::new().unwrap();
        let result = test_sandbox(1024)
            .execute(
                &sh("echo boom >&2; exit 3"),
                tmp.path(),
                b"{}",
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr.trim(), "boom");
    }

    #[tokio::test]
    async fn test_timeout_kills_within_bound() {
        let tmp = TempDir::new().unwrap();
        let start = Instant::now();
        let result = test_sandbox(1024)
            .execute(&sh("sleep 5"), tmp.path(), b"{}", Duration::from_secs(1))
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        // 1s timeout plus scheduling slack, nowhere near the 5s sleep
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_timeout_reaches_grandchildren() {
        let tmp = TempDir::new().unwrap();
        // The child forks a backgrounded sleeper and exits the foreground
        // wait only when the sleeper does; the group kill must end both.
        let start = Instant::now();
        let result = test_sandbox(1024)
            .execute(
                &sh("sleep 30 & wait"),
                tmp.path(),
                b"{}",
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(result.group_killed);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_output_cap_truncates_but_drains() {
        let tmp = TempDir::new().unwrap();
        let result = test_sandbox(1024)
            .execute(
                &sh("i=0; while [ $i -lt 1000 ]; do printf 'xxxxxxxxxx'; i=$((i+1)); done"),
                tmp.path(),
                b"{}",
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.truncated);
        assert_eq!(result.stdout.len(), 1024);
    }

    #[tokio::test]
    async fn test_environment_is_restricted() {
        let tmp = TempDir::new().unwrap();
        let result = test_sandbox(1024)
            .execute(
                &sh("printf '%s|%s' \"$HOME\" \"$SKILLBOX_ENV\""),
                tmp.path(),
                b"{}",
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        // HOME is not inherited; the mode flag is set
        assert_eq!(result.stdout, "|test");
    }

    #[tokio::test]
    async fn test_spawn_error_surfaces() {
        let tmp = TempDir::new().unwrap();
        let err = test_sandbox(1024)
            .execute(
                &RunCommand {
                    program: "definitely-not-a-real-binary".to_string(),
                    args: vec![],
                },
                tmp.path(),
                b"{}",
                Duration::from_secs(5),
            )
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_stdin_delivered_and_closed() {
        let tmp = TempDir::new().unwrap();
        let result = test_sandbox(1024)
            .execute(&sh("cat"), tmp.path(), b"{\"x\":1}", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.stdout, "{\"x\":1}");
    }
}
