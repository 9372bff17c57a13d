//! Cell process launcher.
//!
//! Spawns one OS process per accepted execution command with:
//! - `kill_on_drop(true)` so processes are cleaned up automatically.
//! - `env_clear()` + a safe variable allowlist, then the session's secrets
//!   injected verbatim, so nothing else from the server's environment leaks
//!   into the child.
//! - Piped stdio: stdout and stderr are pumped chunk-by-chunk into an event
//!   channel, followed by exactly one [`ProcessEvent::Exit`] once the process
//!   is gone and both pumps have drained.

use std::collections::HashMap;
use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Environment variables inherited by spawned cell processes.
///
/// Everything else is stripped via `env_clear()` before launch; session
/// secrets are then injected on top.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Read buffer size for the stdout/stderr pumps.
const CHUNK_CAPACITY: usize = 8 * 1024;

/// Depth of the per-process event queue; pumps apply backpressure beyond it.
const EVENT_QUEUE_DEPTH: usize = 64;

/// What to launch and where.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Program to execute.
    pub program: String,
    /// Full argument list.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub cwd: PathBuf,
    /// Extra environment injected after the allowlist.
    pub env: HashMap<String, String>,
}

/// Stream and lifecycle events emitted by a launched process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of standard output.
    Stdout(Bytes),
    /// A chunk of standard error.
    Stderr(Bytes),
    /// The process exited; emitted exactly once, after the last output chunk.
    Exit {
        /// Exit code, absent when the process was terminated by a signal.
        code: Option<i32>,
    },
}

/// Handle to a freshly launched process.
#[derive(Debug)]
pub struct LaunchedProcess {
    /// OS process id; `None` means the child died before one was observed.
    pub pid: Option<u32>,
    /// The child's stdin pipe.
    pub stdin: ChildStdin,
    /// Cancelling this token hard-kills the process.
    pub kill: CancellationToken,
    /// Ordered stream of output chunks ending in one `Exit` event.
    pub events: mpsc::Receiver<ProcessEvent>,
}

/// Launch a process per `spec`, wiring its streams into an event queue.
///
/// The pumps and the exit monitor start immediately; events accumulate in
/// the queue (bounded, with backpressure) until the caller consumes
/// [`LaunchedProcess::events`]. This lets the caller register the handle
/// before the first event can be observed.
///
/// # Errors
///
/// Returns `AppError::Exec` when the OS spawn fails or a stdio pipe cannot
/// be captured.
pub fn launch(spec: &LaunchSpec) -> Result<LaunchedProcess> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);

    // Strip inherited environment, inject the allowlist, then the secrets.
    cmd.env_clear();
    for &key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    cmd.envs(&spec.env);

    cmd.current_dir(&spec.cwd)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Exec(format!("failed to spawn {}: {err}", spec.program)))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Exec("failed to capture child stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Exec("failed to capture child stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Exec("failed to capture child stderr".into()))?;

    let pid = child.id();
    info!(program = %spec.program, pid, "cell process spawned");

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let kill = CancellationToken::new();

    let out_pump = pump_stream(stdout, tx.clone(), ProcessEvent::Stdout);
    let err_pump = pump_stream(stderr, tx.clone(), ProcessEvent::Stderr);

    let kill_watch = kill.clone();
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status.ok(),
            () = kill_watch.cancelled() => {
                child.kill().await.ok();
                child.wait().await.ok()
            }
        };

        // Drain both pumps so Exit is the final event.
        let _ = out_pump.await;
        let _ = err_pump.await;

        let code = status.and_then(|s| s.code());
        debug!(?code, "cell process exited");
        if tx.send(ProcessEvent::Exit { code }).await.is_err() {
            debug!("process event queue dropped before exit delivery");
        }
    });

    Ok(LaunchedProcess {
        pid,
        stdin,
        kill,
        events: rx,
    })
}

/// Pump one output stream into the event queue chunk by chunk.
fn pump_stream<R>(
    mut stream: R,
    tx: mpsc::Sender<ProcessEvent>,
    wrap: fn(Bytes) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(CHUNK_CAPACITY);
        loop {
            match stream.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let chunk = buf.split().freeze();
                    if tx.send(wrap(chunk)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(%err, "cell process stream closed with error");
                    break;
                }
            }
        }
    })
}
