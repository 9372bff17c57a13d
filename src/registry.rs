//! Process registry — at most one live OS process per (session, cell).
//!
//! Entries are recorded by the orchestrator immediately after a successful
//! spawn and removed only when the owning process signals exit, so registry
//! state reflects actual OS process existence rather than requested state. A
//! `terminate` in between leaves the entry in place until the exit
//! notification arrives.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to one registered cell process.
#[derive(Debug)]
pub struct ProcessHandle {
    /// OS process id, when the spawn reported one.
    pub pid: Option<u32>,
    /// The process's stdin pipe, shared so writes happen outside the
    /// registry lock.
    pub stdin: Arc<Mutex<ChildStdin>>,
    /// Kill signal observed by the process's exit monitor.
    pub kill: CancellationToken,
}

impl ProcessHandle {
    /// Wrap a freshly captured stdin pipe into a registrable handle.
    #[must_use]
    pub fn new(pid: Option<u32>, stdin: ChildStdin, kill: CancellationToken) -> Self {
        Self {
            pid,
            stdin: Arc::new(Mutex::new(stdin)),
            kill,
        }
    }
}

/// In-memory map of live cell processes keyed by `(session_id, cell_id)`.
#[derive(Debug, Default, Clone)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<HashMap<(String, String), ProcessHandle>>>,
}

impl ProcessRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handle` as the sole live process for the key.
    ///
    /// The caller is responsible for never registering over a live entry;
    /// the execution guard upstream serializes commands per cell. A stale
    /// entry found here is replaced with a warning.
    pub async fn register(&self, session_id: &str, cell_id: &str, handle: ProcessHandle) {
        let mut map = self.inner.lock().await;
        let key = (session_id.to_owned(), cell_id.to_owned());
        if map.insert(key, handle).is_some() {
            warn!(session_id, cell_id, "replaced live registry entry");
        }
    }

    /// Request termination of the registered process.
    ///
    /// Returns whether a live process was found and a termination signal
    /// delivered. The entry stays registered; removal happens when the
    /// process's own exit notification arrives.
    pub async fn terminate(&self, session_id: &str, cell_id: &str) -> bool {
        let map = self.inner.lock().await;
        let key = (session_id.to_owned(), cell_id.to_owned());
        let Some(handle) = map.get(&key) else {
            debug!(session_id, cell_id, "terminate: no registered process");
            return false;
        };

        // Ask nicely first; the kill token hard-kills if the process ignores it.
        if let Some(pid) = handle.pid {
            send_sigterm(session_id, cell_id, pid);
        }
        handle.kill.cancel();
        true
    }

    /// Forward raw bytes to the registered process's stdin.
    ///
    /// A missing entry is a logged no-op: input aimed at a process that has
    /// already exited is not an error worth surfacing.
    ///
    /// The write happens on the per-process stdin lock, after the registry
    /// lock is released: a process that stops reading its stdin can stall
    /// this writer, but never commands aimed at other `(session, cell)` keys.
    pub async fn forward_input(&self, session_id: &str, cell_id: &str, data: &[u8]) {
        let stdin = {
            let map = self.inner.lock().await;
            let key = (session_id.to_owned(), cell_id.to_owned());
            match map.get(&key) {
                Some(handle) => Arc::clone(&handle.stdin),
                None => {
                    debug!(session_id, cell_id, "stdin for unregistered process dropped");
                    return;
                }
            }
        };

        if let Err(err) = stdin.lock().await.write_all(data).await {
            warn!(session_id, cell_id, %err, "failed to forward stdin");
        };
    }

    /// Remove the entry for an exited process.
    ///
    /// Absent keys are tolerated: the process may have exited before
    /// registration completed, and exit cleanup must be a no-op then.
    pub async fn remove(&self, session_id: &str, cell_id: &str) -> Option<ProcessHandle> {
        let mut map = self.inner.lock().await;
        let removed = map.remove(&(session_id.to_owned(), cell_id.to_owned()));
        if removed.is_none() {
            debug!(session_id, cell_id, "exit cleanup for unregistered process");
        }
        removed
    }

    /// Number of live entries, for diagnostics.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no process is currently registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(unix)]
fn send_sigterm(session_id: &str, cell_id: &str, pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) => {
            if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                warn!(session_id, cell_id, pid, %err, "SIGTERM delivery failed");
            }
        }
        Err(_) => warn!(session_id, cell_id, pid, "pid out of range for SIGTERM"),
    }
}

#[cfg(not(unix))]
fn send_sigterm(_session_id: &str, _cell_id: &str, _pid: u32) {}
