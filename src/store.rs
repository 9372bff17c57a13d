//! In-memory session store.
//!
//! Owns the live `Session` records keyed by id. The orchestrator reads
//! through [`SessionStore::find_session`] and mutates cell state through the
//! update methods here; [`SessionStore::begin_execution`] is the
//! compare-and-set guard that serializes overlapping execution commands on a
//! single cell.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{Cell, CellStatus, Session};
use crate::{AppError, Result};

/// On-disk filename of the session package manifest.
pub const MANIFEST_FILENAME: &str = "package.json";

/// Thread-safe in-memory store of open sessions.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` when a session with the same id is already
    /// open or when the session carries more than one manifest cell.
    pub async fn add_session(&self, session: Session) -> Result<()> {
        let manifest_count = session.cells.iter().filter(|c| c.is_manifest()).count();
        if manifest_count > 1 {
            return Err(AppError::Store(format!(
                "session {} declares {manifest_count} manifest cells, at most one is allowed",
                session.id
            )));
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(AppError::Store(format!(
                "session {} is already open",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Look up a session by id, returning a snapshot clone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when no session with that id is open.
    pub async fn find_session(&self, session_id: &str) -> Result<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
    }

    /// Replace a cell in place, returning the session's updated cell list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the session or cell is absent.
    pub async fn replace_cell(&self, session_id: &str, cell: Cell) -> Result<Vec<Cell>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;
        let slot = session
            .cells
            .iter_mut()
            .find(|c| c.id() == cell.id())
            .ok_or_else(|| AppError::NotFound(format!("cell {}", cell.id())))?;
        *slot = cell;
        session.updated_at = chrono::Utc::now();
        Ok(session.cells.clone())
    }

    /// Apply an arbitrary patch to a session under the write lock.
    ///
    /// `persist` requests that the manifest cell's source be written back to
    /// the session's on-disk manifest after the patch is applied.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the session is absent, or
    /// `AppError::Io` when persisting the manifest fails.
    pub async fn update_session<F>(&self, session_id: &str, patch: F, persist: bool) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let snapshot = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;
            patch(session);
            session.updated_at = chrono::Utc::now();
            session.clone()
        };

        if persist {
            if let Some(Cell::Manifest { source, .. }) = snapshot.manifest_cell() {
                let path = snapshot.dir.join(MANIFEST_FILENAME);
                tokio::fs::write(&path, source).await?;
            }
        }

        Ok(snapshot)
    }

    /// Atomically flip a cell from `idle` to `running`.
    ///
    /// This is the execution guard: a second exec or install command for a
    /// cell that is already `running` fails here and must produce no
    /// observable effect.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` — session or cell absent.
    /// - `AppError::Validation` — the cell is already running.
    pub async fn begin_execution(&self, session_id: &str, cell_id: &str) -> Result<Cell> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;
        let cell = session
            .cells
            .iter_mut()
            .find(|c| c.id() == cell_id)
            .ok_or_else(|| AppError::NotFound(format!("cell {cell_id}")))?;

        if cell.status() == CellStatus::Running {
            return Err(AppError::Validation(format!(
                "cell {cell_id} is already running"
            )));
        }

        cell.set_status(CellStatus::Running);
        session.updated_at = chrono::Utc::now();
        Ok(cell.clone())
    }

    /// Flip a cell back to `idle`, returning the updated cell.
    ///
    /// Absent sessions or cells are tolerated: the owning process may outlive
    /// the session record, in which case the exit handler has nothing to do.
    pub async fn finish_execution(&self, session_id: &str, cell_id: &str) -> Option<Cell> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        let cell = session.cells.iter_mut().find(|c| c.id() == cell_id)?;
        cell.set_status(CellStatus::Idle);
        session.updated_at = chrono::Utc::now();
        let snapshot = cell.clone();
        debug!(session_id, cell_id, "cell returned to idle");
        Some(snapshot)
    }

    /// Read the session's package manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when the manifest file cannot be read.
    pub async fn read_manifest_from_disk(&self, session: &Session) -> Result<String> {
        let path = session.dir.join(MANIFEST_FILENAME);
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}
