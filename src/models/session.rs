//! Session model: a working directory plus an ordered collection of cells.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::cell::Cell;

/// A collaborative notebook session shared by one or more connected clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// Working directory for cell processes and the package manifest.
    pub dir: PathBuf,
    /// Ordered cells making up the notebook.
    pub cells: Vec<Cell>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a new session rooted at `dir` with a generated identifier.
    #[must_use]
    pub fn new(dir: PathBuf, cells: Vec<Cell>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            dir,
            cells,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a cell by identifier.
    #[must_use]
    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id() == cell_id)
    }

    /// The session's manifest cell, if one exists.
    #[must_use]
    pub fn manifest_cell(&self) -> Option<&Cell> {
        self.cells.iter().find(|c| c.is_manifest())
    }

    /// Topic string for this session on the event channel.
    #[must_use]
    pub fn topic(&self) -> String {
        format!("session:{}", self.id)
    }
}
