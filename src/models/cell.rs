//! Cell model: one unit of executable code or package manifest in a session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution status for a cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    /// No process is running for this cell.
    Idle,
    /// An execution or install command has been accepted for this cell.
    Running,
}

/// One cell of a notebook session, discriminated by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cell {
    /// Executable script cell backed by a file in the session directory.
    Code {
        /// Unique cell identifier.
        id: String,
        /// Script filename relative to the session directory.
        filename: String,
        /// Current script source text.
        source: String,
        /// Execution status.
        status: CellStatus,
    },
    /// The session's single package manifest cell.
    Manifest {
        /// Unique cell identifier.
        id: String,
        /// Manifest source text, mirroring the on-disk manifest file.
        source: String,
        /// Install status.
        status: CellStatus,
    },
    /// Prose cell; never executed.
    Markdown {
        /// Unique cell identifier.
        id: String,
        /// Markdown text.
        text: String,
    },
}

impl Cell {
    /// Construct a new idle code cell.
    #[must_use]
    pub fn new_code(filename: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Code {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            source: source.into(),
            status: CellStatus::Idle,
        }
    }

    /// Construct a new idle manifest cell.
    #[must_use]
    pub fn new_manifest(source: impl Into<String>) -> Self {
        Self::Manifest {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            status: CellStatus::Idle,
        }
    }

    /// Construct a new markdown cell.
    #[must_use]
    pub fn new_markdown(text: impl Into<String>) -> Self {
        Self::Markdown {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    /// The cell's unique identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Code { id, .. } | Self::Manifest { id, .. } | Self::Markdown { id, .. } => id,
        }
    }

    /// Current execution status; markdown cells are always idle.
    #[must_use]
    pub fn status(&self) -> CellStatus {
        match self {
            Self::Code { status, .. } | Self::Manifest { status, .. } => *status,
            Self::Markdown { .. } => CellStatus::Idle,
        }
    }

    /// Set the execution status; no-op for markdown cells.
    pub fn set_status(&mut self, next: CellStatus) {
        match self {
            Self::Code { status, .. } | Self::Manifest { status, .. } => *status = next,
            Self::Markdown { .. } => {}
        }
    }

    /// Whether this is a code cell.
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code { .. })
    }

    /// Whether this is the manifest cell.
    #[must_use]
    pub fn is_manifest(&self) -> bool {
        matches!(self, Self::Manifest { .. })
    }
}
