//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Session store lookup or mutation failure.
    Store(String),
    /// Event channel serialization or dispatch failure.
    Channel(String),
    /// Process spawn or stream-wiring failure.
    Exec(String),
    /// Dependency health check failure.
    Deps(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Command precondition violated (wrong cell kind, already running, bad filename).
    Validation(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Store(msg) => write!(f, "store: {msg}"),
            Self::Channel(msg) => write!(f, "channel: {msg}"),
            Self::Exec(msg) => write!(f, "exec: {msg}"),
            Self::Deps(msg) => write!(f, "deps: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Channel(format!("invalid payload: {err}"))
    }
}
