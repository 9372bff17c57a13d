//! Wire event types.
//!
//! Every inbound command and outbound notification is a serde-typed payload;
//! deserialization is the schema check (`deny_unknown_fields` on every
//! payload struct). Envelopes carry a `topic` (`session:<id>`), the `event`
//! name, and the event's `payload`.
//!
//! # Wire format
//!
//! ```json
//! {"topic":"session:abc","event":"cell:exec","payload":{"sessionId":"abc","cellId":"c1"}}
//! {"topic":"session:abc","event":"cell:output","payload":{"cellId":"c1","output":{"type":"stdout","data":"hi\n"}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::models::Cell;
use crate::{AppError, Result};

// ── Inbound command payloads ─────────────────────────────────────────────────

/// Payload for `cell:exec` and `cell:stop`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CellRefPayload {
    /// Owning session.
    pub session_id: String,
    /// Target cell.
    pub cell_id: String,
}

/// Payload for `cell:stdin`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CellStdinPayload {
    /// Owning session.
    pub session_id: String,
    /// Target cell.
    pub cell_id: String,
    /// Raw input text forwarded to the process.
    pub stdin: String,
}

/// Payload for `deps:install`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DepsInstallPayload {
    /// Owning session.
    pub session_id: String,
    /// Specific packages to install; `None` installs from the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,
}

/// Payload for `cell:validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CellValidatePayload {
    /// Owning session.
    pub session_id: String,
    /// Target cell.
    pub cell_id: String,
    /// Proposed filename to validate.
    pub filename: String,
}

/// Payload for `deps:validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DepsValidatePayload {
    /// Session whose dependencies should be checked.
    pub session_id: String,
}

/// Inbound command, discriminated by the `event` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "payload")]
pub enum Command {
    /// Run a code cell's script.
    #[serde(rename = "cell:exec")]
    CellExec(CellRefPayload),
    /// Stop a running code cell's process.
    #[serde(rename = "cell:stop")]
    CellStop(CellRefPayload),
    /// Forward input to a running cell process.
    #[serde(rename = "cell:stdin")]
    CellStdin(CellStdinPayload),
    /// Install session dependencies.
    #[serde(rename = "deps:install")]
    DepsInstall(DepsInstallPayload),
    /// Validate a proposed cell filename.
    #[serde(rename = "cell:validate")]
    CellValidate(CellValidatePayload),
    /// Run the dependency health checks.
    #[serde(rename = "deps:validate")]
    DepsValidate(DepsValidatePayload),
}

impl Command {
    /// The wire name of the command, for logging.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CellExec(_) => "cell:exec",
            Self::CellStop(_) => "cell:stop",
            Self::CellStdin(_) => "cell:stdin",
            Self::DepsInstall(_) => "deps:install",
            Self::CellValidate(_) => "cell:validate",
            Self::DepsValidate(_) => "deps:validate",
        }
    }

    /// The session the command targets.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::CellExec(p) | Self::CellStop(p) => &p.session_id,
            Self::CellStdin(p) => &p.session_id,
            Self::DepsInstall(p) => &p.session_id,
            Self::CellValidate(p) => &p.session_id,
            Self::DepsValidate(p) => &p.session_id,
        }
    }
}

// ── Outbound notification payloads ───────────────────────────────────────────

/// Which process stream a chunk came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// One chunk of process output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputChunk {
    /// Source stream.
    #[serde(rename = "type")]
    pub stream: OutputStream,
    /// Chunk contents, lossily decoded as UTF-8.
    pub data: String,
}

/// Payload for `cell:updated`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CellUpdatedPayload {
    /// The cell's new state.
    pub cell: Cell,
}

/// Payload for `cell:output`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CellOutputPayload {
    /// Producing cell.
    pub cell_id: String,
    /// The output chunk.
    pub output: OutputChunk,
}

/// Payload for `deps:validate:response`.
///
/// `packages: None` is the staleness signal ("please reinstall"); a present
/// list names packages imported by code but absent from the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DepsValidateResponsePayload {
    /// Undeclared package names, when the undeclared-usage check fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,
}

/// Payload for `cell:validate:response`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CellValidateResponsePayload {
    /// Cell the validation was requested for.
    pub cell_id: String,
    /// The filename that was checked.
    pub filename: String,
    /// Whether validation failed.
    pub error: bool,
    /// Failure description, present when `error` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outbound notification, discriminated by the `event` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "payload")]
pub enum Notification {
    /// A cell's state changed.
    #[serde(rename = "cell:updated")]
    CellUpdated(CellUpdatedPayload),
    /// A cell process produced output.
    #[serde(rename = "cell:output")]
    CellOutput(CellOutputPayload),
    /// Dependency health check result.
    #[serde(rename = "deps:validate:response")]
    DepsValidateResponse(DepsValidateResponsePayload),
    /// Filename validation result.
    #[serde(rename = "cell:validate:response")]
    CellValidateResponse(CellValidateResponsePayload),
}

// ── Envelopes ────────────────────────────────────────────────────────────────

/// Inbound wire envelope.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InboundEnvelope {
    /// Session-scoped topic, `session:<id>`.
    pub topic: String,
    /// The command carried by this envelope.
    #[serde(flatten)]
    pub command: Command,
}

/// Outbound wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundEnvelope {
    /// Session-scoped topic, `session:<id>`.
    pub topic: String,
    /// The notification carried by this envelope.
    #[serde(flatten)]
    pub notification: Notification,
}

/// Decode and schema-check one inbound frame.
///
/// The topic must agree with the payload's `sessionId`; a mismatch is a
/// malformed frame and is rejected like any other schema violation.
///
/// # Errors
///
/// Returns `AppError::Channel` for malformed JSON, unknown events, payloads
/// with missing or unknown fields, or a topic/payload session mismatch.
pub fn decode_inbound(frame: &str) -> Result<InboundEnvelope> {
    let envelope: InboundEnvelope = serde_json::from_str(frame)?;
    let expected = format!("session:{}", envelope.command.session_id());
    if envelope.topic != expected {
        return Err(AppError::Channel(format!(
            "topic {} does not match payload session {}",
            envelope.topic,
            envelope.command.session_id()
        )));
    }
    Ok(envelope)
}
