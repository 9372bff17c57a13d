//! Global configuration parsing and validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

fn default_http_port() -> u16 {
    2150
}

fn default_runtime_cmd() -> String {
    "node".into()
}

fn default_installer_cmd() -> String {
    "npm".into()
}

fn default_installer_args() -> Vec<String> {
    vec!["install".into()]
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Root directory under which session working directories live.
    pub sessions_root: PathBuf,
    /// TCP port for the WebSocket transport.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Command used to run a code cell's script (receives the filename).
    #[serde(default = "default_runtime_cmd")]
    pub runtime_cmd: String,
    /// Extra arguments passed to the runtime before the filename.
    #[serde(default)]
    pub runtime_args: Vec<String>,
    /// Command used to install session dependencies.
    #[serde(default = "default_installer_cmd")]
    pub installer_cmd: String,
    /// Arguments passed to the installer before any requested package names.
    #[serde(default = "default_installer_args")]
    pub installer_args: Vec<String>,
    /// Optional TOML file of `NAME = "value"` pairs injected into cell
    /// processes as environment variables.
    #[serde(default)]
    pub secrets_path: Option<PathBuf>,
}

impl GlobalConfig {
    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the TOML is malformed or a field
    /// fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse configuration from a file on disk.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.sessions_root.as_os_str().is_empty() {
            return Err(AppError::Config("sessions_root must not be empty".into()));
        }
        if self.runtime_cmd.trim().is_empty() {
            return Err(AppError::Config("runtime_cmd must not be empty".into()));
        }
        if self.installer_cmd.trim().is_empty() {
            return Err(AppError::Config("installer_cmd must not be empty".into()));
        }
        Ok(())
    }
}
