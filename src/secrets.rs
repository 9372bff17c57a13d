//! Session secrets provider.
//!
//! Loads a flat TOML file of `NAME = "value"` pairs once at startup. The
//! resulting map is injected verbatim into every spawned cell process as
//! environment variables.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::{AppError, Result};

/// Provider of environment variables for spawned cell processes.
#[derive(Debug, Default, Clone)]
pub struct SecretsProvider {
    values: HashMap<String, String>,
}

impl SecretsProvider {
    /// An empty provider (no secrets configured).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load secrets from a flat TOML file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the file cannot be read, is not valid
    /// TOML, or contains a non-string value.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read secrets file: {err}")))?;
        let table: toml::Table = toml::from_str(&text)?;

        let mut values = HashMap::new();
        for (key, value) in table {
            match value {
                toml::Value::String(s) => {
                    values.insert(key, s);
                }
                other => {
                    return Err(AppError::Config(format!(
                        "secret {key} must be a string, got {}",
                        other.type_str()
                    )));
                }
            }
        }

        info!(count = values.len(), "session secrets loaded");
        Ok(Self { values })
    }

    /// The environment variable mapping, used verbatim for spawned processes.
    #[must_use]
    pub fn get_secrets(&self) -> &HashMap<String, String> {
        &self.values
    }
}
