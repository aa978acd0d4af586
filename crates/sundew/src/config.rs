use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("directive prefix must not be empty")]
    EmptyPrefix,
}

/// Settings for one binding session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Attribute prefix that marks directives, e.g. `sd-` for `sd-if`.
    pub prefix: String,
    /// Update loop period in milliseconds.
    pub interval_ms: u64,
    /// Start with the update loop paused.
    pub start_paused: bool,
    /// Diagnostics kept on the registrar; later ones are only logged.
    pub max_diagnostics: usize,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            prefix: "sd-".to_owned(),
            interval_ms: 100,
            start_paused: false,
            max_diagnostics: 256,
        }
    }
}

impl BindConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BindConfig = serde_json::from_str(json)?;
        if config.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(config)
    }
}
