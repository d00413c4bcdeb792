use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("invalid response from provider: {0}")]
    InvalidResponse(&'static str),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("scripted provider error: {0}")]
    Scripted(String),
}

impl LLMError {
    /// HTTP status reported by the service, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            LLMError::RequestFailed { status, .. } => Some(*status),
            LLMError::Http(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Azure OpenAI {field} not configured (set {file_key} in appsettings.json or the {env_var} environment variable)")]
    MissingSetting {
        field: &'static str,
        file_key: &'static str,
        env_var: &'static str,
    },

    #[error("invalid value {value:?} for Azure OpenAI {field}: {reason}")]
    InvalidSetting {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Name of the setting at fault, when the error concerns a single setting.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingSetting { field, .. } | ConfigError::InvalidSetting { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }
}
