//! Layered settings resolution.
//!
//! Settings are looked up in an ordered list of [`ConfigLayer`]s. Each key is
//! resolved on its own: the first layer holding a non-empty value wins.
//! [`SettingsLoader::standard`] builds the usual chain of process environment,
//! `appsettings.<Environment>.json`, then `appsettings.json`.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde_json::Value;

use crate::{
    error::ConfigError,
    providers::azure_openai::{DEFAULT_API_VERSION, DEFAULT_REQUEST_TIMEOUT},
};

pub const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-ada-002";
pub const BASE_FILE_NAME: &str = "appsettings.json";

/// A setting addressed by its configuration-file path and its environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingKey {
    pub field: &'static str,
    pub file_key: &'static str,
    pub env_var: &'static str,
}

pub const ENDPOINT: SettingKey = SettingKey {
    field: "endpoint",
    file_key: "AzureOpenAI:Endpoint",
    env_var: "AZURE_OPENAI_ENDPOINT",
};

pub const KEY: SettingKey = SettingKey {
    field: "key",
    file_key: "AzureOpenAI:Key",
    env_var: "AZURE_OPENAI_KEY",
};

pub const DEPLOYMENT_NAME: SettingKey = SettingKey {
    field: "deployment name",
    file_key: "AzureOpenAI:DeploymentName",
    env_var: "AZURE_OPENAI_DEPLOYMENT_NAME",
};

pub const API_VERSION: SettingKey = SettingKey {
    field: "api version",
    file_key: "AzureOpenAI:ApiVersion",
    env_var: "AZURE_OPENAI_API_VERSION",
};

pub const EMBEDDING_DEPLOYMENT: SettingKey = SettingKey {
    field: "embedding deployment",
    file_key: "AzureOpenAI:EmbeddingDeploymentName",
    env_var: "AZURE_OPENAI_EMBEDDING_DEPLOYMENT",
};

pub const REQUEST_TIMEOUT_MS: SettingKey = SettingKey {
    field: "request timeout",
    file_key: "AzureOpenAI:RequestTimeoutMs",
    env_var: "AZURE_OPENAI_REQUEST_TIMEOUT_MS",
};

#[derive(Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub key: String,
    pub deployment_name: String,
    pub api_version: String,
    pub embedding_deployment: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("deployment_name", &self.deployment_name)
            .field("api_version", &self.api_version)
            .field("embedding_deployment", &self.embedding_deployment)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Settings {
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        deployment_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            deployment_name: deployment_name.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            embedding_deployment: DEFAULT_EMBEDDING_DEPLOYMENT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// One named source of configuration values.
#[derive(Debug, Clone)]
pub enum ConfigLayer {
    /// Flattened JSON file; keys are `Section:Key` paths stored lowercase.
    File {
        path: PathBuf,
        values: HashMap<String, String>,
    },
    Environment {
        values: HashMap<String, String>,
    },
}

impl ConfigLayer {
    /// Reads a JSON settings file. An optional file that does not exist yields an empty layer.
    pub fn json_file(path: impl AsRef<Path>, optional: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        if optional && !path.exists() {
            return Ok(ConfigLayer::File {
                path,
                values: HashMap::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        Self::json_str(path, &raw)
    }

    /// Parses settings JSON. A leading UTF-8 byte-order mark is ignored.
    pub fn json_str(path: impl Into<PathBuf>, raw: &str) -> Result<Self, ConfigError> {
        let path = path.into();
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let document: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        let mut values = HashMap::new();
        flatten_json(None, &document, &mut values);

        Ok(ConfigLayer::File { path, values })
    }

    /// Snapshot of the process environment.
    pub fn environment() -> Self {
        Self::environment_from(std::env::vars())
    }

    pub fn environment_from<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ConfigLayer::Environment {
            values: vars
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ConfigLayer::File { path, .. } => path.display().to_string(),
            ConfigLayer::Environment { .. } => "environment".to_string(),
        }
    }

    /// Non-empty value for `key` in this layer. Environment layers match the variable
    /// name exactly and also accept the `AzureOpenAI__Endpoint` spelling of the file
    /// path, compared case-insensitively like file keys.
    pub fn lookup(&self, key: &SettingKey) -> Option<&str> {
        let found = match self {
            ConfigLayer::File { values, .. } => values.get(&key.file_key.to_ascii_lowercase()),
            ConfigLayer::Environment { values } => values.get(key.env_var).or_else(|| {
                let path = key.file_key.replace(':', "__");
                values
                    .iter()
                    .find(|(name, value)| {
                        name.eq_ignore_ascii_case(&path) && !value.trim().is_empty()
                    })
                    .map(|(_, value)| value)
            }),
        };

        found.map(String::as_str).filter(|value| !value.trim().is_empty())
    }
}

fn flatten_json(prefix: Option<&str>, value: &Value, out: &mut HashMap<String, String>) {
    let join = |segment: &str| match prefix {
        Some(prefix) => format!("{prefix}:{segment}"),
        None => segment.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (segment, child) in map {
                flatten_json(Some(&join(&segment.to_ascii_lowercase())), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(Some(&join(&index.to_string())), child, out);
            }
        }
        Value::Null => {}
        Value::String(text) => {
            if let Some(prefix) = prefix {
                out.insert(prefix.to_string(), text.clone());
            }
        }
        other => {
            if let Some(prefix) = prefix {
                out.insert(prefix.to_string(), other.to_string());
            }
        }
    }
}

/// Resolves [`Settings`] from layers ordered from highest to lowest priority.
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    layers: Vec<ConfigLayer>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment, then `appsettings.<environment>.json`, then `appsettings.json`,
    /// all read from `dir`. Both files are optional.
    pub fn standard(dir: impl AsRef<Path>, environment: &str) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        Ok(Self::new()
            .with_layer(ConfigLayer::environment())
            .with_layer(ConfigLayer::json_file(
                dir.join(format!("appsettings.{environment}.json")),
                true,
            )?)
            .with_layer(ConfigLayer::json_file(dir.join(BASE_FILE_NAME), true)?))
    }

    /// Appends a layer below every layer already registered.
    pub fn with_layer(mut self, layer: ConfigLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    pub fn resolve(&self, key: &SettingKey) -> Option<&str> {
        self.layers.iter().find_map(|layer| {
            let value = layer.lookup(key)?;
            tracing::debug!(setting = key.field, source = %layer.name(), "resolved setting");
            Some(value)
        })
    }

    fn require(&self, key: &SettingKey) -> Result<String, ConfigError> {
        self.resolve(key)
            .map(str::to_string)
            .ok_or(ConfigError::MissingSetting {
                field: key.field,
                file_key: key.file_key,
                env_var: key.env_var,
            })
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let endpoint = self.require(&ENDPOINT)?;
        let key = self.require(&KEY)?;
        let deployment_name = self.require(&DEPLOYMENT_NAME)?;

        let mut settings = Settings::new(endpoint, key, deployment_name);

        if let Some(version) = self.resolve(&API_VERSION) {
            settings.api_version = version.to_string();
        }
        if let Some(deployment) = self.resolve(&EMBEDDING_DEPLOYMENT) {
            settings.embedding_deployment = deployment.to_string();
        }
        if let Some(timeout_ms) = self.resolve(&REQUEST_TIMEOUT_MS) {
            let ms = timeout_ms
                .trim()
                .parse::<u64>()
                .map_err(|error| ConfigError::InvalidSetting {
                    field: REQUEST_TIMEOUT_MS.field,
                    value: timeout_ms.to_string(),
                    reason: error.to_string(),
                })?;
            if ms == 0 {
                return Err(ConfigError::InvalidSetting {
                    field: REQUEST_TIMEOUT_MS.field,
                    value: timeout_ms.to_string(),
                    reason: "timeout must be greater than zero".to_string(),
                });
            }
            settings.request_timeout = Duration::from_millis(ms);
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(raw: &str) -> ConfigLayer {
        ConfigLayer::json_str("appsettings.json", raw).expect("valid json")
    }

    const COMPLETE_FILE: &str = r#"{
        "AzureOpenAI": {
            "Endpoint": "https://file.openai.azure.com",
            "Key": "file-key",
            "DeploymentName": "file-deployment"
        }
    }"#;

    #[test]
    fn flattens_nested_sections_case_insensitively() {
        let layer = file(r#"{ "azureopenai": { "ENDPOINT": "https://x" } }"#);
        assert_eq!(layer.lookup(&ENDPOINT), Some("https://x"));
        assert_eq!(layer.lookup(&KEY), None);
    }

    #[test]
    fn environment_value_wins_over_file() {
        let settings = SettingsLoader::new()
            .with_layer(ConfigLayer::environment_from([(
                "AZURE_OPENAI_ENDPOINT",
                "https://env.openai.azure.com",
            )]))
            .with_layer(file(COMPLETE_FILE))
            .load()
            .expect("settings");

        assert_eq!(settings.endpoint, "https://env.openai.azure.com");
        assert_eq!(settings.key, "file-key");
        assert_eq!(settings.deployment_name, "file-deployment");
    }

    #[test]
    fn empty_values_fall_through_to_lower_layers() {
        let settings = SettingsLoader::new()
            .with_layer(ConfigLayer::environment_from([("AZURE_OPENAI_KEY", "  ")]))
            .with_layer(file(COMPLETE_FILE))
            .load()
            .expect("settings");

        assert_eq!(settings.key, "file-key");
    }

    #[test]
    fn environment_accepts_double_underscore_paths() {
        let layer = ConfigLayer::environment_from([("AzureOpenAI__DeploymentName", "gpt-4o")]);
        assert_eq!(layer.lookup(&DEPLOYMENT_NAME), Some("gpt-4o"));
    }

    #[test]
    fn each_missing_required_field_is_named() {
        let cases = [
            (ENDPOINT, ("AZURE_OPENAI_KEY", "AZURE_OPENAI_DEPLOYMENT_NAME")),
            (KEY, ("AZURE_OPENAI_ENDPOINT", "AZURE_OPENAI_DEPLOYMENT_NAME")),
            (DEPLOYMENT_NAME, ("AZURE_OPENAI_ENDPOINT", "AZURE_OPENAI_KEY")),
        ];

        for (missing, (first, second)) in cases {
            let error = SettingsLoader::new()
                .with_layer(ConfigLayer::environment_from([(first, "a"), (second, "b")]))
                .load()
                .unwrap_err();

            assert_eq!(error.field(), Some(missing.field));
            let message = error.to_string();
            assert!(message.contains(missing.file_key), "{message}");
            assert!(message.contains(missing.env_var), "{message}");
        }
    }

    #[test]
    fn optional_settings_use_defaults() {
        let settings = SettingsLoader::new()
            .with_layer(file(COMPLETE_FILE))
            .load()
            .expect("settings");

        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert_eq!(settings.embedding_deployment, DEFAULT_EMBEDDING_DEPLOYMENT);
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn rejects_unparsable_timeout() {
        let error = SettingsLoader::new()
            .with_layer(ConfigLayer::environment_from([(
                "AZURE_OPENAI_REQUEST_TIMEOUT_MS",
                "soon",
            )]))
            .with_layer(file(COMPLETE_FILE))
            .load()
            .unwrap_err();

        assert!(matches!(error, ConfigError::InvalidSetting { field: "request timeout", .. }));
    }

    #[test]
    fn rejects_zero_timeout() {
        let error = SettingsLoader::new()
            .with_layer(ConfigLayer::environment_from([(
                "AZURE_OPENAI_REQUEST_TIMEOUT_MS",
                "0",
            )]))
            .with_layer(file(COMPLETE_FILE))
            .load()
            .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::InvalidSetting { field: "request timeout", ref reason, .. } if reason.contains("greater than zero")
        ));
    }

    #[test]
    fn environment_section_paths_ignore_case() {
        let layer = ConfigLayer::environment_from([
            ("AZUREOPENAI__ENDPOINT", "https://upper"),
            ("azureopenai__key", "lower-key"),
        ]);
        assert_eq!(layer.lookup(&ENDPOINT), Some("https://upper"));
        assert_eq!(layer.lookup(&KEY), Some("lower-key"));

        let layer = ConfigLayer::environment_from([
            ("AZURE_OPENAI_ENDPOINT", "https://exact"),
            ("azureopenai__endpoint", "https://path"),
        ]);
        assert_eq!(layer.lookup(&ENDPOINT), Some("https://exact"));
    }

    #[test]
    fn debug_redacts_key() {
        let settings = Settings::new("https://x", "k-secret", "d");
        assert!(!format!("{settings:?}").contains("k-secret"));
    }
}
