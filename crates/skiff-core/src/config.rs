//! Configuration module for Skiff.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::ConfigurationError;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Skiff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Remote backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Identifier of this adapter instance; scopes the persisted account id.
    pub service_identifier: String,
    /// Name of the working directory at the root of the remote account.
    pub directory_name: Option<String>,
    /// Base URL of the RPC endpoints.
    pub api_base_url: String,
    /// Base URL of the content upload/download endpoints.
    pub content_base_url: String,
    /// Maximum number of revisions returned by a version listing.
    pub revision_limit: u32,
    /// Name of the metadata template created on first use.
    pub template_name: String,
    /// Description of the metadata template created on first use.
    pub template_description: String,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// App key of the registered application. `None` until configured.
    pub app_key: Option<String>,
    /// Loopback redirect URI; the callback server binds to its host and port.
    pub redirect_uri: String,
    /// Keyring service name tokens and account ids are stored under.
    pub keyring_service: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/skiff/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("skiff")
            .join("config.yaml")
    }
}

impl RemoteConfig {
    /// Absolute path of the working directory, or of `filename` inside it.
    ///
    /// Fails with [`ConfigurationError::MissingDirectoryName`] when no
    /// directory is configured, before anything is sent to the backend.
    pub fn remote_path(&self, filename: Option<&str>) -> Result<String, ConfigurationError> {
        let directory = self
            .directory_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigurationError::MissingDirectoryName)?;

        match filename {
            Some(name) if name.is_empty() || name.contains('/') => {
                Err(ConfigurationError::InvalidPath(name.to_string()))
            }
            Some(name) => Ok(format!("/{directory}/{name}")),
            None => Ok(format!("/{directory}")),
        }
    }

    /// Key the persisted account identifier is stored under.
    pub fn account_key(&self) -> String {
        format!("{}_accountID", self.service_identifier)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            service_identifier: "skiff".into(),
            directory_name: Some("Skiff".into()),
            api_base_url: "https://api.dropboxapi.com".into(),
            content_base_url: "https://content.dropboxapi.com".into(),
            revision_limit: 100,
            template_name: "Skiff".into(),
            template_description: "Skiff syncing metadata.".into(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_key: None,
            redirect_uri: "http://127.0.0.1:53682/callback".into(),
            keyring_service: "skiff".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"remote.revision_limit"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound the backend accepts for a revision listing.
const MAX_REVISION_LIMIT: u32 = 100;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- remote ---
        if self.remote.service_identifier.trim().is_empty() {
            push("remote.service_identifier", "must not be empty".into());
        }
        match self.remote.directory_name.as_deref() {
            None => push("remote.directory_name", "must be set".into()),
            Some(name) if name.trim().is_empty() => {
                push("remote.directory_name", "must not be empty".into())
            }
            Some(name) if name.contains('/') => push(
                "remote.directory_name",
                format!("must be a single path component: {name}"),
            ),
            Some(_) => {}
        }
        for (field, value) in [
            ("remote.api_base_url", &self.remote.api_base_url),
            ("remote.content_base_url", &self.remote.content_base_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                push(field, format!("invalid URL '{value}': {e}"));
            }
        }
        if self.remote.revision_limit == 0 || self.remote.revision_limit > MAX_REVISION_LIMIT {
            push(
                "remote.revision_limit",
                format!("must be between 1 and {MAX_REVISION_LIMIT}"),
            );
        }
        if self.remote.template_name.trim().is_empty() {
            push("remote.template_name", "must not be empty".into());
        }

        // --- auth ---
        if self.auth.app_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            push("auth.app_key", "must not be empty when set".into());
        }
        match url::Url::parse(&self.auth.redirect_uri) {
            Ok(uri) if uri.port_or_known_default().is_none() => {
                push("auth.redirect_uri", "must include a port".into())
            }
            Ok(_) => {}
            Err(e) => push(
                "auth.redirect_uri",
                format!("invalid URL '{}': {e}", self.auth.redirect_uri),
            ),
        }
        if self.auth.keyring_service.trim().is_empty() {
            push("auth.keyring_service", "must not be empty".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn service_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config.remote.service_identifier = identifier.into();
        self
    }

    pub fn directory_name(mut self, name: impl Into<String>) -> Self {
        self.config.remote.directory_name = Some(name.into());
        self
    }

    pub fn without_directory_name(mut self) -> Self {
        self.config.remote.directory_name = None;
        self
    }

    /// Point both RPC and content endpoints at the same host (used by tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config.remote.api_base_url = url.clone();
        self.config.remote.content_base_url = url;
        self
    }

    pub fn revision_limit(mut self, limit: u32) -> Self {
        self.config.remote.revision_limit = limit;
        self
    }

    pub fn template(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.config.remote.template_name = name.into();
        self.config.remote.template_description = description.into();
        self
    }

    // --- auth ---

    pub fn app_key(mut self, key: impl Into<String>) -> Self {
        self.config.auth.app_key = Some(key.into());
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = uri.into();
        self
    }

    pub fn keyring_service(mut self, service: impl Into<String>) -> Self {
        self.config.auth.keyring_service = service.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
