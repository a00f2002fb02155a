use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Which remote store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store with fixture data; no network.
    #[default]
    Memory,
    /// Hosted backend over HTTP + websocket.
    Rest,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Rest => write!(f, "rest"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "rest" => Ok(BackendKind::Rest),
            _ => Err(format!(
                "Invalid backend kind '{}'. Valid options: memory, rest",
                s
            )),
        }
    }
}

/// How mutating call failures are surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Failures are reported to the caller.
    #[default]
    Strict,
    /// Failures are logged and swallowed; the UI stays optimistic.
    Optimistic,
}

impl std::fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WritePolicy::Strict => write!(f, "strict"),
            WritePolicy::Optimistic => write!(f, "optimistic"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(WritePolicy::Strict),
            "optimistic" => Ok(WritePolicy::Optimistic),
            _ => Err(format!(
                "Invalid write policy '{}'. Valid options: strict, optimistic",
                s
            )),
        }
    }
}

/// Remote backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Project base URL (e.g., "https://abc.example.co")
    pub url: Option<String>,
    /// Public API key sent with every request
    pub anon_key: Option<String>,
}

impl BackendConfig {
    /// Returns true if the configured backend can actually be constructed.
    pub fn is_configured(&self) -> bool {
        match self.kind {
            BackendKind::Memory => true,
            BackendKind::Rest => self.url.is_some() && self.anon_key.is_some(),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Remote backend settings
    pub backend: BackendConfig,
    /// Directory for local storage (favorites, cached session)
    pub data_dir: ConfigValue<PathBuf>,
    /// How mutating call failures are surfaced
    pub write_policy: ConfigValue<WritePolicy>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    backend: Option<BackendConfig>,
    data_dir: Option<PathBuf>,
    write_policy: Option<WritePolicy>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut backend = BackendConfig::default();
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut write_policy = ConfigValue::new(WritePolicy::default(), ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(backend_config) = file_config.backend {
                backend = backend_config;
            }
            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(policy) = file_config.write_policy {
                write_policy = ConfigValue::new(policy, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Ok(kind) = std::env::var("DC_BACKEND") {
            backend.kind = kind
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DC_BACKEND", kind))?;
        }
        if let Ok(url) = std::env::var("DC_BACKEND_URL") {
            backend.url = Some(url);
        }
        if let Ok(key) = std::env::var("DC_ANON_KEY") {
            backend.anon_key = Some(key);
        }
        if let Ok(dir) = std::env::var("DC_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(policy) = std::env::var("DC_WRITE_POLICY") {
            let parsed = policy
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DC_WRITE_POLICY", policy))?;
            write_policy = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        Ok(Self {
            backend,
            data_dir,
            write_policy,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/danceconnect/
    /// - macOS: ~/Library/Application Support/danceconnect/
    /// - Windows: %APPDATA%/danceconnect/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("danceconnect")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/danceconnect/
    /// - macOS: ~/Library/Application Support/danceconnect/
    /// - Windows: %APPDATA%/danceconnect/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("danceconnect")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// Stable label for the configured backend, used to key the cached
    /// session so switching backends never reuses a token.
    pub fn session_scope(&self) -> String {
        match self.backend.kind {
            BackendKind::Memory => "memory".to_string(),
            BackendKind::Rest => self.backend.url.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {1}", .0.display())]
    ReadError(PathBuf, std::io::Error),

    #[error("Failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, serde_yaml::Error),

    #[error("Invalid value '{1}' for {0}")]
    InvalidValue(&'static str, String),
}
