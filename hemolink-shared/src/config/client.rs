use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, str::FromStr, sync::LazyLock, time::Duration};
use thiserror::Error;
use url::Url;

/// Backend address used when neither a config file nor the environment sets one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/";

const ENV_API_BASE_URL: &str = "HEMOLINK_API_BASE_URL";
const ENV_LOG_LEVEL: &str = "HEMOLINK_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "HEMOLINK_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported configuration format for {0}; use yaml, json or toml")]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::invalid(
                "logging.format",
                format!("unknown log format `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Unread-count reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UnreadConfig {
    /// Seconds between reconciliation refreshes while authenticated.
    pub refresh_interval_secs: u64,
}

impl Default for UnreadConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
        }
    }
}

/// Request cache timings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            sweep_interval_secs: 60,
        }
    }
}

/// Client configuration for the Hemolink messaging core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Backend origin; REST paths are joined onto it.
    pub api_base_url: Url,
    pub request_timeout_secs: u64,
    pub unread: UnreadConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Config {
    /// Generates a default configuration.
    pub fn with_defaults() -> Self {
        Self {
            api_base_url: default_base_url(),
            request_timeout_secs: 15,
            unread: UnreadConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Values from the file take precedence; environment variables only fill
    /// settings the file left at their defaults.
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        let defaults = Self::with_defaults();
        if config.api_base_url == defaults.api_base_url
            && let Ok(value) = env::var(ENV_API_BASE_URL)
        {
            config.api_base_url = Url::parse(value.trim())
                .map_err(|err| ConfigError::invalid("api_base_url", err.to_string()))?;
        }
        if config.logging.level == defaults.logging.level
            && let Ok(level) = env::var(ENV_LOG_LEVEL)
        {
            config.logging.level = level;
        }
        if config.logging.format == defaults.logging.format
            && let Ok(format) = env::var(ENV_LOG_FORMAT)
        {
            config.logging.format = format.parse()?;
        }

        config.api_base_url = with_trailing_slash(config.api_base_url);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => {
                serde_yml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            Some("toml") => {
                toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            _ => Err(ConfigError::UnsupportedFormat(path)),
        }
    }

    /// Checks the settings that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "api_base_url",
                format!("scheme must be http or https, got `{}`", self.api_base_url.scheme()),
            ));
        }
        if self.unread.refresh_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "unread.refresh_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs", "must be greater than 0"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "cache.sweep_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.unread.refresh_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parsed form of [`DEFAULT_API_BASE_URL`].
///
/// The constant is a literal absolute `http` URL, so parsing cannot fail;
/// `default_base_url_is_valid` pins that down.
static DEFAULT_BASE_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse(DEFAULT_API_BASE_URL).expect("DEFAULT_API_BASE_URL is a valid absolute URL")
});

fn default_base_url() -> Url {
    DEFAULT_BASE_URL.clone()
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
