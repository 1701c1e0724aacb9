//! Backend configuration
//!
//! Backends are constructed from an explicit [`BackendConfig`]. Named
//! configurations are persisted in a TOML file managed by [`ConfigManager`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "STOW_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Connection settings for one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// A directory on the local filesystem
    Local { root_directory: PathBuf },
    /// An Amazon S3 or S3-compatible bucket
    S3(S3Config),
}

/// Settings for an S3 bucket
///
/// Without static keys the SDK's default credential chain is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,

    /// Root prefix inside the bucket
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Server-side encryption algorithm for uploads (e.g. `AES256`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,
}

impl BackendConfig {
    /// Provider name
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Local { .. } => "local",
            BackendConfig::S3(_) => "s3",
        }
    }

    /// Human-readable location of the backend root
    pub fn location(&self) -> String {
        match self {
            BackendConfig::Local { root_directory } => root_directory.display().to_string(),
            BackendConfig::S3(s3) if s3.prefix.is_empty() => format!("s3://{}", s3.bucket),
            BackendConfig::S3(s3) => format!("s3://{}/{}", s3.bucket, s3.prefix),
        }
    }

    /// Check the settings without contacting the backend
    pub fn validate(&self) -> Result<()> {
        match self {
            BackendConfig::Local { root_directory } => {
                if root_directory.as_os_str().is_empty() {
                    return Err(Error::Config("root_directory cannot be empty".into()));
                }
                Ok(())
            }
            BackendConfig::S3(s3) => s3.validate(),
        }
    }
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::Config("bucket cannot be empty".into()));
        }

        if let Some(endpoint) = &self.endpoint {
            let url = url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::Config(format!(
                    "endpoint must use http or https: {endpoint}"
                )));
            }
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(Error::Config(
                "access_key and secret_key must be set together".into(),
            ));
        }
        if self.session_token.is_some() && self.access_key.is_none() {
            return Err(Error::Config(
                "session_token requires access_key and secret_key".into(),
            ));
        }

        Ok(())
    }
}

/// Contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use `$STOW_CONFIG_DIR/config.toml`, or `config.toml` in the platform
    /// config directory
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine config directory".into()))?
                .join("stowage"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    /// Use an explicit configuration file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Read the configuration; a missing file is an empty configuration
    pub fn load(&self) -> Result<Config> {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        // The file may hold credentials
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.config_path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %self.config_path.display(), "Saved configuration");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<BackendConfig> {
        self.load()?
            .backends
            .remove(name)
            .ok_or_else(|| Error::BackendNotFound(name.to_string()))
    }

    /// Add or replace a named backend after validating it
    pub fn set(&self, name: &str, backend: BackendConfig) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::Config("backend name cannot be empty".into()));
        }
        backend.validate()?;

        let mut config = self.load()?;
        config.backends.insert(name.to_string(), backend);
        self.save(&config)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.load()?;
        if config.backends.remove(name).is_none() {
            return Err(Error::BackendNotFound(name.to_string()));
        }
        self.save(&config)
    }

    /// Named backends in name order
    pub fn list(&self) -> Result<Vec<(String, BackendConfig)>> {
        Ok(self.load()?.backends.into_iter().collect())
    }
}
