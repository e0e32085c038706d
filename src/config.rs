use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub dnspod: DnsPodConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub key: Option<String>,  // 访问密钥，用于鉴权（可选）
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsPodConfig {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(flatten)]
    pub api: ApiOptions,
    /// Seconds the auth hook sleeps after creating the record
    #[serde(default = "default_propagation_seconds")]
    pub propagation_seconds: u64,
}

/// SecretId/SecretKey pair for the Tencent Cloud API.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(alias = "dnspod_secret_id")]
    pub secret_id: String,
    #[serde(alias = "dnspod_secret_key")]
    pub secret_key: String,
}

impl Credentials {
    #[cfg(test)]
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOptions {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://dnspod.tencentcloudapi.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_propagation_seconds() -> u64 {
    120
}

impl ApiOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DnsPodConfig {
    pub fn propagation_delay(&self) -> Duration {
        Duration::from_secs(self.propagation_seconds)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        warn_if_world_readable(path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.dnspod.credentials.secret_id.trim().is_empty()
            || config.dnspod.credentials.secret_key.trim().is_empty()
        {
            anyhow::bail!(
                "Config file {} has an empty dnspod secret_id or secret_key",
                path.display()
            );
        }

        Ok(config)
    }
}

// The file holds the SecretKey, so only the owner should be able to read it.
#[cfg(unix)]
fn warn_if_world_readable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                "Config file {} is accessible by other users (mode {:o}), consider chmod 600",
                path.display(),
                mode
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_world_readable(_path: &Path) {}
