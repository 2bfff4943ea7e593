//! Configuration management for the storelink CLI and SDK

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{Result, StorelinkError};

/// App-level configuration persisted as JSON under the user config dir
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub endpoint: String,
    pub timeout: u64,
    pub verbose: bool,
    pub storage_dir: PathBuf,
    pub token_storage_enabled: bool,
    /// Platform override for push registration ("web", "android", "ios").
    /// Defaults to web; native values are used by the mobile shells.
    pub platform: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://erp.toastlab.app/api".to_string(),
            timeout: 30,
            verbose: false,
            storage_dir: default_storage_dir(),
            token_storage_enabled: true,
            platform: None,
        }
    }
}

impl AppConfig {
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if config_file.exists() {
            let content = fs::read_to_string(&config_file).await?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(_) => {
                    // Unreadable config files are replaced with defaults
                    let config = Self::default();
                    config.save(&config_file).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(&config_file).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    pub fn to_client_config(&self) -> ClientConfig {
        let mut builder = ClientConfigBuilder::new()
            .base_url(&self.endpoint)
            .timeout(self.timeout)
            .verbose(self.verbose);

        if self.token_storage_enabled {
            let token_path = self.storage_dir.join("tokens").join("session.json");
            let token_config = TokenStorageConfig {
                enabled: true,
                storage_path: Some(token_path.to_string_lossy().to_string()),
                encryption_key: None,
            };
            builder = builder.token_storage(token_config);
        }

        if let Some(platform) = &self.platform {
            builder = builder.platform(platform);
        }

        builder.build().unwrap_or_else(|_| {
            ClientConfigBuilder::new()
                .base_url("https://erp.toastlab.app/api")
                .build()
                .unwrap()
        })
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storelink")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storelink")
}

/// Token storage configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TokenStorageConfig {
    #[serde(default)]
    pub enabled: bool,
    pub storage_path: Option<String>,
    pub encryption_key: Option<String>,
}

impl From<TokenStorageConfig> for crate::store::TokenStoreConfig {
    fn from(config: TokenStorageConfig) -> Self {
        Self {
            enabled: config.enabled,
            storage_path: config.storage_path.map(PathBuf::from),
            encryption_key: config.encryption_key,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub token_storage: TokenStorageConfig,
    /// Push platform selector ("web", "android", "ios"); web when unset
    #[serde(default)]
    pub platform: Option<String>,
    /// Base path notification links resolve against
    #[serde(default = "default_link_base_path")]
    pub link_base_path: String,
    /// Bound on waiting for the native registration callback
    #[serde(default = "default_push_timeout")]
    pub push_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_link_base_path() -> String {
    "/user".to_string()
}

fn default_push_timeout() -> u64 {
    20
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://erp.toastlab.app/api".to_string(),
            timeout: default_timeout(),
            verbose: false,
            token_storage: TokenStorageConfig::default(),
            platform: None,
            link_base_path: default_link_base_path(),
            push_timeout_secs: default_push_timeout(),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    verbose: Option<bool>,
    token_storage: Option<TokenStorageConfig>,
    platform: Option<String>,
    push_timeout_secs: Option<u64>,
    config_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn token_storage(mut self, token_storage: TokenStorageConfig) -> Self {
        self.token_storage = Some(token_storage);
        self
    }

    pub fn platform<S: Into<String>>(mut self, platform: S) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn push_timeout_secs(mut self, secs: u64) -> Self {
        self.push_timeout_secs = Some(secs);
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_file_and_env(self.config_file.as_deref())?;

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(token_storage) = self.token_storage {
            config.token_storage = token_storage;
        }
        if let Some(platform) = self.platform {
            config.platform = Some(platform);
        }
        if let Some(secs) = self.push_timeout_secs {
            config.push_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn new() -> Result<Self> {
        Self::from_file_and_env::<&str>(None)
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn from_file_and_env<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", "https://erp.toastlab.app/api")?
            .set_default("timeout", 30)?
            .set_default("verbose", false)?
            .set_default("link_base_path", "/user")?
            .set_default("push_timeout_secs", 20)?;

        if let Some(config_path) = config_file {
            if config_path.as_ref().exists() {
                builder = builder.add_source(File::from(config_path.as_ref()));
            }
        }
        builder = builder.add_source(Environment::with_prefix("STORELINK").try_parsing(true));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(StorelinkError::invalid_input("Base URL cannot be empty"));
        }
        Ok(())
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        let base_url = if self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
        {
            self.base_url.clone()
        } else {
            format!("https://{}", self.base_url)
        };

        format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
    }

    /// Origin of the deployment (scheme + authority), used for link routing
    pub fn origin(&self) -> String {
        let url = self.endpoint_url("");
        match reqwest::Url::parse(&url) {
            Ok(parsed) => {
                let mut origin = format!(
                    "{}://{}",
                    parsed.scheme(),
                    parsed.host_str().unwrap_or_default()
                );
                if let Some(port) = parsed.port() {
                    origin.push_str(&format!(":{}", port));
                }
                origin
            }
            Err(_) => self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_paths() {
        let config = ClientConfig {
            base_url: "https://example.com/api/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint_url("/fcm/token"),
            "https://example.com/api/fcm/token"
        );
        assert_eq!(config.endpoint_url("me"), "https://example.com/api/me");
    }

    #[test]
    fn test_origin_strips_path() {
        let config = ClientConfig {
            base_url: "https://example.com:8443/api".to_string(),
            ..Default::default()
        };
        assert_eq!(config.origin(), "https://example.com:8443");
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let config = ClientConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
