//! Provider configuration read from the environment

use thiserror::Error;

use crate::api::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://cloud.mongodb.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub access_token: String,
    pub insecure: bool,
    pub retry: RetryConfig,
}

impl ProviderConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            insecure: false,
            retry: RetryConfig::default(),
        }
    }

    /// Reads `MONGODB_ATLAS_BASE_URL`, `MONGODB_ATLAS_ACCESS_TOKEN` and
    /// `MONGODB_ATLAS_INSECURE`
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = std::env::var("MONGODB_ATLAS_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing(
                "access_token (MONGODB_ATLAS_ACCESS_TOKEN env var)",
            ))?;

        let base_url = std::env::var("MONGODB_ATLAS_BASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let insecure = match std::env::var("MONGODB_ATLAS_INSECURE") {
            Ok(value) => value.parse::<bool>().map_err(|e| ConfigError::Invalid {
                name: "MONGODB_ATLAS_INSECURE",
                reason: e.to_string(),
            })?,
            Err(_) => false,
        };

        let config = Self {
            base_url,
            access_token,
            insecure,
            retry: RetryConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            name: "base_url",
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                name: "base_url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if self.access_token.is_empty() {
            return Err(ConfigError::Missing("access_token"));
        }

        Ok(())
    }
}
