pub mod api;
pub mod config;
pub mod provider_data;
pub mod refresh;
pub mod resources;
pub mod state;

use thiserror::Error;

pub use config::{ConfigError, ProviderConfig};
pub use provider_data::AtlasProviderData;
pub use resources::{ClusterResource, OperationTimeouts, ProjectResource, ResourceError};
pub use state::ClusterState;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured")]
    NotConfigured,

    #[error("Invalid provider configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create API client: {0}")]
    Client(#[from] api::ApiError),
}

pub struct AtlasProvider {
    data: Option<AtlasProviderData>,
}

impl Default for AtlasProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AtlasProvider {
    pub fn new() -> Self {
        Self { data: None }
    }

    /// Builds the API client once; resources share it through the returned
    /// provider data
    pub fn configure(&mut self, config: &ProviderConfig) -> Result<AtlasProviderData, ProviderError> {
        config.validate()?;

        let client = api::Client::with_config(
            &config.base_url,
            &config.access_token,
            config.insecure,
            config.retry.clone(),
        )?;
        tracing::debug!("Configured MongoDB Atlas client for {}", client.base_url());

        let data = AtlasProviderData::new(client);
        self.data = Some(data.clone());
        Ok(data)
    }

    pub fn provider_data(&self) -> Result<&AtlasProviderData, ProviderError> {
        self.data.as_ref().ok_or(ProviderError::NotConfigured)
    }

    pub fn cluster_resource(&self) -> Result<ClusterResource, ProviderError> {
        Ok(ClusterResource::new(self.provider_data()?.clone()))
    }

    pub fn project_resource(&self) -> Result<ProjectResource, ProviderError> {
        Ok(ProjectResource::new(self.provider_data()?.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_require_configuration() {
        let provider = AtlasProvider::new();

        assert!(matches!(
            provider.cluster_resource(),
            Err(ProviderError::NotConfigured)
        ));
        assert!(matches!(
            provider.project_resource(),
            Err(ProviderError::NotConfigured)
        ));
    }

    #[test]
    fn configure_builds_shared_client() {
        let mut provider = AtlasProvider::new();
        let mut config = ProviderConfig::new("token");
        config.base_url = "https://cloud-dev.mongodb.com/".to_string();

        let data = provider.configure(&config).unwrap();
        assert_eq!(data.client.base_url(), "https://cloud-dev.mongodb.com");
        assert!(provider.cluster_resource().is_ok());
        assert!(provider.project_resource().is_ok());
    }

    #[test]
    fn configure_rejects_invalid_config() {
        let mut provider = AtlasProvider::new();
        let mut config = ProviderConfig::new("token");
        config.base_url = "::not a url".to_string();

        assert!(matches!(
            provider.configure(&config),
            Err(ProviderError::Config(_))
        ));
        assert!(provider.provider_data().is_err());
    }
}
