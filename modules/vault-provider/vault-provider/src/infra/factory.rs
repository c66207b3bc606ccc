use std::sync::Arc;

use async_trait::async_trait;
use vault_provider_sdk::{
    AuthError, AuthPrincipal, ConfigProvider, SecretClient, SecretClientError, SecretClientFactory,
};

use super::principal::PrincipalResolver;
use super::vault_client::OciSecretsClient;
use crate::config::VaultConfig;

/// Production factory: principal resolver plus the OCI secrets client.
#[derive(Debug, Clone)]
pub struct OciSecretClientFactory {
    config: Arc<VaultConfig>,
    resolver: PrincipalResolver,
}

impl OciSecretClientFactory {
    #[must_use]
    pub fn new(config: Arc<VaultConfig>) -> Self {
        Self {
            resolver: PrincipalResolver::new(Arc::clone(&config)),
            config,
        }
    }
}

#[async_trait]
impl SecretClientFactory for OciSecretClientFactory {
    async fn create_config_provider(
        &self,
        principal: &AuthPrincipal,
    ) -> Result<Arc<dyn ConfigProvider>, AuthError> {
        let credential = self.resolver.resolve(principal).await?;
        Ok(Arc::new(credential))
    }

    fn create_client(
        &self,
        provider: Arc<dyn ConfigProvider>,
    ) -> Result<Arc<dyn SecretClient>, SecretClientError> {
        let client = OciSecretsClient::new(
            provider,
            self.config.secrets_endpoint.as_deref(),
            self.config.request_timeout(),
        )?;
        Ok(Arc::new(client))
    }
}
