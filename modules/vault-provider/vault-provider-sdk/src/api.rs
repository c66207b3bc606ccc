use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::{AuthError, LookupError, SecretClientError, SigningError};
use crate::models::{AuthPrincipal, BundleSelector, PodIdentity, PrincipalKind, VaultId};

/// Signing credential built from an [`AuthPrincipal`].
///
/// Implementations hold key material; they sign requests in place and never
/// expose the key.
pub trait ConfigProvider: Send + Sync {
    /// Region the credential belongs to. Drives the vault endpoint.
    fn region(&self) -> &str;

    fn kind(&self) -> PrincipalKind;

    /// Adds the authorization headers for the request.
    ///
    /// # Errors
    /// Returns [`SigningError`] when the request cannot be signed.
    fn sign_request(
        &self,
        method: &http::Method,
        uri: &http::Uri,
        headers: &mut http::HeaderMap,
        body: &[u8],
    ) -> Result<(), SigningError>;
}

/// Bundle content as returned on the wire, before any checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteBundleContent {
    pub content_type: String,
    pub content: Option<String>,
}

/// A secret bundle as returned by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteSecretBundle {
    pub secret_id: String,
    pub version_number: i64,
    /// Raw stage tokens; checked against the known set by the engine.
    pub stages: Vec<String>,
    pub content: RemoteBundleContent,
}

/// Remote retrieval of a single bundle by secret name.
#[async_trait]
pub trait SecretClient: Send + Sync {
    /// # Errors
    /// Returns [`SecretClientError`] on transport, authorization or lookup failure.
    async fn fetch_by_name(
        &self,
        vault_id: &VaultId,
        secret_name: &str,
        selector: BundleSelector,
    ) -> Result<RemoteSecretBundle, SecretClientError>;
}

/// Builds credentials and clients for one resolution.
#[async_trait]
pub trait SecretClientFactory: Send + Sync {
    /// # Errors
    /// Returns [`AuthError::Credential`] when the principal's credential cannot be built.
    async fn create_config_provider(
        &self,
        principal: &AuthPrincipal,
    ) -> Result<Arc<dyn ConfigProvider>, AuthError>;

    /// # Errors
    /// Returns [`SecretClientError`] when the client cannot be constructed.
    fn create_client(
        &self,
        provider: Arc<dyn ConfigProvider>,
    ) -> Result<Arc<dyn SecretClient>, SecretClientError>;
}

/// Reads cluster state needed to build a principal.
#[async_trait]
pub trait ClusterLookup: Send + Sync {
    /// Returns the data map of a cluster secret.
    ///
    /// # Errors
    /// Returns [`LookupError`] when the secret is absent or the cluster API fails.
    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, LookupError>;

    /// Issues a service-account token bound to `pod`, valid for `ttl`.
    ///
    /// # Errors
    /// Returns [`LookupError`] when the token request is rejected.
    async fn issue_token(
        &self,
        pod: &PodIdentity,
        ttl: Duration,
    ) -> Result<SecretString, LookupError>;
}
