//! Kubernetes-backed [`ClusterLookup`]: auth-config secrets and bound service-account tokens.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{BoundObjectReference, TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::Client;
use kube::api::{Api, PostParams};
use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use vault_provider_sdk::{ClusterLookup, LookupError, PodIdentity};

/// Talks to the API server of the cluster the provider runs in.
///
/// The client is created on first use from the in-cluster (or kubeconfig) environment.
#[derive(Default)]
pub struct KubeClusterLookup {
    client: OnceCell<Client>,
}

impl KubeClusterLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<Client, LookupError> {
        self.client
            .get_or_try_init(|| async {
                super::ensure_crypto_provider();
                let client = Client::try_default().await.map_err(|e| {
                    LookupError::Unavailable(format!("can not initialize kubernetes client: {e}"))
                })?;
                info!("initialized kubernetes client");
                Ok::<_, LookupError>(client)
            })
            .await
            .cloned()
    }
}

fn token_request(pod: &PodIdentity, ttl: Duration) -> TokenRequest {
    TokenRequest {
        spec: TokenRequestSpec {
            audiences: Vec::new(),
            bound_object_ref: Some(BoundObjectReference {
                kind: Some("Pod".to_owned()),
                api_version: Some("v1".to_owned()),
                name: Some(pod.name.clone()),
                uid: Some(pod.uid.clone()),
            }),
            expiration_seconds: Some(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        },
        ..TokenRequest::default()
    }
}

#[async_trait]
impl ClusterLookup for KubeClusterLookup {
    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, LookupError> {
        let api: Api<Secret> = Api::namespaced(self.client().await?, namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?
            .ok_or_else(|| LookupError::NotFound(format!("secret {namespace}/{name}")))?;

        debug!(namespace, name, "read secret from kubernetes API");
        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }

    async fn issue_token(
        &self,
        pod: &PodIdentity,
        ttl: Duration,
    ) -> Result<SecretString, LookupError> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client().await?, &pod.namespace);
        let response = api
            .create_token_request(
                &pod.service_account,
                &PostParams::default(),
                &token_request(pod, ttl),
            )
            .await
            .map_err(|e| LookupError::Unavailable(format!("unable to fetch token from token api: {e}")))?;

        let token = response
            .status
            .map(|status| status.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| LookupError::InvalidResponse("token request returned no token".to_owned()))?;
        debug!(
            pod = %pod.name,
            namespace = %pod.namespace,
            service_account = %pod.service_account,
            "issued bound service account token"
        );
        Ok(SecretString::from(token))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn token_request_is_bound_to_pod() {
        let pod = PodIdentity {
            name: "app-0".to_owned(),
            namespace: "prod".to_owned(),
            uid: "0b7e".to_owned(),
            service_account: "app".to_owned(),
        };
        let request = token_request(&pod, Duration::from_secs(900));
        let bound = request.spec.bound_object_ref.unwrap();
        assert_eq!(bound.kind.as_deref(), Some("Pod"));
        assert_eq!(bound.api_version.as_deref(), Some("v1"));
        assert_eq!(bound.name.as_deref(), Some("app-0"));
        assert_eq!(bound.uid.as_deref(), Some("0b7e"));
        assert_eq!(request.spec.expiration_seconds, Some(900));
        assert!(request.spec.audiences.is_empty());
    }
}
