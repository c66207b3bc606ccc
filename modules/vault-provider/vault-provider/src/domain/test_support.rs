//! In-memory substitutes for the vault and cluster seams.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use vault_provider_sdk::{
    AuthError, AuthPrincipal, BundleSelector, ClusterLookup, ConfigProvider, LookupError,
    PodIdentity, PrincipalKind, RemoteBundleContent, RemoteSecretBundle, SecretClient,
    SecretClientError, SecretClientFactory, SigningError, VaultId,
};

/// A remote bundle at stage `CURRENT` with base64 content.
#[must_use]
pub fn remote_bundle(id: &str, version: i64, content: &str) -> RemoteSecretBundle {
    RemoteSecretBundle {
        secret_id: id.to_owned(),
        version_number: version,
        stages: vec!["CURRENT".to_owned()],
        content: RemoteBundleContent {
            content_type: "BASE64".to_owned(),
            content: Some(content.to_owned()),
        },
    }
}

/// One recorded fetch: vault, secret name and selector.
pub type RecordedFetch = (VaultId, String, BundleSelector);

#[derive(Default)]
struct FetchLog {
    fetches: AtomicUsize,
    requests: Mutex<Vec<RecordedFetch>>,
}

/// Fake vault acting as both [`SecretClientFactory`] and [`SecretClient`].
///
/// Secrets are keyed by name and served for any selector. Unknown names yield
/// [`SecretClientError::NotFound`].
#[derive(Default)]
pub struct FakeVault {
    secrets: Arc<HashMap<String, RemoteSecretBundle>>,
    fetch_delay: Option<Duration>,
    log: Arc<FetchLog>,
    fail_client: bool,
    fail_provider: bool,
    providers: AtomicUsize,
    principals: Mutex<Vec<PrincipalKind>>,
}

impl FakeVault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, name: &str, bundle: RemoteSecretBundle) -> Self {
        Arc::make_mut(&mut self.secrets).insert(name.to_owned(), bundle);
        self
    }

    /// Delays every fetch, for deadline tests.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn failing_client(mut self) -> Self {
        self.fail_client = true;
        self
    }

    #[must_use]
    pub fn failing_provider(mut self) -> Self {
        self.fail_provider = true;
        self
    }

    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.log.fetches.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedFetch> {
        self.log
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Principal kinds seen by `create_config_provider`, in call order.
    #[must_use]
    pub fn principals(&self) -> Vec<PrincipalKind> {
        self.principals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct FakeConfigProvider {
    kind: PrincipalKind,
}

impl ConfigProvider for FakeConfigProvider {
    fn region(&self) -> &str {
        "us-ashburn-1"
    }

    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    fn sign_request(
        &self,
        _method: &http::Method,
        _uri: &http::Uri,
        _headers: &mut http::HeaderMap,
        _body: &[u8],
    ) -> Result<(), SigningError> {
        Ok(())
    }
}

struct FakeSecretClient {
    secrets: Arc<HashMap<String, RemoteSecretBundle>>,
    fetch_delay: Option<Duration>,
    log: Arc<FetchLog>,
}

#[async_trait]
impl SecretClient for FakeSecretClient {
    async fn fetch_by_name(
        &self,
        vault_id: &VaultId,
        secret_name: &str,
        selector: BundleSelector,
    ) -> Result<RemoteSecretBundle, SecretClientError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.log.fetches.fetch_add(1, Ordering::SeqCst);
        self.log
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((vault_id.clone(), secret_name.to_owned(), selector));

        self.secrets.get(secret_name).cloned().ok_or_else(|| {
            SecretClientError::NotFound(format!("404 NotAuthorizedOrNotFound: {secret_name}"))
        })
    }
}

#[async_trait]
impl SecretClientFactory for FakeVault {
    async fn create_config_provider(
        &self,
        principal: &AuthPrincipal,
    ) -> Result<Arc<dyn ConfigProvider>, AuthError> {
        self.providers.fetch_add(1, Ordering::SeqCst);
        self.principals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(principal.kind());
        if self.fail_provider {
            return Err(AuthError::credential(
                principal.kind(),
                "metadata service unreachable",
            ));
        }
        Ok(Arc::new(FakeConfigProvider {
            kind: principal.kind(),
        }))
    }

    fn create_client(
        &self,
        _provider: Arc<dyn ConfigProvider>,
    ) -> Result<Arc<dyn SecretClient>, SecretClientError> {
        if self.fail_client {
            return Err(SecretClientError::Transport(
                "failed to build HTTP client".to_owned(),
            ));
        }
        Ok(Arc::new(FakeSecretClient {
            secrets: Arc::clone(&self.secrets),
            fetch_delay: self.fetch_delay,
            log: Arc::clone(&self.log),
        }))
    }
}

/// Fake cluster API with canned secrets and a fixed token.
#[derive(Default)]
pub struct FakeClusterLookup {
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
    token: Option<String>,
    issued: Mutex<Vec<(PodIdentity, Duration)>>,
    reads: AtomicUsize,
}

impl FakeClusterLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, namespace: &str, name: &str, data: &[(&str, &[u8])]) -> Self {
        let data = data
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.to_vec()))
            .collect();
        self.secrets
            .insert((namespace.to_owned(), name.to_owned()), data);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Pods and TTLs tokens were issued for, in call order.
    #[must_use]
    pub fn issued(&self) -> Vec<(PodIdentity, Duration)> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ClusterLookup for FakeClusterLookup {
    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, LookupError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .ok_or_else(|| LookupError::NotFound(format!("secret {namespace}/{name}")))
    }

    async fn issue_token(
        &self,
        pod: &PodIdentity,
        ttl: Duration,
    ) -> Result<SecretString, LookupError> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pod.clone(), ttl));
        self.token
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| {
                LookupError::Unavailable(format!(
                    "serviceaccounts \"{}\" is forbidden",
                    pod.service_account
                ))
            })
    }
}
