use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};
use vault_provider_sdk::{AuthError, AuthPrincipal, ClusterLookup, PrincipalKind, SecretBundle};

use super::attributes::{MountAttributes, parse_auth_config};
use super::error::MountError;
use super::model::{MountOutcome, MountedFile, SecretVersion};
use super::service::SecretBundleService;

/// Handles one volume mount: attributes in, files and versions out.
pub struct MountService {
    engine: SecretBundleService,
    lookup: Arc<dyn ClusterLookup>,
    token_ttl: Duration,
    timeout: Option<Duration>,
}

impl MountService {
    #[must_use]
    pub fn new(
        engine: SecretBundleService,
        lookup: Arc<dyn ClusterLookup>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            engine,
            lookup,
            token_ttl,
            timeout: None,
        }
    }

    /// Bounds the resolution of each mount. In-flight fetches are dropped on expiry.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the secrets requested by `attributes` and returns them as files
    /// with mode `permission`.
    ///
    /// `permission` is the JSON-encoded file mode sent by the driver.
    ///
    /// # Errors
    /// Returns [`MountError`]; see [`MountError::class`] for how failures are
    /// reported to the driver.
    #[instrument(skip_all)]
    pub async fn handle_mount(
        &self,
        attributes: &str,
        permission: &str,
    ) -> Result<MountOutcome, MountError> {
        let attributes = MountAttributes::parse(attributes)?;
        let references = attributes.secret_references()?;
        let vault_id = attributes.vault_id()?;
        let mode = parse_permission(permission)?;

        let principal = self.resolve_principal(&attributes).await.inspect_err(|e| {
            error!(error = %e, "unable to handle SecretProviderClass auth parameters");
        })?;

        let resolution = self.engine.resolve(&references, &principal, &vault_id);
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, resolution)
                .await
                .map_err(|_| MountError::Timeout(limit))
                .and_then(|result| result.map_err(MountError::from)),
            None => resolution.await.map_err(MountError::from),
        };
        let bundles = outcome.inspect_err(|e| {
            info!(
                pod = attributes.pod_name(),
                secret_provider_class = attributes.secret_provider_class(),
                error = %e,
                "unable to retrieve all secrets"
            );
        })?;
        info!(
            pod = attributes.pod_name(),
            secret_provider_class = attributes.secret_provider_class(),
            "successfully found requested secrets"
        );

        assemble(&bundles, mode)
    }

    async fn resolve_principal(
        &self,
        attributes: &MountAttributes,
    ) -> Result<AuthPrincipal, AuthError> {
        match attributes.principal_kind()? {
            PrincipalKind::Instance => Ok(AuthPrincipal::Instance),
            PrincipalKind::User => {
                let secret_name = attributes.auth_secret_name()?;
                let data = self
                    .lookup
                    .read_secret(attributes.pod_namespace(), secret_name)
                    .await
                    .map_err(|source| AuthError::AuthSecretLookup {
                        secret: secret_name.to_owned(),
                        source,
                    })?;
                info!(secret = secret_name, "auth config secret retrieved from kubernetes API");
                Ok(AuthPrincipal::User(parse_auth_config(secret_name, data)?))
            }
            PrincipalKind::Workload => {
                let pod = attributes.pod_identity();
                let service_account_token = self
                    .lookup
                    .issue_token(&pod, self.token_ttl)
                    .await
                    .map_err(|source| AuthError::TokenIssuance {
                        service_account: pod.service_account.clone(),
                        namespace: pod.namespace.clone(),
                        source,
                    })?;
                Ok(AuthPrincipal::Workload {
                    service_account_token,
                    pod,
                })
            }
        }
    }
}

const MAX_FILE_MODE: u32 = 0o7777;

fn parse_permission(permission: &str) -> Result<i32, MountError> {
    let mode: u32 =
        serde_json::from_str(permission).map_err(|e| MountError::Permission(e.to_string()))?;
    if mode > MAX_FILE_MODE {
        return Err(MountError::Permission(format!(
            "file mode {mode:o} exceeds {MAX_FILE_MODE:o}"
        )));
    }
    i32::try_from(mode).map_err(|e| MountError::Permission(e.to_string()))
}

/// Decodes every bundle; output arrays share indices with `bundles`.
fn assemble(bundles: &[SecretBundle], mode: i32) -> Result<MountOutcome, MountError> {
    let mut outcome = MountOutcome {
        files: Vec::with_capacity(bundles.len()),
        versions: Vec::with_capacity(bundles.len()),
    };
    for bundle in bundles {
        let path = bundle.effective_path();
        let contents = bundle
            .content
            .decode()
            .map_err(|source| MountError::ContentDecode {
                path: path.clone(),
                source,
            })?;
        outcome.files.push(MountedFile {
            path,
            contents,
            mode,
        });
        outcome.versions.push(SecretVersion {
            id: bundle.id.clone(),
            version: bundle.version_number.to_string(),
        });
    }
    Ok(outcome)
}
