use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use vault_provider_sdk::{
    AuthPrincipal, BundleSelector, ContentEncoding, RemoteSecretBundle, ResolutionError,
    SecretBundle, SecretBundleContent, SecretClientFactory, SecretReference, Stage, VaultId,
};

/// Resolves a batch of secret references into bundles, all or nothing.
///
/// The service holds no per-call state; concurrent resolutions share only the factory.
pub struct SecretBundleService {
    factory: Arc<dyn SecretClientFactory>,
}

impl SecretBundleService {
    #[must_use]
    pub fn new(factory: Arc<dyn SecretClientFactory>) -> Self {
        Self { factory }
    }

    /// Fetches every reference from the vault, in request order.
    ///
    /// Batch checks (non-empty, unique output paths, per-reference selector) run
    /// before any credential is built or any request is sent.
    ///
    /// # Errors
    /// Returns the first [`ResolutionError`] encountered; no bundles are returned
    /// when any reference fails.
    #[instrument(skip_all, fields(vault_id = %vault_id, principal = %principal.kind(), count = requests.len()))]
    pub async fn resolve(
        &self,
        requests: &[SecretReference],
        principal: &AuthPrincipal,
        vault_id: &VaultId,
    ) -> Result<Vec<SecretBundle>, ResolutionError> {
        let selectors = validate_batch(requests)?;

        let provider = self.factory.create_config_provider(principal).await?;
        info!(principal = %provider.kind(), region = provider.region(), "created configuration provider");

        let client = self
            .factory
            .create_client(provider)
            .map_err(ResolutionError::Client)?;
        debug!("created vault client");

        let mut bundles = Vec::with_capacity(requests.len());
        for (reference, selector) in requests.iter().zip(selectors) {
            let remote = client
                .fetch_by_name(vault_id, &reference.name, selector)
                .await
                .map_err(|source| {
                    warn!(request = %reference, error = %source, "unable to retrieve secret from vault");
                    ResolutionError::Fetch {
                        name: reference.name.clone(),
                        source,
                    }
                })?;
            bundles.push(to_bundle(reference, remote)?);
        }

        info!(count = bundles.len(), "resolved secret bundles");
        Ok(bundles)
    }
}

/// Runs every pre-network check and returns one selector per reference.
fn validate_batch(requests: &[SecretReference]) -> Result<Vec<BundleSelector>, ResolutionError> {
    if requests.is_empty() {
        return Err(ResolutionError::EmptyBatch);
    }
    check_duplicates(requests)?;
    requests.iter().map(SecretReference::selector).collect()
}

/// The first reference whose output path was already taken is blamed.
///
/// A collision is a name clash only when both raw names equal the path; a
/// padded name that trims onto it counts as an alias clash.
fn check_duplicates(requests: &[SecretReference]) -> Result<(), ResolutionError> {
    let mut paths: HashMap<String, &str> = HashMap::with_capacity(requests.len());
    for reference in requests {
        let path = reference.effective_path();
        if let Some(earlier) = paths.get(&path) {
            return Err(if *earlier == path && reference.name == path {
                ResolutionError::DuplicateName(path)
            } else {
                ResolutionError::DuplicateAlias(path)
            });
        }
        paths.insert(path, &reference.name);
    }
    Ok(())
}

fn to_bundle(
    reference: &SecretReference,
    remote: RemoteSecretBundle,
) -> Result<SecretBundle, ResolutionError> {
    let content_type = remote.content.content_type;
    let encoding: ContentEncoding =
        content_type
            .parse()
            .map_err(|_| ResolutionError::UnsupportedContent {
                name: reference.name.clone(),
                content_type: content_type.clone(),
            })?;

    let stages = remote
        .stages
        .iter()
        .map(|token| token.parse::<Stage>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ResolutionError::UnknownStage {
            name: reference.name.clone(),
            source,
        })?;

    Ok(SecretBundle {
        id: remote.secret_id,
        name: reference.name.clone(),
        version_number: remote.version_number,
        stages,
        file_alias: reference.file_alias.clone(),
        content: SecretBundleContent::new(encoding, remote.content.content.unwrap_or_default()),
    })
}
