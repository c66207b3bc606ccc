//! `OciSecretsClient` - signed `GetSecretBundleByName` calls against the OCI Secrets API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::ACCEPT;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::Deserialize;
use tracing::debug;
use vault_provider_sdk::{
    BundleSelector, ConfigProvider, RemoteBundleContent, RemoteSecretBundle, SecretClient,
    SecretClientError, SigningError, VaultId,
};

const API_VERSION: &str = "20190301";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretBundleDto {
    secret_id: String,
    version_number: i64,
    #[serde(default)]
    stages: Vec<String>,
    #[serde(default)]
    secret_bundle_content: Option<SecretBundleContentDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretBundleContentDto {
    content_type: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceErrorDto {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl From<SecretBundleDto> for RemoteSecretBundle {
    fn from(dto: SecretBundleDto) -> Self {
        Self {
            secret_id: dto.secret_id,
            version_number: dto.version_number,
            stages: dto.stages,
            content: dto
                .secret_bundle_content
                .map(|c| RemoteBundleContent {
                    content_type: c.content_type,
                    content: c.content,
                })
                .unwrap_or_default(),
        }
    }
}

/// Remote vault client. One instance per resolution; it owns its credential.
pub struct OciSecretsClient {
    http_client: reqwest::Client,
    endpoint: String,
    provider: Arc<dyn ConfigProvider>,
}

impl OciSecretsClient {
    /// Creates a client for the provider's region, or for `endpoint` when given.
    ///
    /// # Errors
    /// Returns [`SecretClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SecretClientError> {
        let endpoint = endpoint.map_or_else(
            || format!("https://secrets.vaults.{}.oci.oraclecloud.com", provider.region()),
            |e| e.trim_end_matches('/').to_owned(),
        );
        debug!(%endpoint, ?timeout, "creating OCI secrets client");

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SecretClientError::Transport(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            endpoint,
            provider,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_url(
        &self,
        vault_id: &VaultId,
        secret_name: &str,
        selector: BundleSelector,
    ) -> Result<reqwest::Url, SecretClientError> {
        let selector_param = match selector {
            BundleSelector::Stage(stage) => ("stage", stage.to_string()),
            BundleSelector::Version(version) => ("versionNumber", version.to_string()),
        };
        let params = [
            ("secretName", secret_name.to_owned()),
            ("vaultId", vault_id.as_str().to_owned()),
            selector_param,
        ];
        reqwest::Url::parse_with_params(
            &format!(
                "{}/{API_VERSION}/secretbundles/actions/getByName",
                self.endpoint
            ),
            &params,
        )
        .map_err(|e| SigningError::InvalidRequest(format!("invalid vault endpoint: {e}")).into())
    }

    fn map_reqwest_error(error: &reqwest::Error) -> SecretClientError {
        if error.is_decode() {
            SecretClientError::InvalidResponse(error.to_string())
        } else {
            SecretClientError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl SecretClient for OciSecretsClient {
    async fn fetch_by_name(
        &self,
        vault_id: &VaultId,
        secret_name: &str,
        selector: BundleSelector,
    ) -> Result<RemoteSecretBundle, SecretClientError> {
        let url = self.request_url(vault_id, secret_name, selector)?;
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| SigningError::InvalidRequest(format!("invalid request URI: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        self.provider
            .sign_request(&Method::GET, &uri, &mut headers, &[])?;

        debug!(secret = secret_name, %selector, "fetching secret bundle");
        let response = self
            .http_client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(&e))?;

        let status = response.status();
        if status.is_success() {
            let dto: SecretBundleDto = response
                .json()
                .await
                .map_err(|e| SecretClientError::InvalidResponse(e.to_string()))?;
            return Ok(dto.into());
        }

        let body = response.text().await.unwrap_or_default();
        let error: ServiceErrorDto = serde_json::from_str(&body).unwrap_or_default();
        let detail = if error.message.is_empty() {
            format!("{status}")
        } else {
            format!("{status} {}: {}", error.code, error.message)
        };
        Err(match status {
            StatusCode::NOT_FOUND => SecretClientError::NotFound(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SecretClientError::Unauthorized(detail)
            }
            _ => SecretClientError::Transport(detail),
        })
    }
}
