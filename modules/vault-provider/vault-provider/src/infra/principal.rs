//! Principal resolution: turns an [`AuthPrincipal`] into a request-signing credential.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Uri};
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vault_provider_sdk::{
    AuthConfig, AuthError, AuthPrincipal, ConfigProvider, PodIdentity, PrincipalKind, SigningError,
};

use super::signer::{RequestSigner, SigningKey, sha256_fingerprint};
use crate::config::VaultConfig;

const METADATA_AUTHORIZATION: &str = "Bearer Oracle";
const TENANT_OU_PREFIX: &str = "opc-tenant:";
const IDENTITY_O_PREFIX: &str = "opc-identity:";
const SECURITY_TOKEN_PREFIX: &str = "ST$";
const WORKLOAD_PROXY_PORT: u16 = 12250;
const WORKLOAD_REGION_ENV: &str = "OCI_RESOURCE_PRINCIPAL_REGION";
const KUBERNETES_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// A credential able to sign vault requests on behalf of one principal.
#[derive(Debug)]
pub struct SigningCredential {
    kind: PrincipalKind,
    region: String,
    signer: RequestSigner,
}

impl SigningCredential {
    #[must_use]
    pub fn new(
        kind: PrincipalKind,
        region: impl Into<String>,
        key_id: impl Into<String>,
        key: SigningKey,
    ) -> Self {
        Self {
            kind,
            region: region.into(),
            signer: RequestSigner::new(key_id, key),
        }
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        self.signer.key_id()
    }
}

impl ConfigProvider for SigningCredential {
    fn region(&self) -> &str {
        &self.region
    }

    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    fn sign_request(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &mut HeaderMap,
        body: &[u8],
    ) -> Result<(), SigningError> {
        self.signer.sign(method, uri, headers, body)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct X509FederationRequest {
    certificate: String,
    public_key: String,
    intermediate_certificates: Vec<String>,
    purpose: &'static str,
    fingerprint_algorithm: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodKeyRequest {
    pod_key: String,
}

#[derive(Deserialize)]
struct SecurityToken {
    token: String,
}

/// Builds signing credentials for the three principal kinds.
///
/// Every HTTP client it creates is bounded by the configured request timeout.
#[derive(Debug, Clone)]
pub struct PrincipalResolver {
    config: Arc<VaultConfig>,
}

impl PrincipalResolver {
    #[must_use]
    pub fn new(config: Arc<VaultConfig>) -> Self {
        Self { config }
    }

    /// # Errors
    /// Returns [`AuthError::Credential`] when the credential cannot be built.
    pub async fn resolve(&self, principal: &AuthPrincipal) -> Result<SigningCredential, AuthError> {
        let credential = match principal {
            AuthPrincipal::Instance => self.instance_credential().await?,
            AuthPrincipal::User(config) => user_credential(config)?,
            AuthPrincipal::Workload {
                service_account_token,
                pod,
            } => self.workload_credential(service_account_token, pod).await?,
        };
        info!(
            principal = %credential.kind,
            region = %credential.region,
            "built signing credential"
        );
        Ok(credential)
    }

    fn http_client(
        &self,
        kind: PrincipalKind,
        root: Option<reqwest::Certificate>,
    ) -> Result<reqwest::Client, AuthError> {
        let mut builder = reqwest::Client::builder().timeout(self.config.request_timeout());
        if let Some(root) = root {
            builder = builder.add_root_certificate(root);
        }
        builder
            .build()
            .map_err(|e| AuthError::credential(kind, format!("failed to build HTTP client: {e}")))
    }

    async fn instance_credential(&self) -> Result<SigningCredential, AuthError> {
        let kind = PrincipalKind::Instance;
        let fail = |reason: String| AuthError::credential(kind, reason);
        let client = self.http_client(kind, None)?;

        let leaf_pem = self.metadata(&client, "identity/cert.pem").await?;
        let intermediate_pem = self.metadata(&client, "identity/intermediate.pem").await?;
        let key_pem = self.metadata(&client, "identity/key.pem").await?;
        let region = self
            .metadata(&client, "instance/canonicalRegionName")
            .await?
            .trim()
            .to_owned();

        let leaf = certificate_der(&leaf_pem).map_err(&fail)?;
        let intermediate = certificate_der(&intermediate_pem).map_err(&fail)?;
        let tenancy = tenancy_from_certificate(&leaf).map_err(&fail)?;
        let instance_key =
            SigningKey::from_pem(key_pem.as_bytes(), None).map_err(|e| fail(e.to_string()))?;
        let session_key = SigningKey::generate().map_err(|e| fail(e.to_string()))?;

        let federation_signer = RequestSigner::new(
            format!("{tenancy}/fed-x509-sha256/{}", sha256_fingerprint(&leaf)),
            instance_key,
        );
        let request = X509FederationRequest {
            certificate: STANDARD.encode(&leaf),
            public_key: STANDARD.encode(session_key.public_key_spki_der()),
            intermediate_certificates: vec![STANDARD.encode(&intermediate)],
            purpose: "DEFAULT",
            fingerprint_algorithm: "SHA256",
        };
        let base = self
            .config
            .federation_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://auth.{region}.oraclecloud.com"));
        let url = format!("{}/v1/x509", base.trim_end_matches('/'));

        let token = federate(&client, &url, &request, &federation_signer)
            .await
            .map_err(fail)?;
        debug!(%tenancy, %region, "exchanged instance certificate for a security token");

        Ok(SigningCredential::new(
            kind,
            region,
            security_key_id(&token),
            session_key,
        ))
    }

    async fn metadata(&self, client: &reqwest::Client, path: &str) -> Result<String, AuthError> {
        let fail = |reason: String| AuthError::credential(PrincipalKind::Instance, reason);
        let url = format!(
            "{}/{path}",
            self.config.imds_endpoint.trim_end_matches('/')
        );
        let response = client
            .get(&url)
            .header(AUTHORIZATION, METADATA_AUTHORIZATION)
            .send()
            .await
            .map_err(|e| fail(format!("metadata request {path} failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| fail(format!("metadata response {path} unreadable: {e}")))?;
        if !status.is_success() {
            return Err(fail(format!("metadata request {path} returned {status}")));
        }
        Ok(body)
    }

    async fn workload_credential(
        &self,
        service_account_token: &SecretString,
        pod: &PodIdentity,
    ) -> Result<SigningCredential, AuthError> {
        let kind = PrincipalKind::Workload;
        let fail = |reason: String| AuthError::credential(kind, reason);

        let region = self
            .config
            .workload_region
            .clone()
            .or_else(|| std::env::var(WORKLOAD_REGION_ENV).ok())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| fail(format!("{WORKLOAD_REGION_ENV} is not set")))?;
        let endpoint = self.workload_endpoint().map_err(&fail)?;
        let root = self.cluster_root_certificate().await.map_err(&fail)?;
        let client = self.http_client(kind, root)?;
        let session_key = SigningKey::generate().map_err(|e| fail(e.to_string()))?;

        let request = PodKeyRequest {
            pod_key: STANDARD.encode(session_key.public_key_spki_der()),
        };
        let response = client
            .post(format!("{endpoint}/resourcePrincipalSessionTokens"))
            .bearer_auth(service_account_token.expose_secret())
            .header("opc-request-id", uuid::Uuid::new_v4().simple().to_string())
            .json(&request)
            .send()
            .await
            .map_err(|e| fail(format!("token exchange failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| fail(format!("token exchange response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(fail(format!("token exchange returned {status}: {body}")));
        }

        let token = decode_workload_token(&body).map_err(fail)?;
        debug!(
            pod = %pod.name,
            namespace = %pod.namespace,
            "exchanged service account token for a resource principal session token"
        );

        Ok(SigningCredential::new(
            kind,
            region,
            security_key_id(&token),
            session_key,
        ))
    }

    fn workload_endpoint(&self) -> Result<String, String> {
        if let Some(endpoint) = &self.config.workload_token_endpoint {
            return Ok(endpoint.trim_end_matches('/').to_owned());
        }
        let host = std::env::var(KUBERNETES_HOST_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| format!("{KUBERNETES_HOST_ENV} is not set"))?;
        if host.contains(':') {
            Ok(format!("https://[{host}]:{WORKLOAD_PROXY_PORT}"))
        } else {
            Ok(format!("https://{host}:{WORKLOAD_PROXY_PORT}"))
        }
    }

    async fn cluster_root_certificate(&self) -> Result<Option<reqwest::Certificate>, String> {
        let path = &self.config.cluster_ca_cert;
        match tokio::fs::read(path).await {
            Ok(pem) => reqwest::Certificate::from_pem(&pem)
                .map(Some)
                .map_err(|e| format!("invalid cluster CA {}: {e}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "cluster CA not present, using system roots");
                Ok(None)
            }
            Err(e) => Err(format!("unable to read cluster CA {}: {e}", path.display())),
        }
    }
}

fn user_credential(config: &AuthConfig) -> Result<SigningCredential, AuthError> {
    let kind = PrincipalKind::User;
    let passphrase = config.passphrase.as_ref().map(ExposeSecret::expose_secret);
    let key = SigningKey::from_pem(config.private_key.expose_secret().as_bytes(), passphrase)
        .map_err(|e| AuthError::credential(kind, e))?;
    Ok(SigningCredential::new(
        kind,
        config.region.clone(),
        format!("{}/{}/{}", config.tenancy, config.user, config.fingerprint),
        key,
    ))
}

async fn federate(
    client: &reqwest::Client,
    url: &str,
    request: &X509FederationRequest,
    signer: &RequestSigner,
) -> Result<String, String> {
    let body = serde_json::to_vec(request).map_err(|e| e.to_string())?;
    let uri: Uri = url
        .parse()
        .map_err(|e| format!("invalid federation endpoint {url}: {e}"))?;
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    signer
        .sign(&Method::POST, &uri, &mut headers, &body)
        .map_err(|e| e.to_string())?;

    let response = client
        .post(url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| format!("federation request failed: {e}"))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(format!("federation endpoint returned {status}: {text}"));
    }
    let token: SecurityToken = response
        .json()
        .await
        .map_err(|e| format!("invalid federation response: {e}"))?;
    Ok(token.token)
}

fn security_key_id(token: &str) -> String {
    let token = token.strip_prefix(SECURITY_TOKEN_PREFIX).unwrap_or(token);
    format!("{SECURITY_TOKEN_PREFIX}{token}")
}

/// The proxy answers with a JSON string holding base64 of `{"token": "ST$..."}`.
fn decode_workload_token(body: &str) -> Result<String, String> {
    let encoded: String = serde_json::from_str(body)
        .unwrap_or_else(|_| body.trim().trim_matches('"').to_owned());
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("token response is not base64: {e}"))?;
    let token: SecurityToken = serde_json::from_slice(&decoded)
        .map_err(|e| format!("token response is malformed: {e}"))?;
    Ok(token.token)
}

fn certificate_der(pem: &str) -> Result<Vec<u8>, String> {
    CertificateDer::from_pem_slice(pem.as_bytes())
        .map(|der| der.as_ref().to_vec())
        .map_err(|e| format!("invalid certificate PEM: {e}"))
}

/// Tenancy id from the `opc-tenant:` OU or, failing that, the `opc-identity:` O.
fn tenancy_from_certificate(der: &[u8]) -> Result<String, String> {
    let (_, certificate) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| format!("failed to parse X.509 certificate: {e}"))?;
    let subject = certificate.subject();

    let tagged = |values: Vec<&str>, prefix: &str| {
        values
            .into_iter()
            .find_map(|v| v.strip_prefix(prefix).map(str::to_owned))
    };
    let units = subject
        .iter_organizational_unit()
        .filter_map(|attr| attr.as_str().ok())
        .collect();
    let organizations = subject
        .iter_organization()
        .filter_map(|attr| attr.as_str().ok())
        .collect();

    tagged(units, TENANT_OU_PREFIX)
        .or_else(|| tagged(organizations, IDENTITY_O_PREFIX))
        .ok_or_else(|| "certificate subject carries no tenancy id".to_owned())
}
