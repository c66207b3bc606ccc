use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoints and timeouts used when talking to the vault and identity services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Overrides `https://secrets.vaults.{region}.oci.oraclecloud.com`.
    #[serde(default)]
    pub secrets_endpoint: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_imds_endpoint")]
    pub imds_endpoint: String,
    /// Overrides `https://auth.{region}.oraclecloud.com`.
    #[serde(default)]
    pub federation_endpoint: Option<String>,
    /// Overrides `https://$KUBERNETES_SERVICE_HOST:12250`.
    #[serde(default)]
    pub workload_token_endpoint: Option<String>,
    /// Overrides `OCI_RESOURCE_PRINCIPAL_REGION`.
    #[serde(default)]
    pub workload_region: Option<String>,
    #[serde(default = "default_cluster_ca_cert")]
    pub cluster_ca_cert: PathBuf,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            secrets_endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
            imds_endpoint: default_imds_endpoint(),
            federation_endpoint: None,
            workload_token_endpoint: None,
            workload_region: None,
            cluster_ca_cert: default_cluster_ca_cert(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl VaultConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_imds_endpoint() -> String {
    "http://169.254.169.254/opc/v2".to_owned()
}

fn default_cluster_ca_cert() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")
}

fn default_token_ttl_secs() -> u64 {
    15 * 60
}
