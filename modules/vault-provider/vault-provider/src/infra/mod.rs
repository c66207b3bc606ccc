pub mod factory;
pub mod k8s;
pub mod principal;
pub mod signer;
pub mod vault_client;

pub use factory::OciSecretClientFactory;
pub use k8s::KubeClusterLookup;
pub use principal::{PrincipalResolver, SigningCredential};
pub use vault_client::OciSecretsClient;

/// Installs the aws-lc-rs rustls provider once per process.
pub fn ensure_crypto_provider() {
    // Already installed is fine.
    _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
