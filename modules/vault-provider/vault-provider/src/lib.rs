//! OCI Vault provider for the Secrets Store CSI driver.
//!
//! The driver calls [`api::grpc::ProviderServer`] over a unix socket for every
//! volume mount. A mount goes through [`domain::MountService`], which decodes
//! the request attributes, builds the authentication principal and hands the
//! batch to [`domain::SecretBundleService`]. The engine fetches every secret
//! through the [`vault_provider_sdk::SecretClientFactory`] seam, implemented
//! for OCI by [`infra::OciSecretClientFactory`].

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]

pub use vault_provider_sdk::{
    AuthPrincipal, ClusterLookup, PrincipalKind, ResolutionError, SecretBundle, SecretClient,
    SecretClientFactory, SecretReference, Stage, VaultId,
};

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod network;

pub use config::VaultConfig;
pub use domain::{ErrorClass, MountError, MountOutcome, MountService, SecretBundleService};
