//! Vault Provider SDK
//!
//! Value types and seams shared by the secret-bundle resolution engine and its
//! collaborators:
//!
//! - [`models`]: secret references, resolved bundles, rotation stages, content
//!   encodings and authentication principals.
//! - [`api`]: the traits the engine talks through (`SecretClient`,
//!   `SecretClientFactory`, `ConfigProvider`, `ClusterLookup`).
//! - [`error`]: the error taxonomy, one enum per failure domain.
//!
//! Nothing in this crate performs I/O; concrete transports live in `cf-vault-provider`.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod models;

pub use api::{ClusterLookup, ConfigProvider, RemoteBundleContent, RemoteSecretBundle};
pub use api::{SecretClient, SecretClientFactory};
pub use error::{
    AuthConfigError, AuthError, DecodeError, FieldViolation, InvalidVersionNumber, LookupError,
    ResolutionError, SecretClientError, SigningError, UnknownPrincipalTypeError,
    UnknownStageError,
};
pub use models::{
    AuthConfig, AuthPrincipal, BundleSelector, ContentEncoding, PodIdentity, PrincipalKind,
    SecretBundle, SecretBundleContent, SecretReference, Stage, VaultId, VersionNumber,
};
