//! Error types for the vault provider, one enum per failure domain.

use std::fmt;

use crate::models::PrincipalKind;

/// Stage token outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStageError(pub String);

/// Non-positive version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("version number should be positive, got {0}")]
pub struct InvalidVersionNumber(pub i64);

/// Principal discriminator outside `instance | user | workload`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown principal type: {0}")]
pub struct UnknownPrincipalTypeError(pub String);

/// Failure to turn bundle content into plaintext.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missed secret content")]
    EmptyContent,

    #[error("unsupported content encoding: \"{0}\"")]
    UnsupportedEncoding(String),

    #[error("malformed secret content: {0}")]
    MalformedEncoding(String),
}

/// A single missing or invalid auth-config field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub detail: &'static str,
}

impl FieldViolation {
    #[must_use]
    pub const fn required(field: &'static str, detail: &'static str) -> Self {
        Self { field, detail }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Required value: {}", self.field, self.detail)
    }
}

fn render_violations(violations: &[FieldViolation]) -> String {
    let rendered: Vec<String> = violations.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

/// Every violation found while validating a user auth config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_violations(.violations))]
pub struct AuthConfigError {
    pub violations: Vec<FieldViolation>,
}

impl AuthConfigError {
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

/// Errors from the external cluster lookups (secret read, token issuance).
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("cluster API unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Errors while signing a request for the vault.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("unable to sign request: {0}")]
    Signature(String),

    #[error("invalid request for signing: {0}")]
    InvalidRequest(String),
}

/// Errors while determining or building the authentication principal.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missed \"{0}\" SecretProviderClass parameter")]
    MissingAttribute(&'static str),

    #[error("invalid auth principal type, {0}")]
    UnknownPrincipalType(#[from] UnknownPrincipalTypeError),

    #[error("error retrieving secret: {secret}")]
    AuthSecretLookup {
        secret: String,
        #[source]
        source: LookupError,
    },

    #[error("auth config data is empty: {0}")]
    EmptyAuthConfig(String),

    #[error("invalid auth config data: {secret}: {reason}")]
    InvalidAuthConfig { secret: String, reason: String },

    #[error("invalid user auth config data: {0}: private key is missing")]
    MissingPrivateKey(String),

    #[error("missing auth config data: {0}")]
    IncompleteAuthConfig(#[from] AuthConfigError),

    #[error(
        "can not generate token for service account: {service_account}, namespace: {namespace}: {source}"
    )]
    TokenIssuance {
        service_account: String,
        namespace: String,
        #[source]
        source: LookupError,
    },

    #[error("unable to build {kind} principal credential: {reason}")]
    Credential { kind: PrincipalKind, reason: String },
}

impl AuthError {
    /// `true` when the failure stems from the caller's configuration rather than
    /// from an unavailable collaborator.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAttribute(_)
                | Self::UnknownPrincipalType(_)
                | Self::EmptyAuthConfig(_)
                | Self::InvalidAuthConfig { .. }
                | Self::MissingPrivateKey(_)
                | Self::IncompleteAuthConfig(_)
        )
    }

    #[must_use]
    pub fn credential(kind: PrincipalKind, reason: impl fmt::Display) -> Self {
        Self::Credential {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Errors from a single remote fetch.
#[derive(Debug, thiserror::Error)]
pub enum SecretClientError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("request not authorized: {0}")]
    Unauthorized(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Whole-batch resolution failure. Any variant means no bundles are returned.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("requested secrets are missed")]
    EmptyBatch,

    #[error("missed secret name")]
    MissingName,

    #[error("secret \"{name}\" should be identified either with a version number or with stage")]
    AmbiguousIdentifier { name: String },

    #[error("duplicated secret name: {0}")]
    DuplicateName(String),

    #[error("duplicated fileName name: {0}")]
    DuplicateAlias(String),

    #[error("unable to create configuration provider: {0}")]
    Principal(#[from] AuthError),

    #[error("unable to create vault client: {0}")]
    Client(#[source] SecretClientError),

    #[error("unable to retrieve secret \"{name}\" from vault: {source}")]
    Fetch {
        name: String,
        #[source]
        source: SecretClientError,
    },

    #[error("secret \"{name}\" has {source}")]
    UnknownStage {
        name: String,
        #[source]
        source: UnknownStageError,
    },

    #[error("unable to cast content of secret \"{name}\": unsupported content type \"{content_type}\"")]
    UnsupportedContent { name: String, content_type: String },
}
