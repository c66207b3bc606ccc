use std::time::Duration;

use vault_provider_sdk::{AuthError, DecodeError, ResolutionError};

/// Failure class surfaced to the CSI driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidArgument,
    NotFound,
    Internal,
}

/// Failure of a single mount invocation. Every variant is terminal for the call.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("failed to unmarshal SecretProviderClass parameters or attributes provided by driver: {0}")]
    AttributesDecode(String),

    #[error("missed \"{0}\" SecretProviderClass parameter")]
    MissingAttribute(&'static str),

    #[error("unable to handle SecretProviderClass secrets: {0}")]
    SecretSpec(String),

    #[error("failed to unmarshal file permission: {0}")]
    Permission(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("unable to retrieve secrets: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("unable to retrieve secrets: mount did not complete within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("unable to decode content of secret {path}: {source}")]
    ContentDecode {
        path: String,
        #[source]
        source: DecodeError,
    },
}

impl MountError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::AttributesDecode(_) | Self::MissingAttribute(_) | Self::SecretSpec(_) => {
                ErrorClass::InvalidArgument
            }
            Self::Auth(e) => {
                if e.is_configuration_error() {
                    ErrorClass::InvalidArgument
                } else {
                    ErrorClass::Internal
                }
            }
            Self::Resolution(_) | Self::Timeout(_) => ErrorClass::NotFound,
            Self::Permission(_) | Self::ContentDecode { .. } => ErrorClass::Internal,
        }
    }
}
