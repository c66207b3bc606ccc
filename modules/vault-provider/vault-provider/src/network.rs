//! Socket endpoint handling for the driver-facing listener.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("endpoint {0} is not a unix domain socket")]
    NotUnixSocket(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl NetworkError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A parsed `unix://` or `tcp://` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEndpoint {
    Unix(PathBuf),
    Tcp(String),
}

/// Splits `unix://path` or `tcp://addr`. The scheme is matched case-insensitively.
///
/// # Errors
/// Returns [`NetworkError::InvalidEndpoint`] for other schemes or an empty address.
pub fn parse_socket_endpoint(endpoint: &str) -> Result<SocketEndpoint, NetworkError> {
    let invalid = || NetworkError::InvalidEndpoint(endpoint.to_owned());
    let (scheme, addr) = endpoint.split_once("://").ok_or_else(invalid)?;
    if addr.is_empty() {
        return Err(invalid());
    }
    match scheme.to_ascii_lowercase().as_str() {
        "unix" => Ok(SocketEndpoint::Unix(PathBuf::from(addr))),
        "tcp" => Ok(SocketEndpoint::Tcp(addr.to_owned())),
        _ => Err(invalid()),
    }
}

/// Binds a unix domain socket at `endpoint`, replacing any socket file left by a
/// previous run.
///
/// # Errors
/// Returns [`NetworkError`] when the endpoint is not `unix://`, the stale file
/// cannot be removed, or the bind fails.
pub fn listen_uds(endpoint: &str) -> Result<(UnixListener, PathBuf), NetworkError> {
    let SocketEndpoint::Unix(path) = parse_socket_endpoint(endpoint)? else {
        return Err(NetworkError::NotUnixSocket(endpoint.to_owned()));
    };

    remove_stale_socket(&path)?;
    info!(socket_path = %path.display(), "opening unix domain socket");
    let listener = UnixListener::bind(&path)
        .map_err(|e| NetworkError::io(format!("failed to bind {}", path.display()), e))?;
    Ok((listener, path))
}

fn remove_stale_socket(path: &Path) -> Result<(), NetworkError> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => {
            info!(socket_path = %path.display(), "cleaning up pre-existing unix socket");
            std::fs::remove_file(path).map_err(|e| {
                NetworkError::io(
                    "failed to clean up pre-existing file at unix socket location",
                    e,
                )
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(NetworkError::io(
            "failed to check for existence of unix socket",
            e,
        )),
    }
}

/// # Errors
/// Returns [`NetworkError::Io`] when the mode cannot be applied.
pub fn set_socket_permissions(path: &Path, mode: u32) -> Result<(), NetworkError> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        NetworkError::io(
            format!("failed to set permissions on {}", path.display()),
            e,
        )
    })
}
