use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tonic::{Code, Request, Response, Status};
use tracing::{debug, info};

use super::proto::{
    File, MountRequest, MountResponse, ObjectVersion, VersionRequest, VersionResponse,
};
use super::proto::csi_driver_provider_server::CsiDriverProvider;
use crate::domain::{ErrorClass, MountError, MountOutcome, MountService};

pub const API_VERSION: &str = "v1alpha1";
pub const RUNTIME_NAME: &str = "oci-secrets-store-csi-driver-provider";

/// Provider API backed by the mount orchestrator.
pub struct ProviderServer {
    mounts: Arc<MountService>,
}

impl ProviderServer {
    #[must_use]
    pub fn new(mounts: Arc<MountService>) -> Self {
        Self { mounts }
    }
}

fn to_status(error: &MountError) -> Status {
    let code = match error.class() {
        ErrorClass::InvalidArgument => Code::InvalidArgument,
        ErrorClass::NotFound => Code::NotFound,
        ErrorClass::Internal => Code::Internal,
    };
    Status::new(code, error.to_string())
}

fn to_response(outcome: MountOutcome) -> MountResponse {
    MountResponse {
        object_version: outcome
            .versions
            .into_iter()
            .map(|v| ObjectVersion {
                id: v.id,
                version: v.version,
            })
            .collect(),
        error: None,
        files: outcome
            .files
            .into_iter()
            .map(|f| File {
                path: f.path,
                mode: f.mode,
                contents: f.contents,
            })
            .collect(),
    }
}

fn log_call<T>(method: &str, started: Instant, result: &Result<T, Status>) {
    let (code, message) = match result {
        Ok(_) => (Code::Ok, ""),
        Err(status) => (status.code(), status.message()),
    };
    info!(
        method,
        duration_ms = started.elapsed().as_millis(),
        code = ?code,
        message,
        "grpc request handled"
    );
}

#[async_trait]
impl CsiDriverProvider for ProviderServer {
    async fn version(
        &self,
        _request: Request<VersionRequest>,
    ) -> Result<Response<VersionResponse>, Status> {
        let started = Instant::now();
        let result = Ok(VersionResponse {
            version: API_VERSION.to_owned(),
            runtime_name: RUNTIME_NAME.to_owned(),
            runtime_version: env!("CARGO_PKG_VERSION").to_owned(),
        });
        log_call("Version", started, &result);
        result.map(Response::new)
    }

    async fn mount(&self, request: Request<MountRequest>) -> Result<Response<MountResponse>, Status> {
        let started = Instant::now();
        let deadline = request
            .metadata()
            .get("grpc-timeout")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let request = request.into_inner();
        debug!(target_path = %request.target_path, deadline, "mount request");

        let result = self
            .mounts
            .handle_mount(&request.attributes, &request.permission)
            .await
            .map(to_response)
            .map_err(|e| to_status(&e));
        log_call("Mount", started, &result);
        result.map(Response::new)
    }
}
