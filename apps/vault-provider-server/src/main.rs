#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]

mod config;
mod health;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info, warn};
use vault_provider::api::grpc::{CsiDriverProviderServer, ProviderServer};
use vault_provider::infra::{KubeClusterLookup, OciSecretClientFactory, ensure_crypto_provider};
use vault_provider::network::{listen_uds, set_socket_permissions};
use vault_provider::{MountService, SecretBundleService};

use crate::config::{AppConfig, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&cli);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    logging::init(&config.logging);
    ensure_crypto_provider();

    run(config).await.inspect_err(|e| {
        let chain = format!("{e:#}");
        error!(error = %chain, "provider stopped with error");
    })
}

async fn run(config: AppConfig) -> Result<()> {
    let AppConfig { server, vault, .. } = config;

    let (listener, socket_path) =
        listen_uds(&server.endpoint).context("failed to listen on socket")?;
    set_socket_permissions(&socket_path, server.endpoint_permissions)
        .context("failed to change socket file permissions")?;

    let vault = Arc::new(vault);
    let factory = OciSecretClientFactory::new(Arc::clone(&vault));
    let mounts = MountService::new(
        SecretBundleService::new(Arc::new(factory)),
        Arc::new(KubeClusterLookup::new()),
        vault.token_ttl(),
    )
    .with_timeout(server.mount_timeout());
    let provider = CsiDriverProviderServer::new(ProviderServer::new(Arc::new(mounts)));
    info!("created OCI vault provider server and registered with gRPC server");

    let cancel = CancellationToken::new();
    spawn_signal_watcher(cancel.clone());

    let health_listener = health::bind(server.healthz_port).await?;
    let health = tokio::spawn(health::serve(health_listener, cancel.clone()));

    info!(endpoint = %server.endpoint, "serving provider API");
    let grpc_cancel = cancel.clone();
    let served = Server::builder()
        .add_service(provider)
        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
            grpc_cancel.cancelled().await;
        })
        .await
        .context("gRPC server error");
    info!("server stopped serving requests");

    cancel.cancel();
    let health_result = health.await.context("health server task failed")?;
    remove_socket(&socket_path);

    served?;
    health_result
}

fn spawn_signal_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(name) => info!(signal = name, "caught signal, shutting down"),
            Err(e) => error!(error = %e, "signal handling failed, shutting down"),
        }
        cancel.cancel();
    });
}

async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for SIGINT")?;
            Ok("SIGINT")
        }
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

fn remove_socket(path: &Path) {
    info!(socket_path = %path.display(), "closing socket listener");
    match std::fs::remove_file(path) {
        Ok(()) => info!("closed socket listener"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => info!("socket is already closed"),
        Err(e) => warn!(error = %e, "failed to remove socket file"),
    }
}
