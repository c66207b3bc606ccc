//! Driver-facing gRPC surface.

pub mod proto;
pub mod server;

pub use proto::csi_driver_provider_client::CsiDriverProviderClient;
pub use proto::csi_driver_provider_server::{CsiDriverProvider, CsiDriverProviderServer};
pub use server::ProviderServer;
