//! Messages and service stubs of the `v1alpha1` Secrets Store CSI driver
//! provider protocol, generated from `proto/v1alpha1/service.proto`.
//!
//! Field numbers are fixed by the driver and must not change.

#![allow(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::restriction,
    unreachable_pub
)]

tonic::include_proto!("v1alpha1");
