//! GCP API interaction module
//!
//! - [`auth`] - credentials (ADC or a static access token)
//! - [`client`] - authenticated client and per-service URL builders
//! - [`http`] - REST plumbing and API error decoding
//! - [`operations`] - long-running operation status decoding
//! - [`projects`] - project lookup and teardown
//! - [`zones`] - zone and region discovery

pub mod auth;
pub mod client;
pub mod http;
pub mod operations;
pub mod projects;
pub mod zones;
