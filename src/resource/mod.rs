//! Resource abstraction layer
//!
//! Every kind of GCP resource the tool can delete implements [`Resource`].
//! The pieces around it:
//!
//! - [`inventory`] - concurrency-safe cache of the instances found by `list`
//! - [`registry`] - the set of resource types known to a run
//! - [`poller`] - poll-until-done state machine for long-running operations
//! - [`classify`] - transient vs fatal errors, "API not enabled" detection
//! - [`services`] - the concrete resource types
//!
//! # Example
//!
//! ```ignore
//! use gcp_nuke::resource::Registry;
//!
//! async fn dry_run(client: &GcpClient, config: Arc<RunConfig>) -> anyhow::Result<()> {
//!     let resources = Registry::with_defaults(client).configured(config)?;
//!     for (name, resource) in &resources {
//!         println!("{}: {:?}", name, resource.list(true).await?);
//!     }
//!     Ok(())
//! }
//! ```

mod base;
pub mod classify;
pub mod inventory;
pub mod poller;
mod registry;
pub mod services;

use crate::config::RunConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use base::{remove_each, ResourceBase};
pub use inventory::{Inventory, ResourceProperties};
pub use poller::{OperationPoller, OperationState, OperationStatus, OperationTarget};
pub use registry::Registry;

/// Lifecycle contract of a deletable resource type
#[async_trait]
pub trait Resource: Send + Sync {
    /// Stable identifier, also used in other types' `dependencies`
    fn name(&self) -> &str;

    /// Bind run parameters. Called once, before anything else.
    fn setup(&mut self, config: Arc<RunConfig>);

    /// Sorted ids of known instances.
    ///
    /// With `refresh` the provider is queried and the cache replaced;
    /// without it only the cache is read. A service that is not enabled in
    /// the project lists as empty.
    async fn list(&self, refresh: bool) -> Result<Vec<String>>;

    /// Types whose instances must all be gone before this one is deleted
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Delete every cached instance concurrently.
    ///
    /// Each success is dropped from the cache; the first error (if any) is
    /// returned once every attempt has finished.
    async fn remove(&self) -> Result<()>;
}

/// Configured resource types of a run, by name
pub type ResourceMap = BTreeMap<String, Arc<dyn Resource>>;
