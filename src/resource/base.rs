//! Plumbing shared by the concrete resource types

use super::classify;
use super::inventory::{Inventory, ResourceProperties};
use crate::config::RunConfig;
use crate::error::NukeError;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Run config and inventory every resource type carries
#[derive(Default)]
pub struct ResourceBase {
    config: Option<Arc<RunConfig>>,
    inventory: Arc<Inventory>,
}

impl ResourceBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup(&mut self, config: Arc<RunConfig>) {
        self.config = Some(config);
    }

    /// Run config, or `NotConfigured` if `setup` has not happened
    pub fn config(&self, name: &str) -> Result<&Arc<RunConfig>, NukeError> {
        self.config
            .as_ref()
            .ok_or_else(|| NukeError::NotConfigured(name.to_string()))
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    /// Store the outcome of a remote listing and return the sorted ids.
    ///
    /// "API not enabled" becomes an empty listing; other errors leave the
    /// cache untouched and are returned.
    pub async fn apply_listing(
        &self,
        name: &str,
        listing: Result<Vec<(String, ResourceProperties)>>,
    ) -> Result<Vec<String>> {
        match listing {
            Ok(items) => {
                self.inventory.replace(items).await;
            },
            Err(e) if classify::is_service_disabled(&e) => {
                let project = self
                    .config
                    .as_ref()
                    .map(|c| c.project.as_str())
                    .unwrap_or("-");
                tracing::info!("{} API not enabled in project {}. Skipping.", name, project);
                self.inventory.clear().await;
            },
            Err(e) => return Err(e.context(format!("Failed to list {}", name))),
        }
        Ok(self.inventory.ids().await)
    }
}

/// Delete every cached instance, one task each.
///
/// `delete` builds the deletion future for one instance; a success drops the
/// id from the inventory. Every task runs to completion, then the first
/// error is returned.
pub async fn remove_each<F, Fut>(inventory: &Arc<Inventory>, delete: F) -> Result<()>
where
    F: Fn(String, ResourceProperties) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut tasks = JoinSet::new();

    for (id, properties) in inventory.entries().await {
        let deletion = delete(id.clone(), properties);
        let inventory = Arc::clone(inventory);
        tasks.spawn(async move {
            deletion
                .await
                .with_context(|| format!("Failed to delete {}", id))?;
            inventory.remove(&id).await;
            Ok::<_, anyhow::Error>(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(anyhow::Error::from).and_then(|r| r);
        if let Err(e) = result {
            if first_error.is_none() {
                first_error = Some(e);
            } else {
                tracing::debug!("Further deletion error: {:#}", e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
