//! Deletion Orchestrator
//!
//! Lists every resource type concurrently, then runs one pipeline per type,
//! all concurrently:
//!
//! 1. dry run: report the listing and stop
//! 2. wait until every dependency type is empty
//! 3. remove, retrying while the failure looks transient
//!
//! and, once every pipeline has succeeded (dry run included), optionally
//! removes the project.

use crate::config::RunConfig;
use crate::error::NukeError;
use crate::resource::classify::is_transient;
use crate::resource::{Resource, ResourceMap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinSet};

/// How one resource type's pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to delete
    Skipped,
    /// Dry run; these would have been deleted
    DryRun(Vec<String>),
    /// These were deleted
    Deleted(Vec<String>),
    Failed(String),
}

/// Per-type outcomes of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: BTreeMap<String, Outcome>,
    pub project_deleted: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        !self
            .outcomes
            .values()
            .any(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            Outcome::Failed(message) => Some((name.as_str(), message.as_str())),
            _ => None,
        })
    }
}

/// Deletes the project once it is empty
#[async_trait]
pub trait ProjectTeardown: Send + Sync {
    async fn delete_project(&self, config: &RunConfig) -> Result<()>;
}

pub struct Orchestrator {
    config: Arc<RunConfig>,
    resources: Arc<ResourceMap>,
}

impl Orchestrator {
    pub fn new(config: Arc<RunConfig>, resources: ResourceMap) -> Self {
        Self {
            config,
            resources: Arc::new(resources),
        }
    }

    /// Run every pipeline to completion.
    ///
    /// Every type is listed first, so that dependency waits see populated
    /// caches. A failing pipeline does not stop its siblings; every failure
    /// is logged and the first one is returned once all have finished. The
    /// project is only torn down when every pipeline succeeded, after the
    /// deletion pass or the dry-run pass alike.
    pub async fn run(&self, teardown: &dyn ProjectTeardown) -> Result<RunSummary> {
        self.config.validate()?;

        let mut summary = RunSummary::default();
        let mut first_error: Option<anyhow::Error> = None;

        let listings = self.discover_all().await;
        let unlisted: Vec<String> = listings
            .iter()
            .filter(|(_, listing)| listing.is_err())
            .map(|(name, _)| name.clone())
            .collect();

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for (name, listing) in listings {
            let items = match listing {
                Ok(items) => items,
                Err(e) => {
                    record_failure(&mut summary, &mut first_error, name, e);
                    continue;
                }
            };
            let Some(resource) = self.resources.get(&name).map(Arc::clone) else {
                continue;
            };

            // A dependency we could not list can not be waited on
            if let Some(dependency) = resource
                .dependencies()
                .iter()
                .find(|d| unlisted.iter().any(|u| u.as_str() == **d))
            {
                let e = anyhow::anyhow!(
                    "Resource {} not deleted: dependency {} could not be listed",
                    name,
                    dependency
                );
                record_failure(&mut summary, &mut first_error, name, e);
                continue;
            }

            let config = Arc::clone(&self.config);
            let resources = Arc::clone(&self.resources);
            let handle = tasks.spawn(async move {
                process_listing(&config, &resources, resource.as_ref(), items).await
            });
            names.insert(handle.id(), name);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (name, outcome) = match joined {
                Ok((id, outcome)) => (task_name(&names, id), outcome),
                Err(e) => {
                    let name = task_name(&names, e.id());
                    let e = anyhow::Error::from(e)
                        .context(format!("Resource {} pipeline aborted", name));
                    (name, Err(e))
                }
            };

            match outcome {
                Ok(outcome) => {
                    summary.outcomes.insert(name, outcome);
                }
                Err(e) => record_failure(&mut summary, &mut first_error, name, e),
            }
        }

        log_summary(&summary);

        if let Some(e) = first_error {
            return Err(e);
        }

        // Without keep-project the project goes, dry run or not
        if !self.config.keep_project {
            if self.config.dry_run {
                tracing::warn!(
                    "[Dry run] Resources were left in place, but project {} is removed (keep-project: false)",
                    self.config.project
                );
            }
            tracing::info!("[Info] Removing project {}", self.config.project);
            teardown.delete_project(&self.config).await?;
            summary.project_deleted = true;
        }

        tracing::info!(
            "-- Deletion complete for project {} (dry-run: {}) (keep-project: {}) --",
            self.config.project,
            self.config.dry_run,
            self.config.keep_project
        );

        Ok(summary)
    }

    /// Refresh every resource type concurrently
    ///
    /// A listing task that dies (panics) counts as a failed listing of its
    /// type.
    async fn discover_all(&self) -> BTreeMap<String, Result<Vec<String>>> {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for (name, resource) in self.resources.iter() {
            let resource = Arc::clone(resource);
            let handle = tasks.spawn(async move { discover(resource.as_ref()).await });
            names.insert(handle.id(), name.clone());
        }

        let mut listings = BTreeMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, listing)) => {
                    listings.insert(task_name(&names, id), listing);
                }
                Err(e) => {
                    let name = task_name(&names, e.id());
                    let e = anyhow::Error::from(e)
                        .context(format!("Failed to list {}: listing task aborted", name));
                    listings.insert(name, Err(e));
                }
            }
        }
        listings
    }
}

fn task_name(names: &HashMap<task::Id, String>, id: task::Id) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("<task {}>", id))
}

fn record_failure(
    summary: &mut RunSummary,
    first_error: &mut Option<anyhow::Error>,
    name: String,
    e: anyhow::Error,
) {
    tracing::error!("[Error] {:#}", e);
    summary
        .outcomes
        .insert(name, Outcome::Failed(format!("{:#}", e)));
    first_error.get_or_insert(e);
}

fn log_summary(summary: &RunSummary) {
    for (name, outcome) in &summary.outcomes {
        match outcome {
            Outcome::Skipped => tracing::info!("[Summary] {}: nothing to delete", name),
            Outcome::DryRun(items) => {
                tracing::info!("[Summary] {}: {} would be deleted", name, items.len())
            }
            Outcome::Deleted(items) => tracing::info!("[Summary] {}: {} deleted", name, items.len()),
            Outcome::Failed(_) => tracing::info!("[Summary] {}: failed", name),
        }
    }
}

/// Fresh listing of one resource type
async fn discover(resource: &dyn Resource) -> Result<Vec<String>> {
    tracing::info!("[Info] Retrieving list of resources for {}", resource.name());
    let items = resource.list(true).await?;
    tracing::info!("[Info] Found {} {} items", items.len(), resource.name());
    Ok(items)
}

/// The full pipeline of one resource type
pub async fn run_pipeline(
    config: &RunConfig,
    resources: &ResourceMap,
    resource: &dyn Resource,
) -> Result<Outcome> {
    let items = discover(resource).await?;
    process_listing(config, resources, resource, items).await
}

/// Everything after the initial listing: report, or wait and delete
async fn process_listing(
    config: &RunConfig,
    resources: &ResourceMap,
    resource: &dyn Resource,
    items: Vec<String>,
) -> Result<Outcome> {
    let name = resource.name();

    if config.dry_run {
        if !items.is_empty() {
            tracing::info!("[Dry run] {} items to be deleted: {:?}", name, items);
        }
        return Ok(Outcome::DryRun(items));
    }

    if items.is_empty() {
        tracing::info!("[Skipping] No {} items to delete", name);
        return Ok(Outcome::Skipped);
    }

    if wait_for_dependencies(config, resources, resource).await? {
        // Anything may have changed while we waited
        resource.list(true).await?;
    }

    let targets = resource.list(false).await?;
    if targets.is_empty() {
        tracing::info!("[Skipping] No {} items left to delete", name);
        return Ok(Outcome::Skipped);
    }

    tracing::info!("[Remove] Removing {} items: {:?}", name, targets);
    remove_with_retry(config, resource).await?;

    Ok(Outcome::Deleted(targets))
}

/// Block until every dependency of `resource` lists empty.
///
/// The wait is cumulative across dependencies and bounded by the run
/// timeout. Returns whether any waiting happened.
pub async fn wait_for_dependencies(
    config: &RunConfig,
    resources: &ResourceMap,
    resource: &dyn Resource,
) -> Result<bool> {
    let mut waited = Duration::ZERO;
    let mut any_wait = false;

    for dependency_name in resource.dependencies() {
        let dependency = resources.get(*dependency_name).ok_or_else(|| {
            NukeError::InvalidRegistry(format!(
                "{} depends on unknown resource type {}",
                resource.name(),
                dependency_name
            ))
        })?;

        while !dependency.list(false).await?.is_empty() {
            if waited > config.timeout {
                return Err(NukeError::DependencyTimeout {
                    resource: resource.name().to_string(),
                    dependency: dependency_name.to_string(),
                    elapsed: waited.as_secs(),
                }
                .into());
            }

            any_wait = true;
            config.sleep_poll_interval().await?;
            waited += config.poll_interval;
            tracing::info!(
                "[Waiting] Resource {} waiting for dependency {} to delete. ({} seconds)",
                resource.name(),
                dependency_name,
                waited.as_secs()
            );
        }
    }

    Ok(any_wait)
}

/// `remove`, retried after a refresh for as long as the failure is
/// transient and the timeout allows.
///
/// With a poll interval P and timeout T, N consecutive transient failures
/// are ridden out iff `N * P < T`.
pub async fn remove_with_retry(config: &RunConfig, resource: &dyn Resource) -> Result<()> {
    let name = resource.name();
    let mut elapsed = Duration::ZERO;
    let mut result = resource.remove().await;

    loop {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !is_transient(&err) {
            let items = match resource.list(false).await {
                Ok(items) => items,
                Err(list_err) => {
                    return Err(err.context(format!(
                        "Resource: {}. Remaining items unknown: {:#}",
                        name, list_err
                    )));
                }
            };
            // Our own typed conditions stay downcastable
            if err.downcast_ref::<NukeError>().is_some() {
                return Err(err.context(format!("Resource: {}. Items: {:?}", name, items)));
            }
            return Err(NukeError::Removal {
                resource: name.to_string(),
                items,
                message: format!("{:#}", err),
            }
            .into());
        }

        let remaining = resource
            .list(true)
            .await
            .with_context(|| format!("Failed to refresh {} before retrying", name))?;

        if elapsed + config.poll_interval >= config.timeout {
            return Err(NukeError::RemovalTimeout {
                resource: name.to_string(),
                elapsed: elapsed.as_secs(),
                last_error: format!("{:#}", err),
            }
            .into());
        }

        tracing::info!(
            "[Remove] In use Resource: {}. Items: {:?}. Waiting before retrying delete. ({} seconds)",
            name,
            remaining,
            elapsed.as_secs()
        );
        config.sleep_poll_interval().await?;
        elapsed += config.poll_interval;
        result = resource.remove().await;
    }
}
