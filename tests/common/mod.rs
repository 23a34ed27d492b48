//! In-memory resource type and project teardown for driving the orchestrator

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gcp_nuke::config::RunConfig;
use gcp_nuke::error::NukeError;
use gcp_nuke::orchestrator::ProjectTeardown;
use gcp_nuke::resource::{remove_each, Inventory, Resource, ResourceMap, ResourceProperties};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Shared record of deletions, in the order they happened
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// A resource type backed by an in-memory "provider".
///
/// Clones share all state, so a test can keep one to inspect after the
/// other has been handed to a registry.
#[derive(Clone)]
pub struct FakeResource {
    name: &'static str,
    deps: Vec<&'static str>,
    inventory: Arc<Inventory>,
    remote: Arc<Mutex<BTreeSet<String>>>,
    /// Errors returned by the next `remove` calls, one each
    scripted_failures: Arc<Mutex<VecDeque<String>>>,
    /// Items whose deletion always fails with this message
    doomed: Arc<Mutex<HashSet<String>>>,
    delete_delay: Duration,
    listing_broken: bool,
    listing_panics: bool,
    cache_unreadable: bool,
    /// When each instance was deleted
    deleted_at: Arc<Mutex<Vec<(String, Instant)>>>,
    pub list_calls: Arc<AtomicUsize>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub remove_calls: Arc<AtomicUsize>,
    events: EventLog,
}

impl FakeResource {
    pub fn new(name: &'static str, items: &[&str], events: &EventLog) -> Self {
        Self {
            name,
            deps: Vec::new(),
            inventory: Arc::new(Inventory::new()),
            remote: Arc::new(Mutex::new(items.iter().map(|s| s.to_string()).collect())),
            scripted_failures: Arc::new(Mutex::new(VecDeque::new())),
            doomed: Arc::new(Mutex::new(HashSet::new())),
            delete_delay: Duration::ZERO,
            listing_broken: false,
            listing_panics: false,
            cache_unreadable: false,
            deleted_at: Arc::new(Mutex::new(Vec::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
            refresh_calls: Arc::new(AtomicUsize::new(0)),
            remove_calls: Arc::new(AtomicUsize::new(0)),
            events: Arc::clone(events),
        }
    }

    pub fn depends_on(mut self, dependency: &'static str) -> Self {
        self.deps.push(dependency);
        self
    }

    /// Each deletion takes this long
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    /// Every refresh fails with a server error
    pub fn unlistable(mut self) -> Self {
        self.listing_broken = true;
        self
    }

    /// Every refresh panics
    pub fn panicking_listing(mut self) -> Self {
        self.listing_panics = true;
        self
    }

    /// Cache reads fail as if `setup` never happened
    pub fn unreadable_cache(mut self) -> Self {
        self.cache_unreadable = true;
        self
    }

    /// Deletion times of every deleted instance
    pub fn deleted_at(&self) -> Vec<(String, Instant)> {
        self.deleted_at.lock().unwrap().clone()
    }

    /// The next `times` calls to `remove` fail with `message`
    pub fn failing(self, message: &str, times: usize) -> Self {
        {
            let mut failures = self.scripted_failures.lock().unwrap();
            for _ in 0..times {
                failures.push_back(message.to_string());
            }
        }
        self
    }

    /// Deleting `item` always fails with a permission error
    pub fn undeletable(self, item: &str) -> Self {
        self.doomed.lock().unwrap().insert(item.to_string());
        self
    }

    /// What the provider still holds
    pub fn remote(&self) -> Vec<String> {
        self.remote.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl Resource for FakeResource {
    fn name(&self) -> &str {
        self.name
    }

    fn setup(&mut self, _config: Arc<RunConfig>) {}

    async fn list(&self, refresh: bool) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if refresh && self.listing_panics {
            panic!("listing of {} blew up", self.name);
        }
        if !refresh && self.cache_unreadable {
            return Err(NukeError::NotConfigured(self.name.to_string()).into());
        }
        if refresh && self.listing_broken {
            return Err(anyhow!("API request failed: 500 Internal Server Error - backend error"));
        }
        if refresh {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let listing: Vec<_> = self
                .remote()
                .into_iter()
                .map(|id| (id, ResourceProperties::default()))
                .collect();
            self.inventory.replace(listing).await;
        }
        Ok(self.inventory.ids().await)
    }

    fn dependencies(&self) -> &[&'static str] {
        &self.deps
    }

    async fn remove(&self) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.scripted_failures.lock().unwrap().pop_front();
        if let Some(message) = scripted {
            return Err(anyhow!(message));
        }

        let name = self.name;
        remove_each(&self.inventory, |id, _properties| {
            let remote = Arc::clone(&self.remote);
            let doomed = self.doomed.lock().unwrap().contains(&id);
            let events = Arc::clone(&self.events);
            let deleted_at = Arc::clone(&self.deleted_at);
            let delay = self.delete_delay;
            async move {
                tokio::time::sleep(delay).await;
                if doomed {
                    return Err(anyhow!("API request failed: 403 Forbidden - permission denied"));
                }
                remote.lock().unwrap().remove(&id);
                events.lock().unwrap().push(format!("{}:{}", name, id));
                deleted_at.lock().unwrap().push((id, Instant::now()));
                Ok(())
            }
        })
        .await
    }
}

/// Index fakes by name, the way `Registry::configured` would
pub fn resource_map(resources: &[&FakeResource]) -> ResourceMap {
    resources
        .iter()
        .map(|r| {
            let resource: Arc<dyn Resource> = Arc::new((*r).clone());
            (r.name.to_string(), resource)
        })
        .collect()
}

/// Counts project deletions instead of performing them
#[derive(Default)]
pub struct FakeTeardown {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ProjectTeardown for FakeTeardown {
    async fn delete_project(&self, _config: &RunConfig) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Live-run config with the given timing, in seconds
pub fn live_config(timeout: u64, poll_interval: u64) -> RunConfig {
    let mut config = RunConfig::new("nuke-test-project");
    config.dry_run = false;
    config.timeout = Duration::from_secs(timeout);
    config.poll_interval = Duration::from_secs(poll_interval);
    config
}
