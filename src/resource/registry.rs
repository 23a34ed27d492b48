//! Resource Registry
//!
//! Collects the resource types a run knows about. Registration happens once
//! at startup; [`Registry::configured`] then closes the registry and hands
//! the orchestrator a name-keyed map of set-up resource types.

use super::services;
use super::{Resource, ResourceMap};
use crate::config::RunConfig;
use crate::error::NukeError;
use crate::gcp::client::GcpClient;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    resources: Vec<Box<dyn Resource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in resource type
    pub fn with_defaults(client: &GcpClient) -> Self {
        let mut registry = Self::new();
        for resource in services::all(client) {
            registry.register_boxed(resource);
        }
        registry
    }

    pub fn register<R: Resource + 'static>(&mut self, resource: R) -> &mut Self {
        self.register_boxed(Box::new(resource))
    }

    pub fn register_boxed(&mut self, resource: Box<dyn Resource>) -> &mut Self {
        tracing::debug!("Registered resource type {}", resource.name());
        self.resources.push(resource);
        self
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Set every resource type up for this run and index them by name.
    ///
    /// Fails on duplicate names, dependencies on unknown names, and
    /// dependency cycles.
    pub fn configured(self, config: Arc<RunConfig>) -> Result<ResourceMap, NukeError> {
        let mut map: ResourceMap = BTreeMap::new();

        for mut resource in self.resources {
            resource.setup(Arc::clone(&config));
            let name = resource.name().to_string();
            if map.contains_key(&name) {
                return Err(NukeError::InvalidRegistry(format!(
                    "resource type {} registered twice",
                    name
                )));
            }
            map.insert(name, Arc::from(resource));
        }

        validate_dependencies(&map)?;
        Ok(map)
    }
}

/// Every dependency must name a registered type, and the graph must be
/// acyclic; otherwise a dependency wait can only end in a timeout.
fn validate_dependencies(map: &ResourceMap) -> Result<(), NukeError> {
    for (name, resource) in map {
        for dep in resource.dependencies() {
            if !map.contains_key(*dep) {
                return Err(NukeError::InvalidRegistry(format!(
                    "{} depends on unknown resource type {}",
                    name, dep
                )));
            }
        }
    }

    let mut done: HashSet<&str> = HashSet::new();
    for name in map.keys() {
        let mut path = Vec::new();
        visit(map, name, &mut path, &mut done)?;
    }
    Ok(())
}

fn visit<'a>(
    map: &'a ResourceMap,
    name: &'a str,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), NukeError> {
    if done.contains(name) {
        return Ok(());
    }
    if let Some(pos) = path.iter().position(|n| *n == name) {
        let mut cycle: Vec<&str> = path[pos..].to_vec();
        cycle.push(name);
        return Err(NukeError::InvalidRegistry(format!(
            "dependency cycle: {}",
            cycle.join(" -> ")
        )));
    }

    path.push(name);
    if let Some(resource) = map.get(name) {
        for dep in resource.dependencies() {
            visit(map, *dep, path, done)?;
        }
    }
    path.pop();
    done.insert(name);
    Ok(())
}
