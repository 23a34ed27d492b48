//! Resource Inventory
//!
//! The per-resource-type cache of known instances. Written only by the
//! owning resource type, read concurrently by other types waiting on it.

use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Metadata kept for each cached instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceProperties {
    /// Zone, region or multi-region, when the type has one
    pub location: Option<String>,
    /// Deletion protection is on and must be lifted before deleting
    pub protected: bool,
}

impl ResourceProperties {
    pub fn located(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            protected: false,
        }
    }

    pub fn with_protection(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Location for log lines
    pub fn location_or_global(&self) -> &str {
        self.location.as_deref().unwrap_or("global")
    }
}

/// Concurrency-safe id -> properties map
///
/// Backed by a `BTreeMap`, so every snapshot comes out sorted by id.
#[derive(Debug, Default)]
pub struct Inventory {
    items: RwLock<BTreeMap<String, ResourceProperties>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted ids currently cached
    pub async fn ids(&self) -> Vec<String> {
        self.items.read().await.keys().cloned().collect()
    }

    /// Sorted `(id, properties)` pairs currently cached
    pub async fn entries(&self) -> Vec<(String, ResourceProperties)> {
        self.items
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<ResourceProperties> {
        self.items.read().await.get(id).cloned()
    }

    pub async fn insert(&self, id: impl Into<String>, properties: ResourceProperties) {
        self.items.write().await.insert(id.into(), properties);
    }

    /// Drop one instance; returns whether it was present
    pub async fn remove(&self, id: &str) -> bool {
        self.items.write().await.remove(id).is_some()
    }

    /// Swap in a complete new listing.
    ///
    /// The new map is built before the write lock is taken, so a reader sees
    /// either the old contents or the new ones, never a mix.
    pub async fn replace<I>(&self, listing: I)
    where
        I: IntoIterator<Item = (String, ResourceProperties)>,
    {
        let fresh: BTreeMap<_, _> = listing.into_iter().collect();
        *self.items.write().await = fresh;
    }

    pub async fn clear(&self) {
        self.items.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}
