//! Cloud Storage buckets

use super::str_field;
use crate::config::RunConfig;
use crate::gcp::client::{with_query, GcpClient};
use crate::resource::{remove_each, Resource, ResourceBase, ResourceProperties};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub struct StorageBuckets {
    client: GcpClient,
    base: ResourceBase,
}

impl StorageBuckets {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            base: ResourceBase::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<(String, ResourceProperties)>> {
        let url = with_query(&self.client.storage_url("b"), "project", &self.client.project_id);
        let items = self.client.get_all_pages(&url, "items").await?;

        Ok(items
            .iter()
            .filter_map(|bucket| {
                let name = str_field(bucket, "name")?;
                let properties = match str_field(bucket, "location") {
                    Some(location) => ResourceProperties::located(location.to_lowercase()),
                    None => ResourceProperties::default(),
                };
                Some((name.to_string(), properties))
            })
            .collect())
    }
}

#[async_trait]
impl Resource for StorageBuckets {
    fn name(&self) -> &str {
        "StorageBuckets"
    }

    fn setup(&mut self, config: Arc<RunConfig>) {
        self.base.setup(config);
    }

    async fn list(&self, refresh: bool) -> Result<Vec<String>> {
        if !refresh {
            return Ok(self.base.inventory().ids().await);
        }
        let listing = self.fetch().await;
        self.base.apply_listing(self.name(), listing).await
    }

    async fn remove(&self) -> Result<()> {
        let config = Arc::clone(self.base.config(self.name())?);
        let name = self.name().to_string();

        remove_each(self.base.inventory(), |bucket, properties| {
            let client = self.client.clone();
            let config = Arc::clone(&config);
            let name = name.clone();
            async move {
                delete_bucket(&client, &bucket).await?;
                tracing::info!(
                    "[Info] Bucket deleted {} [type: {} project: {} location: {}]",
                    bucket,
                    name,
                    config.project,
                    properties.location_or_global()
                );
                Ok(())
            }
        })
        .await
    }
}

/// Empty a bucket, every object version included, then delete it.
///
/// Buckets under a locked or non-zero retention policy cannot be emptied
/// and are refused up front.
async fn delete_bucket(client: &GcpClient, bucket: &str) -> Result<()> {
    let metadata = client
        .get(&client.storage_bucket_url(bucket))
        .await
        .with_context(|| format!("Failed to read bucket {}", bucket))?;

    if let Some(policy) = metadata.get("retentionPolicy") {
        if policy.get("isLocked").and_then(|v| v.as_bool()).unwrap_or(false) {
            bail!("Bucket {} has a bucket policy that is currently locked", bucket);
        }
        let period: u64 = str_field(policy, "retentionPeriod")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        if period > 0 {
            bail!(
                "Bucket {} has a bucket policy retention period of {} seconds",
                bucket,
                period
            );
        }
    }

    let objects_url = with_query(&client.storage_objects_url(bucket), "versions", "true");
    let objects = client.get_all_pages(&objects_url, "items").await?;

    for object in &objects {
        let Some(object_name) = str_field(object, "name") else {
            continue;
        };
        let mut url = format!(
            "{}/{}",
            client.storage_objects_url(bucket),
            urlencoding::encode(object_name)
        );
        if let Some(generation) = str_field(object, "generation") {
            url = with_query(&url, "generation", generation);
        }
        client
            .delete(&url)
            .await
            .with_context(|| format!("Failed to delete object {} in bucket {}", object_name, bucket))?;
    }

    if !objects.is_empty() {
        tracing::debug!("Deleted {} objects from bucket {}", objects.len(), bucket);
    }

    client.delete(&client.storage_bucket_url(bucket)).await?;
    Ok(())
}
