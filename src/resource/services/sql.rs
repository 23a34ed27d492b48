//! Cloud SQL instances
//!
//! Instances with deletion protection get it lifted first; both the patch
//! and the delete are long-running operations that are polled to the end.

use super::str_field;
use crate::config::RunConfig;
use crate::gcp::client::GcpClient;
use crate::gcp::operations::{operation_name, sql_operation_status};
use crate::resource::{
    remove_each, OperationPoller, OperationTarget, Resource, ResourceBase, ResourceProperties,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const TYPE_NAME: &str = "SqlInstances";

pub struct SqlInstances {
    client: GcpClient,
    base: ResourceBase,
}

impl SqlInstances {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            base: ResourceBase::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<(String, ResourceProperties)>> {
        let instances = self
            .client
            .get_all_pages(&self.client.sqladmin_url("instances"), "items")
            .await?;

        Ok(instances
            .iter()
            .filter_map(|instance| {
                let name = str_field(instance, "name")?;
                let protected = instance
                    .get("settings")
                    .and_then(|s| s.get("deletionProtectionEnabled"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let properties = str_field(instance, "region")
                    .map(ResourceProperties::located)
                    .unwrap_or_default()
                    .with_protection(protected);
                Some((name.to_string(), properties))
            })
            .collect())
    }
}

#[async_trait]
impl Resource for SqlInstances {
    fn name(&self) -> &str {
        TYPE_NAME
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

        remove_each(self.base.inventory(), |instance, properties| {
            let client = self.client.clone();
            let config = Arc::clone(&config);
            async move { delete_instance(&client, &config, &instance, &properties).await }
        })
        .await
    }
}

async fn delete_instance(
    client: &GcpClient,
    config: &RunConfig,
    instance: &str,
    properties: &ResourceProperties,
) -> Result<()> {
    let instance_url = client.sqladmin_url(&format!("instances/{}", instance));
    let location = properties.location_or_global();

    if properties.protected {
        let operation = client
            .patch(
                &instance_url,
                &json!({"settings": {"deletionProtectionEnabled": false}}),
            )
            .await
            .with_context(|| format!("Failed to lift deletion protection on {}", instance))?;
        let target = OperationTarget {
            kind: "Deletion protection removal",
            resource_type: TYPE_NAME,
            resource_id: instance,
            location,
        };
        wait_for(client, config, &target, &operation).await?;
    }

    let operation = client.delete(&instance_url).await?;
    let target = OperationTarget {
        kind: "Resource deletion",
        resource_type: TYPE_NAME,
        resource_id: instance,
        location,
    };
    wait_for(client, config, &target, &operation).await?;
    Ok(())
}

async fn wait_for(
    client: &GcpClient,
    config: &RunConfig,
    target: &OperationTarget<'_>,
    operation: &Value,
) -> Result<()> {
    let op_name = operation_name(operation).map(|s| s.to_string());

    OperationPoller::new(config)
        .wait(target, sql_operation_status(operation), || {
            let op_name = op_name.clone();
            async move {
                let op_name = op_name.context("Cloud SQL returned no operation name")?;
                let op = client
                    .get(&client.sqladmin_url(&format!("operations/{}", op_name)))
                    .await?;
                Ok::<_, anyhow::Error>(sql_operation_status(&op))
            }
        })
        .await?;
    Ok(())
}
