//! Cloud Functions (v2)

use super::str_field;
use crate::config::RunConfig;
use crate::gcp::client::GcpClient;
use crate::gcp::operations::{lro_status, operation_name};
use crate::resource::{
    remove_each, OperationPoller, OperationTarget, Resource, ResourceBase, ResourceProperties,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const TYPE_NAME: &str = "FunctionsInstances";

pub struct FunctionsInstances {
    client: GcpClient,
    base: ResourceBase,
}

impl FunctionsInstances {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            base: ResourceBase::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<(String, ResourceProperties)>> {
        let functions = self
            .client
            .get_all_pages(&self.client.functions_url("locations/-/functions"), "functions")
            .await?;

        Ok(functions
            .iter()
            .filter_map(|function| {
                let name = str_field(function, "name")?;
                let properties = location_of(name)
                    .map(ResourceProperties::located)
                    .unwrap_or_default();
                Some((name.to_string(), properties))
            })
            .collect())
    }
}

/// `projects/p/locations/<loc>/functions/f` -> `<loc>`
fn location_of(name: &str) -> Option<&str> {
    let mut parts = name.split('/');
    while let Some(part) = parts.next() {
        if part == "locations" {
            return parts.next();
        }
    }
    None
}

#[async_trait]
impl Resource for FunctionsInstances {
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

        remove_each(self.base.inventory(), |function, properties| {
            let client = self.client.clone();
            let config = Arc::clone(&config);
            async move {
                let operation = client.delete(&client.functions_url(&function)).await?;
                let op_name = operation_name(&operation).map(|s| s.to_string());
                let target = OperationTarget {
                    kind: "Resource deletion",
                    resource_type: TYPE_NAME,
                    resource_id: &function,
                    location: properties.location_or_global(),
                };

                OperationPoller::new(&config)
                    .wait(&target, lro_status(&operation), || {
                        let client = &client;
                        let op_name = op_name.clone();
                        async move {
                            let op_name =
                                op_name.context("Cloud Functions returned no operation name")?;
                            let op = client.get(&client.functions_url(&op_name)).await?;
                            Ok::<_, anyhow::Error>(lro_status(&op))
                        }
                    })
                    .await?;
                Ok(())
            }
        })
        .await
    }
}
