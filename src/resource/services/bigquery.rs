//! BigQuery datasets

use super::str_field;
use crate::config::RunConfig;
use crate::gcp::client::{with_query, GcpClient};
use crate::resource::{remove_each, Resource, ResourceBase, ResourceProperties};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub struct BigQueryDatasets {
    client: GcpClient,
    base: ResourceBase,
}

impl BigQueryDatasets {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            base: ResourceBase::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<(String, ResourceProperties)>> {
        let datasets = self
            .client
            .get_all_pages(&self.client.bigquery_url("datasets"), "datasets")
            .await?;

        Ok(datasets
            .iter()
            .filter_map(|dataset| {
                let id = dataset
                    .get("datasetReference")
                    .and_then(|r| str_field(r, "datasetId"))?;
                let properties = str_field(dataset, "location")
                    .map(|l| ResourceProperties::located(l.to_lowercase()))
                    .unwrap_or_default();
                Some((id.to_string(), properties))
            })
            .collect())
    }
}

#[async_trait]
impl Resource for BigQueryDatasets {
    fn name(&self) -> &str {
        "BigQueryDatasets"
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

        remove_each(self.base.inventory(), |dataset, properties| {
            let client = self.client.clone();
            let config = Arc::clone(&config);
            let name = name.clone();
            async move {
                // Tables and views go with the dataset
                let url = with_query(
                    &client.bigquery_url(&format!("datasets/{}", dataset)),
                    "deleteContents",
                    "true",
                );
                client.delete(&url).await?;
                tracing::info!(
                    "[Info] Dataset deleted {} [type: {} project: {} location: {}]",
                    dataset,
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
