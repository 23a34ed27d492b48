//! Secret Manager secrets

use super::str_field;
use crate::config::RunConfig;
use crate::error::NukeError;
use crate::gcp::client::GcpClient;
use crate::gcp::http::api_error;
use crate::resource::{remove_each, Resource, ResourceBase, ResourceProperties};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub struct SecretManagerSecrets {
    client: GcpClient,
    base: ResourceBase,
}

impl SecretManagerSecrets {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            base: ResourceBase::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<(String, ResourceProperties)>> {
        let secrets = self
            .client
            .get_all_pages(&self.client.secretmanager_url("secrets"), "secrets")
            .await
            .map_err(|e| {
                // The collection itself is missing when the API was never enabled
                let missing = api_error(&e).map(|api| api.is_not_found()).unwrap_or(false);
                if missing {
                    NukeError::CapabilityNotEnabled {
                        service: "Secret Manager".to_string(),
                        project: self.client.project_id.clone(),
                    }
                    .into()
                } else {
                    e
                }
            })?;

        Ok(secrets
            .iter()
            .filter_map(|secret| {
                let name = str_field(secret, "name")?;
                Some((name.to_string(), ResourceProperties::default()))
            })
            .collect())
    }
}

#[async_trait]
impl Resource for SecretManagerSecrets {
    fn name(&self) -> &str {
        "SecretManagerSecrets"
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

        remove_each(self.base.inventory(), |secret, properties| {
            let client = self.client.clone();
            let config = Arc::clone(&config);
            let name = name.clone();
            async move {
                client.delete(&client.secretmanager_url(&secret)).await?;
                tracing::info!(
                    "[Info] Secret deleted {} [type: {} project: {} location: {}]",
                    secret,
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
