//! GCP Projects
//!
//! Project lookup and removal through Resource Manager v3.

use super::client::GcpClient;
use super::operations::{lro_status, operation_name};
use crate::config::RunConfig;
use crate::orchestrator::ProjectTeardown;
use crate::resource::{OperationPoller, OperationTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Project information
#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub display_name: String,
    /// `projects/<number>`
    pub name: String,
    pub state: String,
}

impl From<&Value> for Project {
    fn from(value: &Value) -> Self {
        let field = |key: &str, default: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            project_id: field("projectId", "-"),
            display_name: field("displayName", "-"),
            name: field("name", "-"),
            state: field("state", "STATE_UNSPECIFIED"),
        }
    }
}

impl Project {
    /// Already scheduled for deletion
    pub fn is_pending_deletion(&self) -> bool {
        self.state == "DELETE_REQUESTED"
    }
}

/// Fetch a single project
pub async fn get_project(client: &GcpClient, project_id: &str) -> Result<Project> {
    let url = client.resourcemanager_url(&format!("projects/{}", project_id));
    let response = client
        .get(&url)
        .await
        .with_context(|| format!("Failed to look up project {}", project_id))?;
    Ok(Project::from(&response))
}

/// Removes the project through Resource Manager and waits for the
/// operation to finish
pub struct ProjectDeleter {
    client: GcpClient,
}

impl ProjectDeleter {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProjectTeardown for ProjectDeleter {
    async fn delete_project(&self, config: &RunConfig) -> Result<()> {
        let project = get_project(&self.client, &config.project).await?;
        if project.is_pending_deletion() {
            tracing::info!(
                "[Skipping] Project {} is already scheduled for deletion",
                config.project
            );
            return Ok(());
        }

        let url = self
            .client
            .resourcemanager_url(&format!("projects/{}", config.project));
        let operation = self
            .client
            .delete(&url)
            .await
            .with_context(|| format!("Failed to delete project {}", config.project))?;

        let target = OperationTarget {
            kind: "Project removal",
            resource_type: "Project",
            resource_id: &config.project,
            location: "global",
        };
        let op_name = operation_name(&operation).map(|s| s.to_string());

        let elapsed = OperationPoller::new(config)
            .wait(&target, lro_status(&operation), || {
                let client = &self.client;
                let op_name = op_name.clone();
                async move {
                    let op_name = op_name.context("Project delete returned no operation name")?;
                    let op = client.get(&client.resourcemanager_url(&op_name)).await?;
                    Ok::<_, anyhow::Error>(lro_status(&op))
                }
            })
            .await?;

        tracing::info!(
            "[Info] Project removal completed for {} ({} seconds)",
            config.project,
            elapsed.as_secs()
        );
        Ok(())
    }
}
