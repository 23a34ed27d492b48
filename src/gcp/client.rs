//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Environment variable that redirects every API call to one root URL
pub const API_ENDPOINT_ENV: &str = "GCP_NUKE_API_ENDPOINT";

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    /// Replaces `https://<service>.googleapis.com` when set
    api_root: Option<String>,
}

impl GcpClient {
    /// Create a new GCP client
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let mut client = Self::with_credentials(project_id, credentials)?;
        if let Ok(root) = std::env::var(API_ENDPOINT_ENV) {
            tracing::info!("Sending API calls to {}", root);
            client = client.with_api_root(&root);
        }
        Ok(client)
    }

    /// Create a client from explicit credentials
    pub fn with_credentials(project_id: &str, credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            api_root: None,
        })
    }

    /// Point every service at `root` instead of googleapis.com
    pub fn with_api_root(mut self, root: &str) -> Self {
        self.api_root = Some(root.trim_end_matches('/').to_string());
        self
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    /// GET every page of a list call, collecting the array under `items_key`
    pub async fn get_all_pages(&self, url: &str, items_key: &str) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_url = match &page_token {
                Some(token) => with_query(url, "pageToken", token),
                None => url.to_string(),
            };
            let mut response = self.get(&page_url).await?;

            if let Some(items) = response
                .get_mut(items_key)
                .and_then(|v| v.as_array_mut())
            {
                all_items.append(items);
            }

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());

            if page_token.is_none() {
                break;
            }
        }

        Ok(all_items)
    }

    fn service_url(&self, host: &str, path: &str) -> String {
        match &self.api_root {
            Some(root) => format!("{}/{}", root, path),
            None => format!("https://{}/{}", host, path),
        }
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        self.service_url(
            "compute.googleapis.com",
            &format!("compute/v1/projects/{}/{}", self.project_id, path),
        )
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        self.service_url("storage.googleapis.com", &format!("storage/v1/{}", path))
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage objects URL
    pub fn storage_objects_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}/o", urlencoding::encode(bucket)))
    }

    // =========================================================================
    // BigQuery API helpers
    // =========================================================================

    pub fn bigquery_url(&self, path: &str) -> String {
        self.service_url(
            "bigquery.googleapis.com",
            &format!("bigquery/v2/projects/{}/{}", self.project_id, path),
        )
    }

    // =========================================================================
    // Secret Manager API helpers
    // =========================================================================

    /// `name` is either a path under the project or a full resource name
    pub fn secretmanager_url(&self, name: &str) -> String {
        self.service_url(
            "secretmanager.googleapis.com",
            &format!("v1/{}", self.qualify(name)),
        )
    }

    // =========================================================================
    // Cloud SQL Admin API helpers
    // =========================================================================

    pub fn sqladmin_url(&self, path: &str) -> String {
        self.service_url(
            "sqladmin.googleapis.com",
            &format!("v1/projects/{}/{}", self.project_id, path),
        )
    }

    // =========================================================================
    // Cloud Functions API helpers
    // =========================================================================

    /// `name` is either a path under the project or a full resource name
    pub fn functions_url(&self, name: &str) -> String {
        self.service_url(
            "cloudfunctions.googleapis.com",
            &format!("v2/{}", self.qualify(name)),
        )
    }

    // =========================================================================
    // Resource Manager API helpers
    // =========================================================================

    /// Build Resource Manager (v3) API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        self.service_url(
            "cloudresourcemanager.googleapis.com",
            &format!("v3/{}", path),
        )
    }

    /// Prefix `projects/<id>/` unless `name` already is a full resource name
    fn qualify(&self, name: &str) -> String {
        if name.starts_with("projects/") {
            name.to_string()
        } else {
            format!("projects/{}/{}", self.project_id, name)
        }
    }
}

/// Append `key=value` to a URL that may or may not already carry a query
pub fn with_query(url: &str, key: &str, value: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, sep, key, urlencoding::encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::with_credentials("nuke-me-123", GcpCredentials::with_token("t")).unwrap()
    }

    #[test]
    fn test_default_hosts() {
        let c = client();
        assert_eq!(
            c.sqladmin_url("instances"),
            "https://sqladmin.googleapis.com/v1/projects/nuke-me-123/instances"
        );
        assert_eq!(
            c.storage_bucket_url("my bucket"),
            "https://storage.googleapis.com/storage/v1/b/my%20bucket"
        );
        assert_eq!(
            c.resourcemanager_url("projects/nuke-me-123"),
            "https://cloudresourcemanager.googleapis.com/v3/projects/nuke-me-123"
        );
    }

    #[test]
    fn test_api_root_override() {
        let c = client().with_api_root("http://127.0.0.1:9000/");
        assert_eq!(
            c.bigquery_url("datasets"),
            "http://127.0.0.1:9000/bigquery/v2/projects/nuke-me-123/datasets"
        );
    }

    #[test]
    fn test_full_resource_names_are_not_requalified() {
        let c = client();
        assert_eq!(
            c.secretmanager_url("projects/nuke-me-123/secrets/db-pass"),
            "https://secretmanager.googleapis.com/v1/projects/nuke-me-123/secrets/db-pass"
        );
        assert_eq!(
            c.functions_url("locations/-/functions"),
            "https://cloudfunctions.googleapis.com/v2/projects/nuke-me-123/locations/-/functions"
        );
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("http://x/a", "pageToken", "p 2"), "http://x/a?pageToken=p%202");
        assert_eq!(with_query("http://x/a?b=1", "k", "v"), "http://x/a?b=1&k=v");
    }
}
