//! Integration tests against mocked GCP endpoints using wiremock
//!
//! The client is pointed at the mock server with `with_api_root`, so every
//! service shares one server and paths keep their real shape.

use gcp_nuke::config::RunConfig;
use gcp_nuke::gcp::auth::GcpCredentials;
use gcp_nuke::gcp::client::GcpClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "test-project";

fn client(server: &MockServer) -> GcpClient {
    GcpClient::with_credentials(PROJECT, GcpCredentials::with_token("test-token"))
        .unwrap()
        .with_api_root(&server.uri())
}

/// Live run with millisecond timing
fn run_config(timeout_ms: u64, poll_ms: u64) -> Arc<RunConfig> {
    let mut config = RunConfig::new(PROJECT);
    config.dry_run = false;
    config.timeout = Duration::from_millis(timeout_ms);
    config.poll_interval = Duration::from_millis(poll_ms);
    Arc::new(config)
}

mod http_client_tests {
    use super::*;
    use gcp_nuke::gcp::http::api_error;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_get_success_returns_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/instances"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let client = client(&server);
        let value = client.get(&client.sqladmin_url("instances")).await.unwrap();
        assert_eq!(value, json!({"items": []}));
    }

    #[tokio::test]
    async fn test_403_is_decoded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/test-project/datasets"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Access Denied: Project test-project",
                    "errors": [{"reason": "accessDenied"}]
                }
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .get(&client.bigquery_url("datasets"))
            .await
            .unwrap_err();

        let api = api_error(&err).expect("ApiError in chain");
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert_eq!(api.reason.as_deref(), Some("accessDenied"));
        assert_eq!(api.message, "Access Denied: Project test-project");
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The specified bucket does not exist."}
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .delete(&client.storage_bucket_url("gone"))
            .await
            .unwrap_err();

        assert!(api_error(&err).unwrap().is_not_found());
        assert!(format!("{:#}", err).contains("API request failed: 404"));
    }

    #[tokio::test]
    async fn test_empty_response_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/bkt"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client(&server);
        let value = client.delete(&client.storage_bucket_url("bkt")).await.unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_pagination_with_next_page_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/secrets"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"name": "projects/test-project/secrets/c"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/secrets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [
                    {"name": "projects/test-project/secrets/a"},
                    {"name": "projects/test-project/secrets/b"}
                ],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let items = client
            .get_all_pages(&client.secretmanager_url("secrets"), "secrets")
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
    }
}

mod adapter_tests {
    use super::*;
    use gcp_nuke::error::NukeError;
    use gcp_nuke::resource::services::{
        BigQueryDatasets, FunctionsInstances, SecretManagerSecrets, SqlInstances, StorageBuckets,
    };
    use gcp_nuke::resource::Resource;

    #[tokio::test]
    async fn test_sql_unprotect_that_never_finishes_blocks_delete() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "name": "db-1",
                    "region": "us-central1",
                    "settings": {"deletionProtectionEnabled": true}
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/v1/projects/test-project/instances/db-1"))
            .and(body_json(json!({"settings": {"deletionProtectionEnabled": false}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-unprotect",
                "status": "PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/operations/op-unprotect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-unprotect",
                "status": "RUNNING"
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v1/projects/test-project/instances/db-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut sql = SqlInstances::new(client(&server));
        sql.setup(run_config(200, 20));

        assert_eq!(sql.list(true).await.unwrap(), vec!["db-1"]);
        let err = sql.remove().await.unwrap_err();

        match err.downcast_ref::<NukeError>() {
            Some(NukeError::OperationTimeout { resource, kind, location, .. }) => {
                assert_eq!(resource, "db-1");
                assert_eq!(kind, "Deletion protection removal");
                assert_eq!(location, "us-central1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(sql.list(false).await.unwrap(), vec!["db-1"]);
    }

    #[tokio::test]
    async fn test_sql_delete_polls_until_done() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "db-2", "region": "europe-west1", "settings": {}}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v1/projects/test-project/instances/db-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-delete",
                "status": "PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/operations/op-delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-delete",
                "status": "DONE"
            })))
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut sql = SqlInstances::new(client(&server));
        sql.setup(run_config(1000, 10));

        sql.list(true).await.unwrap();
        sql.remove().await.unwrap();
        assert!(sql.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bucket_emptied_then_deleted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", "test-project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "bkt", "location": "US"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "bkt"})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt/o"))
            .and(query_param("versions", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "report.csv", "generation": "17"},
                    {"name": "report.csv", "generation": "18"}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/bkt/o/report.csv"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/bkt"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut buckets = StorageBuckets::new(client(&server));
        buckets.setup(run_config(1000, 10));

        assert_eq!(buckets.list(true).await.unwrap(), vec!["bkt"]);
        buckets.remove().await.unwrap();
        assert!(buckets.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_locked_bucket_is_refused() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "vault", "location": "EU"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/vault"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vault",
                "retentionPolicy": {"retentionPeriod": "86400", "isLocked": true}
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut buckets = StorageBuckets::new(client(&server));
        buckets.setup(run_config(1000, 10));

        buckets.list(true).await.unwrap();
        let err = buckets.remove().await.unwrap_err();
        assert!(format!("{:#}", err).contains("currently locked"));
        assert_eq!(buckets.list(false).await.unwrap(), vec!["vault"]);
    }

    #[tokio::test]
    async fn test_disabled_api_lists_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/test-project/datasets"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "BigQuery API has not been used in project 123 before or it is disabled.",
                    "status": "PERMISSION_DENIED",
                    "details": [{"reason": "SERVICE_DISABLED"}]
                }
            })))
            .mount(&server)
            .await;

        let mut datasets = BigQueryDatasets::new(client(&server));
        datasets.setup(run_config(1000, 10));

        assert!(datasets.list(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/test-project/datasets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasets": [{"datasetReference": {"datasetId": "analytics"}, "location": "US"}]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/test-project/datasets"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"code": 500, "message": "Backend error"}
            })))
            .mount(&server)
            .await;

        let mut datasets = BigQueryDatasets::new(client(&server));
        datasets.setup(run_config(1000, 10));

        assert_eq!(datasets.list(true).await.unwrap(), vec!["analytics"]);
        let err = datasets.list(true).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to list BigQueryDatasets"));
        assert_eq!(datasets.list(false).await.unwrap(), vec!["analytics"]);
    }

    #[tokio::test]
    async fn test_dataset_deleted_with_contents() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/test-project/datasets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasets": [{"datasetReference": {"datasetId": "analytics"}}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/bigquery/v2/projects/test-project/datasets/analytics"))
            .and(query_param("deleteContents", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut datasets = BigQueryDatasets::new(client(&server));
        datasets.setup(run_config(1000, 10));

        datasets.list(true).await.unwrap();
        datasets.remove().await.unwrap();
        assert!(datasets.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_secret_manager_missing_is_disabled() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/secrets"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "Not found"}
            })))
            .mount(&server)
            .await;

        let mut secrets = SecretManagerSecrets::new(client(&server));
        secrets.setup(run_config(1000, 10));

        assert!(secrets.list(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_function_delete_waits_for_operation() {
        let server = MockServer::start().await;
        let function = "projects/test-project/locations/us-central1/functions/hello";

        Mock::given(method("GET"))
            .and(path("/v2/projects/test-project/locations/-/functions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "functions": [{"name": function}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(format!("/v2/{}", function)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/operations/op-1",
                "done": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/projects/test-project/locations/us-central1/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/operations/op-1",
                "done": true
            })))
            .mount(&server)
            .await;

        let mut functions = FunctionsInstances::new(client(&server));
        functions.setup(run_config(1000, 10));

        assert_eq!(functions.list(true).await.unwrap(), vec![function]);
        functions.remove().await.unwrap();
        assert!(functions.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_before_setup_is_refused() {
        let server = MockServer::start().await;
        let secrets = SecretManagerSecrets::new(client(&server));

        let err = secrets.remove().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NukeError>(),
            Some(NukeError::NotConfigured(_))
        ));
    }
}

mod project_tests {
    use super::*;
    use gcp_nuke::gcp::projects::ProjectDeleter;
    use gcp_nuke::orchestrator::ProjectTeardown;

    #[tokio::test]
    async fn test_project_delete_waits_for_operation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/projects/test-project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/1234",
                "projectId": "test-project",
                "state": "ACTIVE"
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v3/projects/test-project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/dp-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v3/operations/dp-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/dp-1",
                "done": true
            })))
            .mount(&server)
            .await;

        let config = run_config(1000, 10);
        ProjectDeleter::new(client(&server))
            .delete_project(&config)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_project_already_pending_deletion() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/projects/test-project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projectId": "test-project",
                "state": "DELETE_REQUESTED"
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = run_config(1000, 10);
        ProjectDeleter::new(client(&server))
            .delete_project(&config)
            .await
            .unwrap();
    }
}

mod discovery_tests {
    use super::*;
    use gcp_nuke::gcp::zones::discover_locations;

    #[tokio::test]
    async fn test_locations_from_compute() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "europe-west1-c"}, {"name": "europe-west1-b"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "europe-west1"}]
            })))
            .mount(&server)
            .await;

        let (zones, regions) = discover_locations(&client(&server)).await;
        assert_eq!(zones, vec!["europe-west1-b", "europe-west1-c"]);
        assert_eq!(regions, vec!["europe-west1"]);
    }

    #[tokio::test]
    async fn test_locations_fall_back_without_compute() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Compute Engine API has not been used in project 123 before or it is disabled."
                }
            })))
            .mount(&server)
            .await;

        let (zones, regions) = discover_locations(&client(&server)).await;
        assert!(zones.contains(&"us-central1-a".to_string()));
        assert!(regions.contains(&"us-central1".to_string()));
    }
}
