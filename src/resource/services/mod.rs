//! Concrete resource types
//!
//! One module per GCP service. Each type owns a [`GcpClient`] clone and a
//! [`super::ResourceBase`], and talks to the service's REST API directly.

mod bigquery;
mod functions;
mod secretmanager;
mod sql;
mod storage;

pub use bigquery::BigQueryDatasets;
pub use functions::FunctionsInstances;
pub use secretmanager::SecretManagerSecrets;
pub use sql::SqlInstances;
pub use storage::StorageBuckets;

use super::Resource;
use crate::gcp::client::GcpClient;

/// Every built-in resource type
pub fn all(client: &GcpClient) -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(StorageBuckets::new(client.clone())),
        Box::new(BigQueryDatasets::new(client.clone())),
        Box::new(SecretManagerSecrets::new(client.clone())),
        Box::new(SqlInstances::new(client.clone())),
        Box::new(FunctionsInstances::new(client.clone())),
    ]
}

/// String field of a JSON object
fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}
