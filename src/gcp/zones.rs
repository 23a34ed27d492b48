//! GCP Zones and Regions
//!
//! Discovery of the locations a project can hold resources in.

use super::client::GcpClient;
use anyhow::Result;
use std::collections::BTreeSet;

/// List the zone names available to the project
pub async fn list_zones(client: &GcpClient) -> Result<Vec<String>> {
    list_names(client, "zones").await
}

/// List the region names available to the project
pub async fn list_regions(client: &GcpClient) -> Result<Vec<String>> {
    list_names(client, "regions").await
}

async fn list_names(client: &GcpClient, collection: &str) -> Result<Vec<String>> {
    let items = client
        .get_all_pages(&client.compute_url(collection), "items")
        .await?;

    let mut names: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("name").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Zones and regions for the run, falling back to the static list when
/// the Compute API cannot be queried (commonly: not enabled).
pub async fn discover_locations(client: &GcpClient) -> (Vec<String>, Vec<String>) {
    let zones = match list_zones(client).await {
        Ok(zones) if !zones.is_empty() => {
            tracing::info!("Loaded {} zones", zones.len());
            zones
        }
        Ok(_) => {
            tracing::warn!("No zones returned, using static list");
            static_zones()
        }
        Err(e) => {
            tracing::warn!("Failed to list zones: {:#}, using static list", e);
            static_zones()
        }
    };

    let regions = match list_regions(client).await {
        Ok(regions) if !regions.is_empty() => regions,
        Ok(_) => regions_of(&zones),
        Err(e) => {
            tracing::warn!("Failed to list regions: {:#}, deriving from zones", e);
            regions_of(&zones)
        }
    };

    (zones, regions)
}

/// Region of a zone: `us-central1-a` -> `us-central1`
pub fn region_of(zone: &str) -> &str {
    zone.rsplit_once('-').map(|(region, _)| region).unwrap_or(zone)
}

/// Distinct sorted regions covering `zones`
pub fn regions_of(zones: &[String]) -> Vec<String> {
    zones
        .iter()
        .map(|z| region_of(z).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Common GCP zones, used when discovery fails
pub fn static_zones() -> Vec<String> {
    [
        // US
        "us-central1-a",
        "us-central1-b",
        "us-central1-c",
        "us-central1-f",
        "us-east1-b",
        "us-east1-c",
        "us-east1-d",
        "us-east4-a",
        "us-east4-b",
        "us-east4-c",
        "us-west1-a",
        "us-west1-b",
        "us-west1-c",
        "us-west2-a",
        "us-west2-b",
        "us-west2-c",
        // Europe
        "europe-west1-b",
        "europe-west1-c",
        "europe-west1-d",
        "europe-west2-a",
        "europe-west2-b",
        "europe-west2-c",
        "europe-west3-a",
        "europe-west3-b",
        "europe-west3-c",
        "europe-west4-a",
        "europe-west4-b",
        "europe-west4-c",
        "europe-north1-a",
        "europe-north1-b",
        "europe-north1-c",
        // Asia
        "asia-east1-a",
        "asia-east1-b",
        "asia-east1-c",
        "asia-northeast1-a",
        "asia-northeast1-b",
        "asia-northeast1-c",
        "asia-southeast1-a",
        "asia-southeast1-b",
        "asia-southeast1-c",
        // Australia
        "australia-southeast1-a",
        "australia-southeast1-b",
        "australia-southeast1-c",
        // South America
        "southamerica-east1-a",
        "southamerica-east1-b",
        "southamerica-east1-c",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
