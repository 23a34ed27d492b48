//! Error classification
//!
//! GCP is not consistent about when a just-deleted dependency stops blocking
//! its dependents, so some delete failures are worth retrying. Decisions
//! are made on the error text, which for API failures includes the
//! provider's reason code (see [`crate::gcp::http::ApiError`]).

use crate::error::NukeError;

/// Failures expected to clear up on their own
const TRANSIENT_PATTERNS: &[&str] = &[
    "resourceInUseByAnotherResource",
    "resourceNotReady",
    // Listings can lag deletes and hand back ghosts that 404 on delete.
    // Heuristic: a genuine not-found is retried too, and settles only once a
    // refreshed listing stops reporting it.
    "API request failed: 404",
];

/// Failures meaning the service is not enabled for the project at all
const SERVICE_DISABLED_PATTERNS: &[&str] = &[
    "API has not been used in project",
    "SERVICE_DISABLED",
    "it is disabled",
];

/// Should a failed `remove` be retried after a refresh?
pub fn is_transient(error: &anyhow::Error) -> bool {
    matches_any(error, TRANSIENT_PATTERNS)
}

/// Does a failed listing mean "this resource type does not apply here"?
pub fn is_service_disabled(error: &anyhow::Error) -> bool {
    let typed = error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<NukeError>(),
            Some(NukeError::CapabilityNotEnabled { .. })
        )
    });
    typed || matches_any(error, SERVICE_DISABLED_PATTERNS)
}

fn matches_any(error: &anyhow::Error, patterns: &[&str]) -> bool {
    let text = format!("{:#}", error);
    patterns.iter().any(|p| text.contains(p))
}
