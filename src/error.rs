//! Error taxonomy for a nuke run
//!
//! Provider failures travel as [`anyhow::Error`] (usually wrapping
//! [`crate::gcp::http::ApiError`]); the conditions the orchestrator itself
//! raises are typed here so callers can `downcast_ref::<NukeError>()`.

use thiserror::Error;

/// Failures raised by the deletion machinery
#[derive(Debug, Error)]
pub enum NukeError {
    /// A dependency never drained within the timeout
    #[error("Resource {resource} timed out whilst waiting for dependency {dependency} to delete ({elapsed} seconds)")]
    DependencyTimeout {
        resource: String,
        dependency: String,
        elapsed: u64,
    },

    /// Transient failures kept coming until the retry budget ran out
    #[error("Resource {resource} timed out whilst trying to delete ({elapsed} seconds): {last_error}")]
    RemovalTimeout {
        resource: String,
        elapsed: u64,
        last_error: String,
    },

    /// A long-running provider operation never reached DONE
    #[error("{kind} timed out for {resource} [project: {project} location: {location}] ({elapsed} seconds)")]
    OperationTimeout {
        resource: String,
        kind: String,
        project: String,
        location: String,
        elapsed: u64,
    },

    /// A long-running provider operation finished with an error
    #[error("{kind} failed for {resource}: {message}")]
    OperationFailed {
        resource: String,
        kind: String,
        message: String,
    },

    /// Fatal provider error, annotated with what is still left to delete
    #[error("Resource: {resource}. Items: {items:?}. Details of error below:\n {message}")]
    Removal {
        resource: String,
        items: Vec<String>,
        message: String,
    },

    /// The service behind a resource type is not enabled in the project.
    /// Listings turn this into zero instances; it never reaches the user.
    #[error("{service} API is not enabled in project {project}")]
    CapabilityNotEnabled { service: String, project: String },

    /// The set of resource types cannot be run as given
    #[error("Invalid resource registry: {0}")]
    InvalidRegistry(String),

    /// Run parameters that would make a bounded wait unbounded
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `list`/`remove` was called before `setup`
    #[error("Resource {0} used before setup")]
    NotConfigured(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl NukeError {
    /// True for the three deadline conditions
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            NukeError::DependencyTimeout { .. }
                | NukeError::RemovalTimeout { .. }
                | NukeError::OperationTimeout { .. }
        )
    }
}
