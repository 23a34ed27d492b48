//! Operation Poller
//!
//! Drives a submitted long-running provider operation to completion:
//!
//! ```text
//! SUBMITTED -> POLLING -> DONE | TIMED_OUT | FAILED
//! ```
//!
//! Used for resource deletes, for lifting deletion protection ahead of a
//! delete, and for project removal.

use crate::config::RunConfig;
use crate::error::NukeError;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

/// Remote status of an operation, as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Done,
    /// Finished, but with an error
    Failed(String),
}

/// Poller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Submitted,
    Polling,
    Done,
    TimedOut,
    Failed(String),
}

/// What an operation is acting on, for log lines and errors
#[derive(Debug, Clone, Copy)]
pub struct OperationTarget<'a> {
    /// e.g. "Resource deletion", "Deletion protection removal"
    pub kind: &'a str,
    pub resource_type: &'a str,
    pub resource_id: &'a str,
    pub location: &'a str,
}

pub struct OperationPoller<'a> {
    config: &'a RunConfig,
}

impl<'a> OperationPoller<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Poll `check` until the operation is done.
    ///
    /// `submitted` is what the submitting call already told us; `Done` there
    /// short-circuits without polling. Returns the time spent polling.
    pub async fn wait<F, Fut>(
        &self,
        target: &OperationTarget<'_>,
        submitted: OperationStatus,
        mut check: F,
    ) -> Result<Duration>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<OperationStatus>>,
    {
        let mut state = OperationState::Submitted;
        let mut status = submitted;
        let mut elapsed = Duration::ZERO;

        loop {
            state = match state {
                OperationState::Submitted | OperationState::Polling
                    if status != OperationStatus::Running =>
                {
                    match status {
                        OperationStatus::Failed(ref message) => {
                            OperationState::Failed(message.clone())
                        }
                        _ => OperationState::Done,
                    }
                }
                OperationState::Submitted => OperationState::Polling,
                OperationState::Polling => {
                    if elapsed > self.config.timeout {
                        OperationState::TimedOut
                    } else {
                        tracing::info!(
                            "[Info] {} in progress for {} [type: {} project: {} location: {}] ({} seconds)",
                            target.kind,
                            target.resource_id,
                            target.resource_type,
                            self.config.project,
                            target.location,
                            elapsed.as_secs()
                        );
                        self.config.sleep_poll_interval().await?;
                        elapsed += self.config.poll_interval;
                        status = check().await.with_context(|| {
                            format!(
                                "Failed to check {} status for {}",
                                target.kind.to_lowercase(),
                                target.resource_id
                            )
                        })?;
                        OperationState::Polling
                    }
                }
                OperationState::Done => {
                    tracing::info!(
                        "[Info] {} completed for {} [type: {} project: {} location: {}] ({} seconds)",
                        target.kind,
                        target.resource_id,
                        target.resource_type,
                        self.config.project,
                        target.location,
                        elapsed.as_secs()
                    );
                    return Ok(elapsed);
                }
                OperationState::TimedOut => {
                    return Err(NukeError::OperationTimeout {
                        resource: target.resource_id.to_string(),
                        kind: target.kind.to_string(),
                        project: self.config.project.clone(),
                        location: target.location.to_string(),
                        elapsed: elapsed.as_secs(),
                    }
                    .into());
                }
                OperationState::Failed(message) => {
                    return Err(NukeError::OperationFailed {
                        resource: target.resource_id.to_string(),
                        kind: target.kind.to_string(),
                        message,
                    }
                    .into());
                }
            };
        }
    }
}
