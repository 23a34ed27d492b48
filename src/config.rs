//! Configuration Management
//!
//! [`RunConfig`] is the immutable parameter set every task of a run shares.
//! [`Settings`] are optional user defaults read from
//! `~/.config/gcp-nuke/config.json`; nothing is ever written back.

use crate::error::NukeError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-resource timeout when neither CLI nor settings give one
pub const DEFAULT_TIMEOUT_SECS: u64 = 400;

/// Poll interval when neither CLI nor settings give one
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Parameters of one run, shared read-only by every task
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub project: String,
    /// List only, never delete
    pub dry_run: bool,
    /// Leave the project itself in place once emptied
    pub keep_project: bool,
    /// Deadline for every bounded wait (dependency, operation, retry)
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub cancel: CancellationToken,
    pub zones: Vec<String>,
    pub regions: Vec<String>,
}

impl RunConfig {
    /// Safe defaults: dry run, keep the project
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            dry_run: true,
            keep_project: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            cancel: CancellationToken::new(),
            zones: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Both the timeout and the poll interval must be non-zero; every
    /// bounded wait advances by one poll interval per round.
    pub fn validate(&self) -> Result<(), NukeError> {
        if self.timeout.is_zero() {
            return Err(NukeError::InvalidConfig("timeout must be non-zero".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(NukeError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sleep one poll interval, unless the run is cancelled first
    pub async fn sleep_poll_interval(&self) -> Result<(), NukeError> {
        if self.poll_interval.is_zero() {
            return Err(NukeError::InvalidConfig("poll interval is zero".to_string()));
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(NukeError::Cancelled),
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
        }
    }
}

/// User defaults from the settings file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub project_id: Option<String>,
    /// Seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Seconds
    #[serde(default)]
    pub poll_interval: Option<u64>,
}

impl Settings {
    /// Default settings file path
    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcp-nuke").join("config.json"))
    }

    /// Load settings.
    ///
    /// An explicitly given file must exist and parse; the default location is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Get effective project (CLI > settings > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|s| s.to_string())
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Get effective timeout (CLI > settings > default)
    pub fn effective_timeout(&self, cli: Option<u64>) -> Result<Duration, NukeError> {
        non_zero_secs(
            "timeout",
            cli.or(self.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Get effective poll interval (CLI > settings > default)
    pub fn effective_poll_interval(&self, cli: Option<u64>) -> Result<Duration, NukeError> {
        non_zero_secs(
            "poll interval",
            cli.or(self.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }
}

fn non_zero_secs(what: &str, secs: u64) -> Result<Duration, NukeError> {
    if secs == 0 {
        return Err(NukeError::InvalidConfig(format!(
            "{} must be at least 1 second",
            what
        )));
    }
    Ok(Duration::from_secs(secs))
}
