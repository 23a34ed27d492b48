//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A non-success response from a GCP API
///
/// The display form carries the status, the machine-readable reason and the
/// provider message, since retry and soft-skip decisions are made by
/// matching on that text.
#[derive(Debug, Clone, Error)]
#[error("API request failed: {status}{} - {message}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
pub struct ApiError {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub message: String,
}

impl ApiError {
    /// Build from a status and the raw response body
    ///
    /// Understands both error shapes GCP returns: the legacy
    /// `error.errors[].reason` list and the newer `error.status` /
    /// `error.details[].reason` form.
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| sanitize_for_log(body));

        let reason = error.and_then(|e| {
            e.get("errors")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.iter().find_map(|x| x.get("reason")?.as_str()))
                .or_else(|| {
                    e.get("details")
                        .and_then(|v| v.as_array())
                        .and_then(|arr| arr.iter().find_map(|x| x.get("reason")?.as_str()))
                })
                .or_else(|| e.get("status").and_then(|s| s.as_str()))
                .map(|s| s.to_string())
        });

        Self {
            status,
            reason,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcp-nuke/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.execute(self.client.get(url).bearer_auth(token)).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PATCH {}", url);
        self.execute(self.client.patch(url).bearer_auth(token).json(body))
            .await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.execute(self.client.delete(url).bearer_auth(token)).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized/truncated body goes to the log
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError::from_body(status, &body).into());
        }

        // Deletes commonly answer 204 with no body
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Pull the [`ApiError`] out of an error chain, if there is one
pub fn api_error(error: &anyhow::Error) -> Option<&ApiError> {
    error.chain().find_map(|e| e.downcast_ref::<ApiError>())
}

/// Format a GCP API error for the final operator report
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    let Some(api) = api_error(error) else {
        return format!("{:#}", error);
    };

    let hint = match api.status.as_u16() {
        401 => "Authentication failed. Run 'gcloud auth application-default login'.",
        403 => "Permission denied. Check your GCP IAM permissions.",
        404 => "Resource not found.",
        409 => "Resource conflict. The resource may be in use.",
        429 => "Rate limit exceeded. Please try again later.",
        500 | 503 => "GCP service temporarily unavailable. Please try again.",
        _ => return format!("{:#}", error),
    };

    format!("{} ({:#})", hint, error)
}
