//! Shared HTTP plumbing for the REST clients.
//!
//! Both the commerce backend and the payment gateway are JSON-over-HTTP
//! collaborators. Status handling is centralized here so every client maps
//! rate limiting, not-found, and unexpected statuses identically.

use thiserror::Error;

/// Errors from a REST API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server responded with a non-success status.
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read a JSON body from a response, mapping error statuses to [`ApiError`].
///
/// `resource` is used in the `NotFound` message when the server returns 404.
///
/// # Errors
///
/// Returns `ApiError::RateLimited` on 429 (honoring `Retry-After`),
/// `ApiError::NotFound` on 404, `ApiError::Status` on any other non-success
/// status, and `ApiError::Parse` if the body is not valid JSON.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T, ApiError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(resource.to_string()));
    }

    // Read the body as text first for better error diagnostics.
    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "API returned non-success status"
        );
        return Err(ApiError::Status {
            status,
            body: body.chars().take(200).collect(),
        });
    }

    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            Err(ApiError::Parse(e))
        }
    }
}
