//! Fleet manager REST wire types that never leave the adapter.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `PUT /stacks/{name}/compose`.
#[derive(Debug, Serialize)]
pub struct ComposeUpdate<'a> {
    /// New compose file content.
    pub content: &'a str,
}

/// Error message for a failed response: the body's `error` field, or
/// `HTTP <status>` when the body is not JSON or has no usable message.
#[must_use]
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
