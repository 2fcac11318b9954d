use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired - please sign in again")]
    SessionExpired,

    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    #[error("Server did not respond in time")]
    Timeout,

    #[error("Could not reach the server: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build a `Server` error from a non-success status and its body.
    ///
    /// The message prefers the body's `message` field, then `error`, then
    /// the raw body, and finally the status reason.
    pub fn from_status(status: StatusCode, body: Option<&Value>) -> Self {
        let message = body
            .and_then(|b| {
                b.get("message")
                    .and_then(Value::as_str)
                    .or_else(|| b.get("error").and_then(Value::as_str))
                    .map(str::to_string)
                    .or_else(|| match b {
                        Value::String(s) if !s.is_empty() => Some(s.clone()),
                        Value::Object(_) | Value::Array(_) => Some(b.to_string()),
                        _ => None,
                    })
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        ApiError::Server {
            status,
            message: Self::truncate_body(&message),
        }
    }

    /// True when the caller has to sign in again
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
