//! Matrix Client-Server API error type, grounded on [`crate::error::LettaError`]'s
//! status-to-variant mapping but scoped to what the Matrix C-S API actually
//! returns (`errcode`/`error` bodies, per the spec).

use std::fmt;

/// Errors from calling the Matrix Client-Server API.
#[derive(thiserror::Error, Debug)]
pub enum MatrixError {
    /// The underlying HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The homeserver returned a structured `errcode`/`error` response.
    #[error("matrix API error {status} ({errcode}): {error}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Matrix `errcode`, e.g. `M_FORBIDDEN`, `M_LIMIT_EXCEEDED`.
        errcode: String,
        /// Human-readable error message.
        error: String,
        /// `retry_after_ms` from a 429 response, if present.
        retry_after_ms: Option<u64>,
    },

    /// JSON (de)serialization failed.
    #[error("serialization error")]
    Serde(#[from] serde_json::Error),

    /// URL construction failed.
    #[error("invalid URL")]
    Url(#[from] url::ParseError),

    /// No cached access token for this Matrix identity, and no password
    /// available to log in with.
    #[error("no access token cached for {user_id} and login was not attempted")]
    NotAuthenticated {
        /// The Matrix user ID that needed a token.
        user_id: String,
    },
}

impl MatrixError {
    /// Parse a Matrix API error response body (`{"errcode": ..., "error": ...}`).
    pub fn from_response(status: u16, body: &str, retry_after_ms: Option<u64>) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            errcode: String,
            #[serde(default)]
            error: String,
        }

        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or(ErrorBody {
            errcode: "M_UNKNOWN".to_string(),
            error: body.to_string(),
        });

        Self::Api {
            status,
            errcode: parsed.errcode,
            error: parsed.error,
            retry_after_ms,
        }
    }

    /// Whether this error should trigger the caller's retry logic.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, errcode, .. } => {
                *status == 429 || errcode == "M_LIMIT_EXCEEDED" || matches!(status, 500..=599)
            }
            _ => false,
        }
    }

    /// Whether this is a 403 `M_FORBIDDEN` (the bridge's identity lacks
    /// permission — often because it was kicked or never joined).
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Api { status: 403, .. })
    }

    /// Whether this is an auth failure (401/`M_UNKNOWN_TOKEN`) — the caller
    /// should re-login rather than retry with the same token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}

impl crate::retry::Retryable for MatrixError {
    fn is_retryable(&self) -> bool {
        MatrixError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Api {
                retry_after_ms: Some(ms),
                ..
            } => Some(std::time::Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

impl miette::Diagnostic for MatrixError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Self::Http(_) => Some(Box::new("bridge::matrix::http")),
            Self::Api { errcode, .. } => Some(Box::new(format!("bridge::matrix::{errcode}"))),
            Self::Serde(_) => Some(Box::new("bridge::matrix::serde")),
            Self::Url(_) => Some(Box::new("bridge::matrix::url")),
            Self::NotAuthenticated { .. } => Some(Box::new("bridge::matrix::not_authenticated")),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Self::Api { status: 401, .. } => {
                Some(Box::new("The access token is invalid or has expired; re-login this identity."))
            }
            Self::Api { status: 403, .. } => Some(Box::new(
                "This identity lacks permission for the room — it may have been kicked, banned, \
                 or never joined.",
            )),
            Self::NotAuthenticated { .. } => Some(Box::new(
                "Call `login` for this identity before making authenticated requests.",
            )),
            _ => None,
        }
    }
}
