//! Jenkins API error types.
//!
//! Every outbound call that fails, whether at the transport level, with a
//! non-2xx status, or with a response we cannot interpret, becomes a
//! [`JenkinsApiError`] carrying the URL that was being called. The URL is what
//! operators need in the logs; the webhook caller only ever sees a 500.

use std::fmt;
use thiserror::Error;

/// The kind of Jenkins API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JenkinsErrorKind {
    /// The request never produced a response (connection refused, DNS, TLS, ...).
    Transport,

    /// Jenkins answered with a non-2xx status.
    Status,

    /// Jenkins answered 2xx but the response could not be used
    /// (missing `Location` header, body that is not the expected JSON, ...).
    InvalidResponse,
}

/// A failed call to the Jenkins API.
#[derive(Debug, Error)]
pub struct JenkinsApiError {
    /// What went wrong.
    pub kind: JenkinsErrorKind,

    /// The URL that was being called.
    pub url: String,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying reqwest error, if available.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for JenkinsApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(
                f,
                "Jenkins API error (HTTP {}) for {}: {}",
                code, self.url, self.message
            ),
            None => write!(f, "Jenkins API error for {}: {}", self.url, self.message),
        }
    }
}

impl JenkinsApiError {
    /// Creates an error for a request that produced no response.
    pub fn transport(url: impl fmt::Display, source: reqwest::Error) -> Self {
        Self {
            kind: JenkinsErrorKind::Transport,
            url: url.to_string(),
            status_code: None,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an error for a non-2xx response.
    pub fn status(url: impl fmt::Display, status_code: u16) -> Self {
        Self {
            kind: JenkinsErrorKind::Status,
            url: url.to_string(),
            status_code: Some(status_code),
            message: "unexpected response status".to_string(),
            source: None,
        }
    }

    /// Creates an error for a response that could not be interpreted.
    pub fn invalid_response(url: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            kind: JenkinsErrorKind::InvalidResponse,
            url: url.to_string(),
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error for a body that did not decode as the expected JSON.
    pub fn decode(url: impl fmt::Display, source: reqwest::Error) -> Self {
        Self {
            kind: JenkinsErrorKind::InvalidResponse,
            url: url.to_string(),
            status_code: source.status().map(|s| s.as_u16()),
            message: format!("failed to decode response body: {}", source),
            source: Some(source),
        }
    }
}
