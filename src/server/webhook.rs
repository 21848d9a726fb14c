//! Webhook endpoint handler.
//!
//! Gates GitHub deliveries on their signature and event type, then runs the
//! Jenkins sequence for accepted pull-request events and answers once it has
//! finished. The status code is the whole contract; bodies are diagnostic.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::jenkins::OrchestrationError;
use crate::webhooks::{ClassifyOutcome, classify_event, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for the GitHub HMAC-SHA1 signature.
const HEADER_SIGNATURE: &str = "x-hub-signature";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, or not matching the payload.
    #[error("invalid signature")]
    InvalidSignature,

    /// Event header missing or not `pull_request`.
    #[error("unsupported event type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnsupportedEventType(Option<String>),

    /// Body unparsable or missing a required field.
    #[error("missing required fields in payload")]
    MissingRequiredFields,

    /// The Jenkins sequence failed.
    #[error("{0}")]
    Orchestration(#[from] OrchestrationError),

    /// Anything else that went wrong while handling the request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidSignature => StatusCode::BAD_REQUEST,
            WebhookError::UnsupportedEventType(_) => StatusCode::BAD_REQUEST,
            WebhookError::MissingRequiredFields => StatusCode::BAD_REQUEST,
            WebhookError::Orchestration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-GitHub-Event`: must be `pull_request`
///   - `X-Hub-Signature`: `sha1=<hex>` HMAC of the raw body
/// - Body: JSON pull-request webhook payload
///
/// # Response
///
/// - 200 OK: action ignored, or setup and trigger jobs both ran
/// - 400 Bad Request: bad signature, wrong event type, or missing fields
/// - 500 Internal Server Error: Jenkins failure, timeout, or internal error
///
/// # Example
///
/// ```ignore
/// POST / HTTP/1.1
/// X-GitHub-Event: pull_request
/// X-Hub-Signature: sha1=...
/// Content-Type: application/json
///
/// {"action": "opened", "pull_request": {"head": {"ref": "branch"}}, "repository": {...}}
///
/// HTTP/1.1 200 OK
/// ```
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT);
    let signature = get_header(&headers, HEADER_SIGNATURE);

    debug!(event_type = ?event_type, bytes = body.len(), "Received webhook");

    // The signature covers the bytes exactly as sent, so it is checked
    // before anything is parsed.
    if !verify_signature(&body, signature, app_state.webhook_secret()) {
        warn!(event_type = ?event_type, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let event = match classify_event(event_type, &body) {
        ClassifyOutcome::Accepted(event) => event,
        ClassifyOutcome::IgnoredAction(action) => {
            debug!(action = %action, "Ignoring pull request action");
            return Ok((StatusCode::OK, "Ignored"));
        }
        ClassifyOutcome::NotPullRequest => {
            warn!(event_type = ?event_type, "Rejecting non pull_request event");
            return Err(WebhookError::UnsupportedEventType(
                event_type.map(str::to_string),
            ));
        }
        ClassifyOutcome::MissingFields => {
            warn!("Rejecting pull_request event with missing fields");
            return Err(WebhookError::MissingRequiredFields);
        }
    };

    info!(
        action = ?event.action,
        repo = %event.repo,
        branch = %event.branch,
        "Starting Jenkins build sequence"
    );

    // Run in a separate task: a client hanging up does not abandon a sequence
    // that has already queued jobs, and a panic surfaces as a JoinError.
    let orchestrator = app_state.orchestrator().clone();
    let task_event = event.clone();
    let outcome = tokio::spawn(async move { orchestrator.run(&task_event).await }).await;

    match outcome {
        Ok(Ok(())) => Ok((StatusCode::OK, "OK")),
        Ok(Err(e)) => {
            warn!(
                repo = %event.repo,
                branch = %event.branch,
                error = %e,
                "Jenkins build sequence failed"
            );
            Err(WebhookError::Orchestration(e))
        }
        Err(join_error) => {
            warn!(
                repo = %event.repo,
                branch = %event.branch,
                error = %join_error,
                "Jenkins build sequence task aborted"
            );
            Err(WebhookError::Internal(join_error.to_string()))
        }
    }
}

/// Returns a header value if present and valid UTF-8.
fn get_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
