//! Pull-request event classification.
//!
//! Decides, from the `X-GitHub-Event` header and the raw payload, whether a
//! webhook delivery should start a Jenkins build. Classification is pure and
//! total: every input maps to exactly one [`ClassifyOutcome`], and malformed
//! input is an outcome rather than an error.
//!
//! # Outcomes
//!
//! | Condition                                             | Outcome          |
//! |-------------------------------------------------------|------------------|
//! | Event header absent or not `pull_request`            | `NotPullRequest` |
//! | Body not JSON, or `action` missing or not a string    | `MissingFields`  |
//! | `action` not one of opened / reopened / synchronize   | `IgnoredAction`  |
//! | Accepted action but repository or head ref missing    | `MissingFields`  |
//! | Otherwise                                             | `Accepted`       |

use serde_json::Value;

use crate::types::{BranchName, RepoId};

/// The only event type this service acts on.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

/// Pull-request actions that trigger a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrAction {
    /// PR was opened.
    Opened,
    /// A closed PR was reopened.
    Reopened,
    /// PR head was updated (new commits pushed).
    Synchronize,
}

impl PrAction {
    /// Parses a webhook `action` value, returning `None` for actions that do
    /// not trigger a build (`closed`, `edited`, `labeled`, ...).
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "opened" => Some(PrAction::Opened),
            "reopened" => Some(PrAction::Reopened),
            "synchronize" => Some(PrAction::Synchronize),
            _ => None,
        }
    }
}

/// An accepted pull-request event with everything the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: PrAction,
    pub repo: RepoId,
    /// The PR head branch (`pull_request.head.ref`).
    pub branch: BranchName,
}

/// Result of classifying an inbound webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    /// The event is not a pull-request event.
    NotPullRequest,
    /// The body is unparsable or lacks a required field.
    MissingFields,
    /// A pull-request action this service deliberately does nothing for.
    IgnoredAction(String),
    /// The event should start a build.
    Accepted(PullRequestEvent),
}

/// Classifies a webhook delivery.
///
/// # Examples
///
/// ```
/// use jenkins_pr_trigger::webhooks::{ClassifyOutcome, classify_event};
///
/// let body = br#"{"action": "closed"}"#;
/// assert_eq!(
///     classify_event(Some("pull_request"), body),
///     ClassifyOutcome::IgnoredAction("closed".to_string()),
/// );
///
/// assert_eq!(classify_event(Some("push"), body), ClassifyOutcome::NotPullRequest);
/// ```
pub fn classify_event(event_type: Option<&str>, payload: &[u8]) -> ClassifyOutcome {
    if event_type != Some(PULL_REQUEST_EVENT) {
        return ClassifyOutcome::NotPullRequest;
    }

    let Ok(raw) = serde_json::from_slice::<Value>(payload) else {
        return ClassifyOutcome::MissingFields;
    };

    let Some(action_str) = raw.get("action").and_then(Value::as_str) else {
        return ClassifyOutcome::MissingFields;
    };

    let Some(action) = PrAction::parse(action_str) else {
        return ClassifyOutcome::IgnoredAction(action_str.to_string());
    };

    // The rest of the payload is only inspected for actions that build;
    // a field of the wrong type counts as missing.
    let field = |pointer: &str| raw.pointer(pointer).and_then(Value::as_str);

    match (
        field("/repository/owner/login"),
        field("/repository/name"),
        field("/pull_request/head/ref"),
    ) {
        (Some(owner), Some(name), Some(branch)) => ClassifyOutcome::Accepted(PullRequestEvent {
            action,
            repo: RepoId::new(owner, name),
            branch: BranchName::new(branch),
        }),
        _ => ClassifyOutcome::MissingFields,
    }
}
