//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA1)
//! - Classification of pull-request events into accepted, ignored or rejected

pub mod classify;
pub mod signature;

pub use classify::{ClassifyOutcome, PrAction, PullRequestEvent, classify_event};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
