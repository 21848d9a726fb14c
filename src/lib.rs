//! Jenkins PR Trigger - Receives GitHub pull-request webhooks and drives Jenkins.
//!
//! For every opened, reopened or synchronized pull request the service runs a
//! per-repository setup job, waits for it to leave the queue and succeed, then
//! triggers a named job in the branch's folder.

pub mod config;
pub mod jenkins;
pub mod poll;
pub mod server;
pub mod types;
pub mod webhooks;
