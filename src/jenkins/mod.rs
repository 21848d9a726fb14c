//! Jenkins API client and build orchestration.
//!
//! This module drives the Jenkins side of a pull-request build:
//! - An authenticated `reqwest` client with typed errors that carry the failing URL
//! - URL construction for the setup and trigger jobs, and host rewriting for
//!   build URLs Jenkins reports under its internal name
//! - The staged orchestrator: queue setup job, wait for it to start, wait for it
//!   to succeed, trigger the branch build

pub mod client;
pub mod error;
pub mod orchestrator;
pub mod urls;

pub use client::{DEFAULT_REQUEST_TIMEOUT, HttpMethod, JenkinsCallSpec, JenkinsClient, JenkinsCredentials};
pub use error::{JenkinsApiError, JenkinsErrorKind};
pub use orchestrator::{
    BuildStageResult, JobOrchestrator, OrchestrationError, OrchestratorConfig, Stage,
};
pub use urls::UrlError;
