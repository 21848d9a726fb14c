//! Process configuration.
//!
//! Everything the service needs is read once at startup, from positional
//! arguments and environment variables:
//!
//! | Setting             | Argument                   | Environment          |
//! |---------------------|----------------------------|----------------------|
//! | Listen port         | 1st positional             | `PORT`               |
//! | Jenkins base URL    | 2nd positional             | `JENKINS_URL`        |
//! | Webhook secret      | `--github-secret`          | `GITHUB_SECRET`      |
//! | Jenkins username    | `--jenkins-username`       | `JENKINS_USERNAME`   |
//! | Jenkins API token   | `--jenkins-api-token`      | `JENKINS_API_TOKEN`  |
//! | Trigger job name    | `--trigger-job`            | `TRIGGER_JOB_NAME`   |
//!
//! All of the above are required; a missing value aborts startup. Poll
//! intervals and budgets, and the per-call Jenkins timeout, have defaults and
//! can be overridden.

use std::fmt;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

use crate::jenkins::{JenkinsClient, JenkinsCredentials, JobOrchestrator, OrchestratorConfig};
use crate::poll::{InvalidPollSpec, PollSpec};

/// Errors in configuration values that clap cannot catch by itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The Jenkins URL is not an absolute http(s) URL.
    #[error("JENKINS_URL must be an http or https URL, got {0}")]
    InvalidJenkinsUrl(String),

    /// A poll budget does not exceed its interval.
    #[error("invalid {name} settings: {source}")]
    InvalidPoll {
        name: &'static str,
        #[source]
        source: InvalidPollSpec,
    },
}

/// Command-line and environment configuration.
#[derive(Clone, Parser)]
#[command(
    name = "jenkins-pr-trigger",
    version,
    about = "Receives GitHub pull-request webhooks and triggers Jenkins builds"
)]
pub struct Config {
    /// Port to listen on.
    #[arg(env = "PORT")]
    pub port: u16,

    /// Base URL of the Jenkins server, e.g. https://ci.example.com
    #[arg(env = "JENKINS_URL")]
    pub jenkins_url: Url,

    /// Shared secret GitHub signs webhook payloads with.
    #[arg(long, env = "GITHUB_SECRET", hide_env_values = true)]
    pub github_secret: String,

    /// Jenkins user the API token belongs to.
    #[arg(long, env = "JENKINS_USERNAME")]
    pub jenkins_username: String,

    /// Jenkins API token.
    #[arg(long, env = "JENKINS_API_TOKEN", hide_env_values = true)]
    pub jenkins_api_token: String,

    /// Job triggered in the branch folder after the setup job succeeds.
    #[arg(long, env = "TRIGGER_JOB_NAME")]
    pub trigger_job: String,

    /// Interval between queue-item polls, in milliseconds.
    #[arg(long, env = "QUEUE_POLL_INTERVAL_MS", default_value_t = 500)]
    pub queue_poll_interval_ms: u64,

    /// Budget for the setup job to leave the queue, in milliseconds.
    #[arg(long, env = "QUEUE_POLL_TIMEOUT_MS", default_value_t = 20_000)]
    pub queue_poll_timeout_ms: u64,

    /// Interval between setup-build status polls, in milliseconds.
    #[arg(long, env = "STATUS_POLL_INTERVAL_MS", default_value_t = 500)]
    pub status_poll_interval_ms: u64,

    /// Budget for the setup build to succeed, in milliseconds.
    #[arg(long, env = "STATUS_POLL_TIMEOUT_MS", default_value_t = 50_000)]
    pub status_poll_timeout_ms: u64,

    /// Limit on each individual Jenkins call, in milliseconds.
    #[arg(long, env = "JENKINS_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,
}

impl Config {
    /// Returns the Jenkins credentials.
    pub fn credentials(&self) -> JenkinsCredentials {
        JenkinsCredentials::new(&self.jenkins_username, &self.jenkins_api_token)
    }

    /// Returns the webhook secret as bytes.
    pub fn webhook_secret(&self) -> &[u8] {
        self.github_secret.as_bytes()
    }

    /// Validates the Jenkins URL and poll settings and builds the orchestrator config.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        let queue_poll = PollSpec::from_millis(self.queue_poll_interval_ms, self.queue_poll_timeout_ms)
            .map_err(|source| ConfigError::InvalidPoll {
                name: "queue poll",
                source,
            })?;
        let status_poll =
            PollSpec::from_millis(self.status_poll_interval_ms, self.status_poll_timeout_ms)
                .map_err(|source| ConfigError::InvalidPoll {
                    name: "status poll",
                    source,
                })?;

        Ok(OrchestratorConfig {
            trigger_job: self.trigger_job.clone(),
            queue_poll,
            status_poll,
        })
    }

    /// Builds the orchestrator this configuration describes.
    pub fn orchestrator(&self) -> Result<JobOrchestrator, ConfigError> {
        if !matches!(self.jenkins_url.scheme(), "http" | "https") || self.jenkins_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidJenkinsUrl(self.jenkins_url.to_string()));
        }

        let client = JenkinsClient::new(self.jenkins_url.clone(), &self.credentials())
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms));
        Ok(JobOrchestrator::new(client, self.orchestrator_config()?))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("jenkins_url", &self.jenkins_url.as_str())
            .field("jenkins_username", &self.jenkins_username)
            .field("trigger_job", &self.trigger_job)
            .field("queue_poll_interval_ms", &self.queue_poll_interval_ms)
            .field("queue_poll_timeout_ms", &self.queue_poll_timeout_ms)
            .field("status_poll_interval_ms", &self.status_poll_interval_ms)
            .field("status_poll_timeout_ms", &self.status_poll_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish_non_exhaustive()
    }
}
