//! The staged Jenkins build sequence for one pull-request event.
//!
//! An accepted event drives four dependent stages, strictly in order:
//!
//! 1. **TriggerSetup**: `POST job/setup_{owner}-{repo}/buildWithParameters`
//!    with `RECONFIGURE_BRANCH={branch}`. Jenkins answers with a `Location`
//!    header naming the queue item.
//! 2. **PollQueued**: poll the queue item until it reports
//!    `executable.url`, the URL of the setup build it turned into.
//! 3. **PollStatus**: rewrite that URL onto the configured Jenkins host and
//!    poll it until `result` is `SUCCESS`. `FAILURE` ends the sequence at once.
//! 4. **TriggerBuild**: `POST job/{owner}-{repo}/job/{branch}/job/{trigger}/build`.
//!
//! Each stage is an async fn returning `Result`; the first failure
//! short-circuits the rest. Only the two poll stages ever repeat a call, and
//! only within their own interval/budget.

use std::fmt;
use std::time::Duration;

use reqwest::header::LOCATION;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::client::JenkinsClient;
use super::error::JenkinsApiError;
use super::urls::{self, UrlError};
use crate::poll::{PollError, PollOutcome, PollSpec, poll};
use crate::webhooks::PullRequestEvent;

/// Queue poll: every 500 ms for up to 20 s.
pub const DEFAULT_QUEUE_POLL: PollSpec = match PollSpec::from_millis(500, 20_000) {
    Ok(spec) => spec,
    Err(_) => panic!("queue poll timeout must exceed its interval"),
};

/// Status poll: every 500 ms for up to 50 s.
pub const DEFAULT_STATUS_POLL: PollSpec = match PollSpec::from_millis(500, 50_000) {
    Ok(spec) => spec,
    Err(_) => panic!("status poll timeout must exceed its interval"),
};

/// The stages of an orchestration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TriggerSetup,
    PollQueued,
    PollStatus,
    TriggerBuild,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::TriggerSetup => "trigger_setup",
            Stage::PollQueued => "poll_queued",
            Stage::PollStatus => "poll_status",
            Stage::TriggerBuild => "trigger_build",
        };
        f.write_str(name)
    }
}

/// Progress of the setup build as reported by its `result` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStageResult {
    /// Still running, or finished with a result we keep waiting past.
    Pending,
    Succeeded,
    Failed(String),
}

impl BuildStageResult {
    /// Interprets a Jenkins build `result`.
    ///
    /// Only `SUCCESS` and `FAILURE` are terminal. Anything else, including
    /// `null` while the build runs, is pending.
    pub fn from_result(result: Option<&str>) -> Self {
        match result {
            Some("SUCCESS") => BuildStageResult::Succeeded,
            Some(failed @ "FAILURE") => BuildStageResult::Failed(failed.to_string()),
            _ => BuildStageResult::Pending,
        }
    }
}

/// Errors that end an orchestration.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A poll stage did not observe completion within its budget.
    #[error("{stage} did not complete within {timeout:?}")]
    PollTimeout { stage: Stage, timeout: Duration },

    /// The setup build finished unsuccessfully.
    #[error("setup build {build_url} finished with {result}")]
    BuildFailed { build_url: String, result: String },

    /// A call to Jenkins failed or returned something unusable.
    #[error("downstream call failed: {0}")]
    DownstreamCallFailure(#[from] JenkinsApiError),

    /// A Jenkins URL could not be built.
    #[error("invalid Jenkins URL: {0}")]
    InvalidUrl(#[from] UrlError),
}

/// Settings for [`JobOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Name of the job triggered inside the branch folder once setup succeeds.
    pub trigger_job: String,

    /// Interval and budget for waiting on the setup job's queue item.
    pub queue_poll: PollSpec,

    /// Interval and budget for waiting on the setup build's result.
    pub status_poll: PollSpec,
}

impl OrchestratorConfig {
    /// Creates a config with the default poll intervals and budgets.
    pub fn new(trigger_job: impl Into<String>) -> Self {
        Self {
            trigger_job: trigger_job.into(),
            queue_poll: DEFAULT_QUEUE_POLL,
            status_poll: DEFAULT_STATUS_POLL,
        }
    }
}

/// `GET {queue item}/api/json`
#[derive(Debug, Deserialize)]
struct QueueItem {
    executable: Option<QueueExecutable>,
}

#[derive(Debug, Deserialize)]
struct QueueExecutable {
    url: Option<String>,
}

/// `GET {build}/api/json`
#[derive(Debug, Deserialize)]
struct BuildStatus {
    result: Option<String>,
}

/// Runs the setup-then-trigger sequence against one Jenkins server.
///
/// Holds no per-request state; one instance serves all requests, and every
/// call to [`run`](Self::run) is independent of the others.
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    client: JenkinsClient,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    pub fn new(client: JenkinsClient, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    /// Runs all four stages for `event`.
    pub async fn run(&self, event: &PullRequestEvent) -> Result<(), OrchestrationError> {
        let queue_item = self.trigger_setup(event).await?;
        let build_url = self.wait_until_started(&queue_item).await?;
        self.wait_for_success(&build_url).await?;
        self.trigger_build(event).await?;

        info!(
            repo = %event.repo,
            branch = %event.branch,
            setup_build = %build_url,
            "Triggered {}",
            self.config.trigger_job
        );
        Ok(())
    }

    /// Stage 1: queue the setup job and return its queue item URL.
    async fn trigger_setup(&self, event: &PullRequestEvent) -> Result<Url, OrchestrationError> {
        let url = urls::setup_job_url(self.client.base_url(), &event.repo, &event.branch)?;

        debug!(stage = %Stage::TriggerSetup, repo = %event.repo, branch = %event.branch, "Queueing setup job");
        let response = self.client.post(url.clone()).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| JenkinsApiError::invalid_response(&url, "missing Location header"))?;

        // Relative locations resolve against the Jenkins root.
        let queue_item = self.client.base_url().join(location).map_err(|e| {
            JenkinsApiError::invalid_response(&url, format!("invalid Location header {location:?}: {e}"))
        })?;

        debug!(stage = %Stage::TriggerSetup, queue_item = %queue_item, "Setup job queued");
        Ok(queue_item)
    }

    /// Stage 2: wait for the queue item to become a build; return the build URL
    /// exactly as Jenkins reports it.
    async fn wait_until_started(&self, queue_item: &Url) -> Result<Url, OrchestrationError> {
        let api_url = urls::api_json_url(queue_item)?;

        let reported = poll(self.config.queue_poll, || {
            check_queue_item(&self.client, api_url.clone())
        })
        .await
        .map_err(|e| self.stage_failed(Stage::PollQueued, e))?;

        let build_url = Url::parse(&reported).map_err(|e| {
            JenkinsApiError::invalid_response(&api_url, format!("invalid executable.url {reported:?}: {e}"))
        })?;

        debug!(stage = %Stage::PollQueued, build = %build_url, "Setup build started");
        Ok(build_url)
    }

    /// Stage 3: wait for the setup build to succeed.
    async fn wait_for_success(&self, reported: &Url) -> Result<(), OrchestrationError> {
        let build_url = urls::rewrite_host(reported, self.client.base_url())?;
        if build_url != *reported {
            debug!(reported = %reported, rewritten = %build_url, "Rewrote build URL onto Jenkins host");
        }
        let api_url = urls::api_json_url(&build_url)?;

        poll(self.config.status_poll, || {
            check_build_status(&self.client, api_url.clone(), &build_url)
        })
        .await
        .map_err(|e| self.stage_failed(Stage::PollStatus, e))?;

        debug!(stage = %Stage::PollStatus, build = %build_url, "Setup build succeeded");
        Ok(())
    }

    /// Stage 4: trigger the branch's build job.
    async fn trigger_build(&self, event: &PullRequestEvent) -> Result<(), OrchestrationError> {
        let url = urls::trigger_job_url(
            self.client.base_url(),
            &event.repo,
            &event.branch,
            &self.config.trigger_job,
        )?;

        debug!(stage = %Stage::TriggerBuild, url = %url, "Triggering build");
        self.client.post(url).await?;
        Ok(())
    }

    fn stage_failed(&self, stage: Stage, error: PollError<OrchestrationError>) -> OrchestrationError {
        match error {
            PollError::Timeout { timeout } => {
                warn!(stage = %stage, timeout = ?timeout, "Timed out waiting for Jenkins");
                OrchestrationError::PollTimeout { stage, timeout }
            }
            PollError::Predicate(e) => e,
        }
    }
}

/// One queue-item poll: done once Jenkins reports the build URL.
async fn check_queue_item(
    client: &JenkinsClient,
    api_url: Url,
) -> Result<PollOutcome<String>, OrchestrationError> {
    let item: QueueItem = client.get_json(api_url).await?;
    Ok(match item.executable.and_then(|e| e.url) {
        Some(url) => PollOutcome::Done(url),
        None => PollOutcome::NotYet,
    })
}

/// One build-status poll: done on `SUCCESS`, terminal on `FAILURE`.
async fn check_build_status(
    client: &JenkinsClient,
    api_url: Url,
    build_url: &Url,
) -> Result<PollOutcome<()>, OrchestrationError> {
    let status: BuildStatus = client.get_json(api_url).await?;
    match BuildStageResult::from_result(status.result.as_deref()) {
        BuildStageResult::Pending => Ok(PollOutcome::NotYet),
        BuildStageResult::Succeeded => Ok(PollOutcome::Done(())),
        BuildStageResult::Failed(result) => Err(OrchestrationError::BuildFailed {
            build_url: build_url.to_string(),
            result,
        }),
    }
}
