//! HTTP server for the pull-request build trigger.
//!
//! # Endpoints
//!
//! - `POST /` - Accepts GitHub webhook deliveries, answers once the Jenkins
//!   sequence for the event has finished (or was skipped)
//! - `GET /health` - Returns 200 if the server is running
//!
//! Any other path or method is answered by the router with 404 or 405.

use std::sync::Arc;

use axum::http::StatusCode;
use tower_http::trace::TraceLayer;

pub mod webhook;

pub use webhook::{WebhookError, webhook_handler};

use crate::jenkins::JobOrchestrator;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. It is
/// immutable; requests share nothing else.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Webhook secret for HMAC-SHA1 signature verification.
    webhook_secret: Vec<u8>,

    /// Runs the Jenkins sequence for accepted events.
    orchestrator: JobOrchestrator,
}

impl AppState {
    pub fn new(webhook_secret: impl Into<Vec<u8>>, orchestrator: JobOrchestrator) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                orchestrator,
            }),
        }
    }

    /// Returns the webhook secret.
    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    /// Returns the orchestrator.
    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.inner.orchestrator
    }
}

/// Liveness probe.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::jenkins::{JenkinsClient, JenkinsCredentials, OrchestratorConfig};
    use crate::poll::PollSpec;
    use crate::webhooks::{compute_signature, format_signature_header};

    const SECRET: &[u8] = b"test-secret";
    const AUTH: &str = "Basic dXNlcjp0b2tlbg=="; // base64("user:token")

    fn test_app_state(jenkins: &MockServer) -> AppState {
        let base = Url::parse(&jenkins.uri()).unwrap();
        let client = JenkinsClient::new(base, &JenkinsCredentials::new("user", "token"));
        let orchestrator = JobOrchestrator::new(
            client,
            OrchestratorConfig {
                trigger_job: "triggerJobName".to_string(),
                queue_poll: PollSpec::from_millis(10, 300).unwrap(),
                status_poll: PollSpec::from_millis(10, 300).unwrap(),
            },
        );
        AppState::new(SECRET.to_vec(), orchestrator)
    }

    fn pr_body(action: &str) -> serde_json::Value {
        json!({
            "action": action,
            "repository": {
                "name": "Repo",
                "owner": { "login": "Org" }
            },
            "pull_request": {
                "head": { "ref": "branch" }
            }
        })
    }

    /// Creates a webhook request signed with `secret`.
    fn create_webhook_request(
        secret: &[u8],
        event_type: &str,
        body: &serde_json::Value,
    ) -> Request<Body> {
        let body_bytes = serde_json::to_vec(body).unwrap();
        let signature_header = format_signature_header(&compute_signature(&body_bytes, secret));

        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .header("x-github-event", event_type)
            .header("x-hub-signature", signature_header)
            .body(Body::from(body_bytes))
            .unwrap()
    }

    /// Mounts a Jenkins that completes the whole sequence successfully.
    async fn mount_happy_jenkins(jenkins: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/job/setup_Org-Repo/buildWithParameters"))
            .and(query_param("RECONFIGURE_BRANCH", "branch"))
            .and(header("authorization", AUTH))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Location", format!("{}/queue/item/1/", jenkins.uri()).as_str()),
            )
            .mount(jenkins)
            .await;
        Mock::given(method("GET"))
            .and(path("/queue/item/1/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "executable": { "url": "http://jenkins.internal/job/setup_Org-Repo/9/" }
            })))
            .mount(jenkins)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/setup_Org-Repo/9/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "SUCCESS" })))
            .mount(jenkins)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/Org-Repo/job/branch/job/triggerJobName/build"))
            .and(header("authorization", AUTH))
            .respond_with(ResponseTemplate::new(201))
            .mount(jenkins)
            .await;
    }

    async fn jenkins_calls(jenkins: &MockServer) -> Vec<String> {
        jenkins
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| match r.url.query() {
                Some(q) => format!("{} {}?{}", r.method, r.url.path(), q),
                None => format!("{} {}", r.method, r.url.path()),
            })
            .collect()
    }

    // ─── Health endpoint ───

    #[tokio::test]
    async fn health_returns_200() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    // ─── Routing ───

    #[tokio::test]
    async fn get_root_is_not_a_webhook() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));

        let mut request = create_webhook_request(SECRET, "pull_request", &pr_body("opened"));
        *request.uri_mut() = "/webhook".parse().unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    // ─── Webhook gate ───

    #[tokio::test]
    async fn invalid_signature_returns_400_without_jenkins_calls() {
        let jenkins = MockServer::start().await;
        mount_happy_jenkins(&jenkins).await;
        let app = build_router(test_app_state(&jenkins));

        let request = create_webhook_request(b"wrong-secret", "pull_request", &pr_body("opened"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    #[tokio::test]
    async fn missing_signature_returns_400() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));

        let mut request = create_webhook_request(SECRET, "pull_request", &pr_body("opened"));
        request.headers_mut().remove("x-hub-signature");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    #[tokio::test]
    async fn non_pull_request_event_returns_400() {
        let jenkins = MockServer::start().await;
        mount_happy_jenkins(&jenkins).await;
        let app = build_router(test_app_state(&jenkins));

        let request = create_webhook_request(SECRET, "push", &pr_body("opened"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    #[tokio::test]
    async fn missing_event_header_returns_400() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));

        let mut request = create_webhook_request(SECRET, "pull_request", &pr_body("opened"));
        request.headers_mut().remove("x-github-event");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_fields_returns_400() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));

        let body = json!({ "action": "opened", "repository": { "name": "Repo" } });
        let request = create_webhook_request(SECRET, "pull_request", &body);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    #[tokio::test]
    async fn ignored_action_returns_200_without_jenkins_calls() {
        let jenkins = MockServer::start().await;
        mount_happy_jenkins(&jenkins).await;
        let app = build_router(test_app_state(&jenkins));

        let request = create_webhook_request(SECRET, "pull_request", &pr_body("closed"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(jenkins_calls(&jenkins).await.is_empty());
    }

    // ─── Orchestration ───

    #[tokio::test]
    async fn accepted_actions_run_full_sequence_and_return_200() {
        for action in ["opened", "reopened", "synchronize"] {
            let jenkins = MockServer::start().await;
            mount_happy_jenkins(&jenkins).await;
            let app = build_router(test_app_state(&jenkins));

            let request = create_webhook_request(SECRET, "pull_request", &pr_body(action));
            let response = app.oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK, "action {}", action);
            assert_eq!(
                jenkins_calls(&jenkins).await,
                vec![
                    "POST /job/setup_Org-Repo/buildWithParameters?RECONFIGURE_BRANCH=branch",
                    "GET /queue/item/1/api/json",
                    "GET /job/setup_Org-Repo/9/api/json",
                    "POST /job/Org-Repo/job/branch/job/triggerJobName/build",
                ],
                "action {}",
                action
            );
        }
    }

    #[tokio::test]
    async fn setup_build_failure_returns_500() {
        let jenkins = MockServer::start().await;
        // Mounted first so it takes precedence over the happy status mock.
        Mock::given(method("GET"))
            .and(path("/job/setup_Org-Repo/9/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "FAILURE" })))
            .mount(&jenkins)
            .await;
        mount_happy_jenkins(&jenkins).await;
        let app = build_router(test_app_state(&jenkins));

        let request = create_webhook_request(SECRET, "pull_request", &pr_body("opened"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let calls = jenkins_calls(&jenkins).await;
        assert!(!calls.iter().any(|c| c.ends_with("/triggerJobName/build")));
    }

    #[tokio::test]
    async fn queue_timeout_returns_500() {
        let jenkins = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/queue/item/1/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "executable": null })))
            .mount(&jenkins)
            .await;
        mount_happy_jenkins(&jenkins).await;
        let app = build_router(test_app_state(&jenkins));

        let request = create_webhook_request(SECRET, "pull_request", &pr_body("opened"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let calls = jenkins_calls(&jenkins).await;
        assert!(!calls.iter().any(|c| c.ends_with("/triggerJobName/build")));
    }

    #[tokio::test]
    async fn jenkins_error_status_returns_500() {
        let jenkins = MockServer::start().await;
        let app = build_router(test_app_state(&jenkins));
        // Nothing mounted: wiremock answers 404 to the setup call.

        let request = create_webhook_request(SECRET, "pull_request", &pr_body("opened"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(jenkins_calls(&jenkins).await.len(), 1);
    }
}
