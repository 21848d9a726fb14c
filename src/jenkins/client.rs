//! Authenticated HTTP client for the Jenkins API.
//!
//! `JenkinsClient` wraps a `reqwest::Client` together with the Jenkins base URL
//! and a precomputed Basic-auth header. Each outbound request is described by
//! an immutable [`JenkinsCallSpec`] and executed with [`JenkinsClient::execute`],
//! which turns transport failures and non-2xx statuses into
//! [`JenkinsApiError`]s carrying the failing URL.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::error::JenkinsApiError;

/// Limit on a single Jenkins call, connect through body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods used against Jenkins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Username and API token used for HTTP Basic authentication.
#[derive(Clone)]
pub struct JenkinsCredentials {
    username: String,
    api_token: String,
}

impl JenkinsCredentials {
    pub fn new(username: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_token: api_token.into(),
        }
    }

    /// Returns the `Authorization` header value: `Basic base64(username:token)`.
    pub fn basic_auth_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.api_token));
        format!("Basic {}", encoded)
    }
}

impl fmt::Debug for JenkinsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// One outbound call: where, how, and with which credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct JenkinsCallSpec {
    uri: Url,
    method: HttpMethod,
    auth_header: String,
}

impl JenkinsCallSpec {
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn auth_header(&self) -> &str {
        &self.auth_header
    }
}

impl fmt::Debug for JenkinsCallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsCallSpec")
            .field("method", &self.method)
            .field("uri", &self.uri.as_str())
            .finish_non_exhaustive()
    }
}

/// A Jenkins API client bound to one server and one set of credentials.
#[derive(Clone)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: Url,
    auth_header: String,
    request_timeout: Duration,
}

impl JenkinsClient {
    /// Creates a client with a default `reqwest::Client`.
    pub fn new(base_url: Url, credentials: &JenkinsCredentials) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, credentials)
    }

    /// Creates a client from a pre-configured `reqwest::Client`.
    ///
    /// Use this to set timeouts, proxies or custom TLS roots.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: &JenkinsCredentials,
    ) -> Self {
        Self {
            http,
            base_url,
            auth_header: credentials.basic_auth_header(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the limit on each call. The trigger stages have no other bound.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Returns the per-call timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the configured Jenkins base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Describes an authenticated call to `uri`.
    pub fn call_spec(&self, method: HttpMethod, uri: Url) -> JenkinsCallSpec {
        JenkinsCallSpec {
            uri,
            method,
            auth_header: self.auth_header.clone(),
        }
    }

    /// Executes a call, failing on transport errors and non-2xx statuses.
    pub async fn execute(&self, spec: &JenkinsCallSpec) -> Result<reqwest::Response, JenkinsApiError> {
        let builder = match spec.method {
            HttpMethod::Get => self.http.get(spec.uri.clone()),
            HttpMethod::Post => self.http.post(spec.uri.clone()),
        };

        debug!(method = %spec.method, url = %spec.uri, "Calling Jenkins");

        let response = builder
            .header(AUTHORIZATION, &spec.auth_header)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(method = %spec.method, url = %spec.uri, error = %e, "Jenkins request failed");
                JenkinsApiError::transport(&spec.uri, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                method = %spec.method,
                url = %spec.uri,
                status = status.as_u16(),
                "Jenkins returned an error status"
            );
            return Err(JenkinsApiError::status(&spec.uri, status.as_u16()));
        }

        Ok(response)
    }

    /// Sends an authenticated POST and returns the response.
    pub async fn post(&self, uri: Url) -> Result<reqwest::Response, JenkinsApiError> {
        self.execute(&self.call_spec(HttpMethod::Post, uri)).await
    }

    /// Sends an authenticated GET and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, uri: Url) -> Result<T, JenkinsApiError> {
        let spec = self.call_spec(HttpMethod::Get, uri);
        let response = self.execute(&spec).await?;
        response.json::<T>().await.map_err(|e| {
            warn!(url = %spec.uri, error = %e, "Jenkins returned an unreadable body");
            JenkinsApiError::decode(&spec.uri, e)
        })
    }
}

impl fmt::Debug for JenkinsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsClient")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
