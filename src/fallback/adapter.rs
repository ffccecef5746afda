//! Outbound HTTP client adapter
//!
//! One call is one GET with one profile. The adapter never retries; it only
//! sorts what happened into an [`AttemptResult`] for the orchestrator.

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::StatusCode;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::profile::HeaderProfile;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// A response as received from the upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// No response was received
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("redirect failed: {0}")]
    Redirect(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() {
            Self::Connect(message)
        } else if err.is_redirect() {
            Self::Redirect(message)
        } else if err.is_body() || err.is_decode() {
            Self::Body(message)
        } else {
            Self::Other(message)
        }
    }
}

/// reqwest hides the interesting part (DNS, refused, ...) in the source chain
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Result of a single outbound attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// Status below 500
    Response(UpstreamResponse),
    /// Status 500 or above
    HttpError(UpstreamResponse),
    Transport(TransportError),
}

impl AttemptResult {
    /// Sort a received response by the "below 500 is a response" rule
    pub fn from_response(response: UpstreamResponse) -> Self {
        if response.status.as_u16() < 500 {
            Self::Response(response)
        } else {
            Self::HttpError(response)
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response(r) | Self::HttpError(r) => Some(r.status),
            Self::Transport(_) => None,
        }
    }
}

/// The transport seam between the orchestrator and the network
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, url: &Url, profile: &HeaderProfile, timeout: Duration) -> AttemptResult;
}

/// Client construction settings
#[derive(Debug, Clone, Copy)]
pub struct AdapterConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// Production adapter backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(config: AdapterConfig) -> Result<Self, reqwest::Error> {
        // Profiles decide the User-Agent and Accept headers, so no defaults here.
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstream {
    async fn send(&self, url: &Url, profile: &HeaderProfile, timeout: Duration) -> AttemptResult {
        let mut headers = HeaderMap::with_capacity(profile.headers().len());
        for (name, value) in profile.headers() {
            headers.append(name.clone(), value.clone());
        }

        tracing::debug!(profile = profile.name(), %url, "sending upstream request");

        let response = match self
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return AttemptResult::Transport(err.into()),
        };

        let status = response.status();
        let headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => AttemptResult::from_response(UpstreamResponse {
                status,
                headers,
                body,
            }),
            Err(err) => AttemptResult::Transport(err.into()),
        }
    }
}
