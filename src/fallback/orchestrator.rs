//! Fallback request orchestrator
//!
//! Tries each profile once, in order, and stops at the first 200. The
//! decision logic is a fold over [`AttemptResult`]s ([`record_attempt`] and
//! [`conclude`]); the async loop around it only does I/O.

use hyper::StatusCode;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::adapter::{AttemptResult, TransportError, UpstreamClient, UpstreamResponse};
use super::delay::{AttemptDelay, NoDelay};
use super::outcome::{FailureReport, FallbackOutcome, ProxyError};
use super::profile::ProfileSet;

/// Best result seen so far in a pass that has not succeeded yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Recorded {
    #[default]
    Nothing,
    Transport(TransportError),
    Response(UpstreamResponse),
}

/// Fold one attempt into the running state
///
/// `Break` carries the winning 200 response. A received response always
/// replaces what was recorded; a transport failure is only kept while no
/// response has been seen.
pub fn record_attempt(
    recorded: Recorded,
    attempt: AttemptResult,
) -> ControlFlow<UpstreamResponse, Recorded> {
    match attempt {
        AttemptResult::Response(response) if response.status == StatusCode::OK => {
            ControlFlow::Break(response)
        }
        AttemptResult::Response(response) | AttemptResult::HttpError(response) => {
            ControlFlow::Continue(Recorded::Response(response))
        }
        AttemptResult::Transport(err) => match recorded {
            Recorded::Response(_) => ControlFlow::Continue(recorded),
            Recorded::Nothing | Recorded::Transport(_) => {
                ControlFlow::Continue(Recorded::Transport(err))
            }
        },
    }
}

/// Classify an exhausted pass
pub fn conclude(recorded: Recorded) -> ProxyError {
    match recorded {
        Recorded::Response(response) => ProxyError::UpstreamHttp {
            status: response.status,
            body: response.body,
        },
        Recorded::Transport(err) => ProxyError::Transport(err),
        Recorded::Nothing => ProxyError::AllApproachesExhausted,
    }
}

/// Validate the caller-supplied target before any network activity
pub fn parse_target(target: Option<&str>) -> Result<Url, ProxyError> {
    let target = target.map(str::trim).unwrap_or_default();
    if target.is_empty() {
        return Err(ProxyError::MissingParameter);
    }

    let url = Url::parse(target).map_err(|e| ProxyError::InvalidTarget(format!("Invalid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProxyError::InvalidTarget(format!(
            "Unsupported URL scheme: {other}"
        ))),
    }
}

/// Run one full fallback pass
///
/// This is the whole core: no ambient state, everything it needs is passed
/// in. Attempts are awaited one after another, never concurrently.
pub async fn run_fallback(
    target: Option<&str>,
    profiles: &ProfileSet,
    client: &dyn UpstreamClient,
    timeout: Duration,
    delay: &dyn AttemptDelay,
) -> FallbackOutcome {
    let url = match parse_target(target) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting proxy request");
            return FallbackOutcome::Failure(FailureReport::new(err, 0));
        }
    };

    tracing::info!(%url, "proxying request");

    let mut recorded = Recorded::Nothing;
    let mut attempts = 0;

    for profile in profiles {
        delay.before_attempt(profile).await;
        tracing::info!(profile = profile.name(), "trying profile");

        let attempt = client.send(&url, profile, timeout).await;
        attempts += 1;

        match (&attempt, attempt.status()) {
            (_, Some(StatusCode::OK)) => {
                tracing::info!(profile = profile.name(), "profile succeeded");
            }
            (_, Some(status)) => tracing::info!(
                profile = profile.name(),
                status = status.as_u16(),
                "profile returned non-200 status"
            ),
            (AttemptResult::Transport(err), None) => {
                tracing::info!(profile = profile.name(), error = %err, "profile failed");
            }
            (_, None) => {}
        }

        recorded = match record_attempt(recorded, attempt) {
            ControlFlow::Break(response) => {
                return FallbackOutcome::Success {
                    profile: profile.name().to_string(),
                    response,
                };
            }
            ControlFlow::Continue(next) => next,
        };
    }

    let report = FailureReport::new(conclude(recorded), attempts);
    tracing::error!(
        status = report.status.as_u16(),
        details = %report.details,
        attempts,
        "proxy request failed"
    );
    FallbackOutcome::Failure(report)
}

/// Long-lived bundle of everything [`run_fallback`] needs
#[derive(Clone)]
pub struct Orchestrator {
    profiles: ProfileSet,
    client: Arc<dyn UpstreamClient>,
    timeout: Duration,
    delay: Arc<dyn AttemptDelay>,
}

impl Orchestrator {
    pub fn new(profiles: ProfileSet, client: Arc<dyn UpstreamClient>, timeout: Duration) -> Self {
        Self {
            profiles,
            client,
            timeout,
            delay: Arc::new(NoDelay),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Arc<dyn AttemptDelay>) -> Self {
        self.delay = delay;
        self
    }

    pub async fn fetch(&self, target: Option<&str>) -> FallbackOutcome {
        run_fallback(
            target,
            &self.profiles,
            self.client.as_ref(),
            self.timeout,
            self.delay.as_ref(),
        )
        .await
    }

    pub const fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    pub fn client(&self) -> &dyn UpstreamClient {
        self.client.as_ref()
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("profiles", &self.profiles.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::profile::{HeaderProfile, SiteIdentity};
    use async_trait::async_trait;
    use hyper::body::Bytes;
    use hyper::header::HeaderMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const TARGET: &str = "https://api.example.com/v1/items?q=1";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Start(String),
        End(String),
    }

    /// Replays a fixed script of attempt results and records every call
    struct ScriptedClient {
        script: Mutex<VecDeque<AttemptResult>>,
        events: Mutex<Vec<Event>>,
        seen_urls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<AttemptResult>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                events: Mutex::new(Vec::new()),
                seen_urls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen_urls.lock().unwrap().len()
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UpstreamClient for ScriptedClient {
        async fn send(
            &self,
            url: &Url,
            profile: &HeaderProfile,
            _timeout: Duration,
        ) -> AttemptResult {
            self.events
                .lock()
                .unwrap()
                .push(Event::Start(profile.name().to_string()));
            self.seen_urls.lock().unwrap().push(url.to_string());
            tokio::task::yield_now().await;
            let result = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted");
            self.events
                .lock()
                .unwrap()
                .push(Event::End(profile.name().to_string()));
            result
        }
    }

    fn response(code: u16, body: &str) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::from_u16(code).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn ok(body: &str) -> AttemptResult {
        AttemptResult::Response(response(200, body))
    }

    fn status(code: u16) -> AttemptResult {
        AttemptResult::from_response(response(code, "nope"))
    }

    fn timeout() -> AttemptResult {
        AttemptResult::Transport(TransportError::Timeout("operation timed out".into()))
    }

    fn profiles() -> ProfileSet {
        ProfileSet::builtin(&SiteIdentity::default()).unwrap()
    }

    async fn run(client: &ScriptedClient, target: Option<&str>) -> FallbackOutcome {
        run_fallback(
            target,
            &profiles(),
            client,
            Duration::from_millis(15_000),
            &NoDelay,
        )
        .await
    }

    fn failure(outcome: &FallbackOutcome) -> &FailureReport {
        match outcome {
            FallbackOutcome::Failure(report) => report,
            FallbackOutcome::Success { .. } => panic!("expected failure, got {outcome:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_target_makes_no_calls() {
        for target in [None, Some(""), Some("   ")] {
            let client = ScriptedClient::new(vec![]);
            let outcome = run(&client, target).await;
            let report = failure(&outcome);
            assert_eq!(report.error, ProxyError::MissingParameter);
            assert_eq!(report.status, StatusCode::BAD_REQUEST);
            assert_eq!(report.message, "URL parameter is required");
            assert_eq!(report.attempts, 0);
            assert_eq!(client.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_invalid_target_is_local_error() {
        for target in ["not a url", "ftp://example.com/file"] {
            let client = ScriptedClient::new(vec![]);
            let outcome = run(&client, Some(target)).await;
            let report = failure(&outcome);
            assert!(matches!(report.error, ProxyError::InvalidTarget(_)));
            assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(client.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let client = ScriptedClient::new(vec![ok(r#"{"items":[]}"#), ok("unused")]);
        let outcome = run(&client, Some(TARGET)).await;

        let FallbackOutcome::Success { profile, response } = &outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(profile, "Standard Browser Headers");
        assert_eq!(response.body, Bytes::from(r#"{"items":[]}"#));
        assert_eq!(outcome.status(), StatusCode::OK);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_later_success_overrides_earlier_failure() {
        let client = ScriptedClient::new(vec![status(403), ok("second")]);
        let outcome = run(&client, Some(TARGET)).await;

        let FallbackOutcome::Success { profile, response } = &outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(profile, "Mobile Browser Headers");
        assert_eq!(response.body, Bytes::from("second"));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_all_transport_failures_is_gateway_timeout() {
        let client = ScriptedClient::new(vec![timeout(), timeout(), timeout()]);
        let outcome = run(&client, Some(TARGET)).await;
        let report = failure(&outcome);

        assert!(matches!(report.error, ProxyError::Transport(_)));
        assert_eq!(report.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            report.message,
            "No response from upstream (timeout or network error)"
        );
        assert_eq!(report.details, "timeout: operation timed out");
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_response_beats_earlier_transport_failure() {
        let client = ScriptedClient::new(vec![timeout(), status(403), timeout()]);
        let outcome = run(&client, Some(TARGET)).await;
        let report = failure(&outcome);

        assert_eq!(report.status, StatusCode::FORBIDDEN);
        assert_eq!(report.message, "Access denied by upstream (403 Forbidden)");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_last_response_wins_among_responses() {
        let client = ScriptedClient::new(vec![status(403), status(429), timeout()]);
        let outcome = run(&client, Some(TARGET)).await;
        let report = failure(&outcome);

        assert_eq!(report.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            report.message,
            "Rate limited by upstream (429 Too Many Requests)"
        );
    }

    #[tokio::test]
    async fn test_unrecognised_status_is_passed_through() {
        let client = ScriptedClient::new(vec![status(418), status(418), status(418)]);
        let outcome = run(&client, Some(TARGET)).await;
        let report = failure(&outcome);

        assert_eq!(report.status.as_u16(), 418);
        assert_eq!(report.message, "Upstream API error: 418");
    }

    #[tokio::test]
    async fn test_server_error_counts_as_response() {
        let client = ScriptedClient::new(vec![status(503), timeout(), timeout()]);
        let outcome = run(&client, Some(TARGET)).await;
        let report = failure(&outcome);

        assert_eq!(report.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.message, "Upstream API error: 503");
        let ProxyError::UpstreamHttp { body, .. } = &report.error else {
            panic!("expected upstream http error");
        };
        assert_eq!(body, &Bytes::from("nope"));
    }

    #[tokio::test]
    async fn test_repeated_fetch_is_idempotent() {
        let script = || vec![timeout(), status(404), status(404)];
        let first_client = ScriptedClient::new(script());
        let second_client = ScriptedClient::new(script());

        let first = run(&first_client, Some(TARGET)).await;
        let second = run(&second_client, Some(TARGET)).await;

        assert!(first.same_outcome(&second));
        assert_eq!(first.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_attempts_are_sequential_and_ordered() {
        let client = ScriptedClient::new(vec![timeout(), status(403), status(404)]);
        let _ = run(&client, Some(TARGET)).await;

        let expected: Vec<Event> = profiles()
            .iter()
            .flat_map(|p| {
                [
                    Event::Start(p.name().to_string()),
                    Event::End(p.name().to_string()),
                ]
            })
            .collect();
        assert_eq!(client.events(), expected);

        let urls = client.seen_urls.lock().unwrap().clone();
        assert!(urls.iter().all(|u| u == TARGET));
    }

    #[tokio::test]
    async fn test_orchestrator_uses_delay_strategy() {
        struct CountingDelay(Mutex<Vec<String>>);

        #[async_trait]
        impl AttemptDelay for CountingDelay {
            async fn before_attempt(&self, profile: &HeaderProfile) {
                self.0.lock().unwrap().push(profile.name().to_string());
            }
        }

        let delay = Arc::new(CountingDelay(Mutex::new(Vec::new())));
        let client = Arc::new(ScriptedClient::new(vec![status(403), ok("done")]));
        let orchestrator = Orchestrator::new(profiles(), client.clone(), Duration::from_secs(1))
            .with_delay(delay.clone());

        let outcome = orchestrator.fetch(Some(TARGET)).await;
        assert!(outcome.is_success());
        assert_eq!(
            *delay.0.lock().unwrap(),
            vec!["Standard Browser Headers", "Mobile Browser Headers"]
        );
    }

    #[test]
    fn test_record_attempt_precedence() {
        let after_transport = record_attempt(Recorded::Nothing, timeout());
        let ControlFlow::Continue(recorded) = after_transport else {
            panic!("transport failure must not stop the pass");
        };
        assert!(matches!(recorded, Recorded::Transport(_)));

        let ControlFlow::Continue(recorded) = record_attempt(recorded, status(404)) else {
            panic!("non-200 must not stop the pass");
        };
        assert!(matches!(&recorded, Recorded::Response(r) if r.status == StatusCode::NOT_FOUND));

        let ControlFlow::Continue(recorded) = record_attempt(recorded, timeout()) else {
            panic!("transport failure must not stop the pass");
        };
        assert!(matches!(&recorded, Recorded::Response(r) if r.status == StatusCode::NOT_FOUND));

        assert!(matches!(
            record_attempt(recorded, ok("x")),
            ControlFlow::Break(_)
        ));
    }

    #[test]
    fn test_conclude_empty_pass() {
        assert_eq!(
            conclude(Recorded::Nothing),
            ProxyError::AllApproachesExhausted
        );
    }

    #[test]
    fn test_parse_target() {
        assert!(parse_target(Some(TARGET)).is_ok());
        assert!(parse_target(Some("http://localhost:8080/x")).is_ok());
        assert_eq!(parse_target(None), Err(ProxyError::MissingParameter));
        assert!(matches!(
            parse_target(Some("/relative/path")),
            Err(ProxyError::InvalidTarget(_))
        ));
    }
}
