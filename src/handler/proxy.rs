//! Proxy and probe endpoints
//!
//! Thin translation between HTTP and the fallback core: pull the target out
//! of the query string, run the orchestrator, map the outcome to a response.

use hyper::body::Bytes;
use hyper::StatusCode;
use serde_json::{json, Value};
use url::Url;

use crate::config::AppState;
use crate::fallback::{AttemptResult, FallbackOutcome};
use crate::http::{self, GatewayResponse};

/// Name of the profile that served a proxied response, for the access log
#[derive(Debug, Clone)]
pub struct UpstreamProfile(pub String);

/// First `url` parameter of a raw query string, percent-decoded
pub fn target_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// `GET <proxy.path>?url=<target>`
pub async fn handle_proxy(query: Option<&str>, state: &AppState) -> GatewayResponse {
    let target = target_from_query(query);
    let outcome = state.orchestrator.fetch(target.as_deref()).await;
    if !outcome.is_success() {
        tracing::debug!(status = outcome.status().as_u16(), "answering with failure report");
    }
    outcome_to_response(&outcome)
}

pub fn outcome_to_response(outcome: &FallbackOutcome) -> GatewayResponse {
    match outcome {
        FallbackOutcome::Success { profile, response } => {
            let mut resp = http::build_passthrough_response(response);
            resp.extensions_mut()
                .insert(UpstreamProfile(profile.clone()));
            resp
        }
        FallbackOutcome::Failure(report) => http::build_failure_response(report),
    }
}

/// `GET <proxy.probe_path>`: single attempt with the minimal profile
pub async fn handle_probe(state: &AppState) -> GatewayResponse {
    let Some(probe_url) = state.config.proxy.probe_url.as_deref() else {
        return http::build_404_response();
    };

    let url = match Url::parse(probe_url) {
        Ok(url) => url,
        Err(e) => return probe_error(&format!("Invalid probe URL: {e}")),
    };

    tracing::info!(%url, "testing upstream access");
    let orchestrator = &state.orchestrator;
    let profile = orchestrator.profiles().last();
    let attempt = orchestrator
        .client()
        .send(&url, profile, orchestrator.timeout())
        .await;

    match attempt {
        AttemptResult::Response(response) => http::json_response(
            StatusCode::OK,
            &json!({
                "status": "success",
                "message": "Upstream API is accessible",
                "statusCode": response.status.as_u16(),
                "data": body_as_json(&response.body),
            }),
        ),
        AttemptResult::HttpError(response) => probe_error(&format!(
            "Request failed with status code {}",
            response.status.as_u16()
        )),
        AttemptResult::Transport(err) => probe_error(&err.to_string()),
    }
}

fn probe_error(error: &str) -> GatewayResponse {
    tracing::warn!("upstream probe failed: {error}");
    http::json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({
            "status": "error",
            "message": "Upstream API test failed",
            "error": error,
        }),
    )
}

/// JSON bodies are embedded as-is, anything else as a string
fn body_as_json(body: &Bytes) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
