//! HTTP response building module
//!
//! Builders for every response the gateway sends. Builder failures are logged
//! and replaced by a bare response, never a panic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::fallback::{FailureReport, UpstreamResponse};

pub type GatewayResponse = Response<Full<Bytes>>;

/// Content type used when the upstream did not send one
const DEFAULT_PASSTHROUGH_TYPE: &str = "application/json";

/// JSON body of every proxy failure
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub details: &'a str,
    pub timestamp: String,
}

/// Build JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> GatewayResponse {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Failed to serialize response: {e}");
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from_static(
                    br#"{"error":"Internal server error"}"#,
                )))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Error"))));
        }
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            log_build_error("JSON", &e);
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// Translate a classified proxy failure into `{error, details, timestamp}`
pub fn build_failure_response(report: &FailureReport) -> GatewayResponse {
    json_response(
        report.status,
        &ErrorBody {
            error: &report.message,
            details: &report.details,
            timestamp: report.timestamp_string(),
        },
    )
}

/// Pass the winning upstream body through verbatim
pub fn build_passthrough_response(upstream: &UpstreamResponse) -> GatewayResponse {
    let content_type = upstream.content_type().unwrap_or(DEFAULT_PASSTHROUGH_TYPE);

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(upstream.body.clone()))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(upstream.body.clone()))
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> GatewayResponse {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> GatewayResponse {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from("404 Not Found")))
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            Response::new(Full::new(Bytes::from("404 Not Found")))
        })
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> GatewayResponse {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain")
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build static file response with `ETag`
pub fn build_file_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> GatewayResponse {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    tracing::error!("Failed to build {status} response: {error}");
}
