//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, route
//! matching, CORS decoration and access logging.

use crate::config::AppState;
use crate::handler::proxy::{self, UpstreamProfile};
use crate::handler::static_files;
use crate::http::{self, GatewayResponse};
use crate::logger::{self, AccessLogEntry};
use chrono::{SecondsFormat, Utc};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, SERVER};
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
{
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let ctx = RequestContext {
        path: uri.path(),
        query: uri.query(),
        is_head: method == Method::HEAD,
        if_none_match: header_string(&req, "if-none-match"),
    };

    let mut response = match method {
        Method::GET | Method::HEAD => route_request(&ctx, &state).await,
        Method::OPTIONS => http::build_preflight_response(&state.config.http),
        _ => {
            tracing::warn!("Method not allowed: {method}");
            http::build_405_response()
        }
    };

    http::apply_cors(&mut response, &state.config.http);
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            method.to_string(),
            ctx.path.to_string(),
        );
        entry.query = ctx.query.map(ToString::to_string);
        entry.http_version = version_label(req.version()).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.referer = header_string(&req, "referer");
        entry.user_agent = header_string(&req, "user-agent");
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry.upstream_profile = response
            .extensions()
            .get::<UpstreamProfile>()
            .map(|p| p.0.clone());
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and configuration
async fn route_request(ctx: &RequestContext<'_>, state: &AppState) -> GatewayResponse {
    let config = &state.config;

    if config.health.enabled && ctx.path == config.health.path {
        return build_health_response();
    }

    // Proxy routes take precedence over static files
    if ctx.path == config.proxy.path {
        return proxy::handle_proxy(ctx.query, state).await;
    }
    if ctx.path == config.proxy.probe_path {
        return proxy::handle_probe(state).await;
    }

    if config.static_files.enabled {
        return static_files::serve(ctx, &config.static_files).await;
    }

    http::build_404_response()
}

fn build_health_response() -> GatewayResponse {
    http::json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "OK",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "message": "Proxy server is running",
        }),
    )
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
