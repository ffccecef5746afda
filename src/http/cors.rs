//! Cross-origin headers
//!
//! Browsers call the proxy from other origins, so when CORS is enabled every
//! response carries `Access-Control-Allow-Origin` and preflights get the full
//! set of allowed methods and headers.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::{Response, StatusCode};

use super::response::GatewayResponse;
use crate::config::HttpConfig;

/// Add the origin header to an outgoing response
pub fn apply_cors(response: &mut GatewayResponse, http: &HttpConfig) {
    if !http.enable_cors {
        return;
    }
    match HeaderValue::from_str(&http.cors_allow_origin) {
        Ok(origin) => {
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        Err(e) => tracing::warn!("Invalid CORS origin '{}': {e}", http.cors_allow_origin),
    }
}

/// Answer an `OPTIONS` preflight
pub fn build_preflight_response(http: &HttpConfig) -> GatewayResponse {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("Allow", "GET, HEAD, OPTIONS")
        .header("Content-Length", 0);

    if http.enable_cors {
        builder = builder
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, http.cors_allow_origin.as_str())
            .header(ACCESS_CONTROL_ALLOW_METHODS, http.cors_allow_methods.join(", "))
            .header(ACCESS_CONTROL_ALLOW_HEADERS, http.cors_allow_headers.join(", "));
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        tracing::error!("Failed to build OPTIONS response: {e}");
        Response::new(Full::new(Bytes::new()))
    })
}
