//! HTTP protocol layer module
//!
//! Response builders and CORS handling, independent of routing.

pub mod cors;
pub mod response;

// Re-export commonly used types
pub use cors::{apply_cors, build_preflight_response};
pub use response::{
    build_304_response, build_404_response, build_405_response, build_failure_response,
    build_file_response, build_passthrough_response, json_response, GatewayResponse,
};
