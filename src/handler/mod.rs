//! Request handler module
//!
//! Routing dispatch plus the three kinds of endpoint the gateway serves:
//! the fallback proxy, the upstream probe and static files.

pub mod proxy;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
