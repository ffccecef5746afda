//! Best-effort fallback requests
//!
//! Reissues a GET against a caller-supplied URL with a fixed, ordered list of
//! header profiles and reports the first 200, or the most informative failure.

pub mod adapter;
pub mod delay;
pub mod orchestrator;
pub mod outcome;
pub mod profile;

pub use adapter::{AdapterConfig, AttemptResult, ReqwestUpstream, UpstreamClient, UpstreamResponse};
pub use delay::JitterDelay;
pub use orchestrator::Orchestrator;
pub use outcome::{FailureReport, FallbackOutcome, ProxyError};
pub use profile::{HeaderProfile, ProfileSet, SiteIdentity, PROFILE_TABLE_VERSION};
