// Application state module
// Everything a request handler needs, built once at startup and shared read-only

use std::sync::Arc;
use std::time::Duration;

use super::types::{Config, ProxyMode};
use crate::fallback::{JitterDelay, Orchestrator, ProfileSet, ReqwestUpstream, UpstreamClient};

/// Application state
pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Build the state with the production reqwest adapter
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = ReqwestUpstream::new(config.proxy.adapter_config())?;
        Self::with_client(config, Arc::new(client))
    }

    /// Build the state around any upstream client
    pub fn with_client(
        config: &Config,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let profiles = ProfileSet::builtin(&config.proxy.site_identity())?;
        let mut orchestrator = Orchestrator::new(profiles, client, config.proxy.timeout());

        if config.proxy.mode == ProxyMode::Development {
            orchestrator = orchestrator.with_delay(Arc::new(JitterDelay::new(
                Duration::from_millis(config.proxy.delay_min_ms),
                Duration::from_millis(config.proxy.delay_max_ms),
            )));
        }

        Ok(Self {
            config: config.clone(),
            orchestrator,
        })
    }
}
