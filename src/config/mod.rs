// Configuration module entry point
// Loads layered configuration and builds the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;

use crate::fallback::{AdapterConfig, SiteIdentity};

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig, ProxyConfig, StaticFilesConfig};

/// Environment variables override the file, e.g. `GATEWAY_PROXY__MODE=development`
const ENV_PREFIX: &str = "GATEWAY";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("http.cors_allow_methods")
                    .with_list_parse_key("http.cors_allow_headers")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 120)?
            .set_default("http.server_name", "fallback-gateway")?
            .set_default("http.enable_cors", true)?
            .set_default("http.cors_allow_origin", "*")?
            .set_default(
                "http.cors_allow_methods",
                vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"],
            )?
            .set_default(
                "http.cors_allow_headers",
                vec![
                    "Content-Type",
                    "Authorization",
                    "Accept",
                    "Accept-Language",
                    "Cache-Control",
                    "Pragma",
                ],
            )?
            .set_default("proxy.path", "/api/proxy")?
            .set_default("proxy.timeout_ms", 15_000)?
            .set_default("proxy.max_redirects", 5)?
            .set_default("proxy.mode", "production")?
            .set_default("proxy.delay_min_ms", 500)?
            .set_default("proxy.delay_max_ms", 1500)?
            .set_default("proxy.probe_path", "/test-upstream")?
            .set_default("static_files.enabled", true)?
            .set_default("static_files.root", "public")?
            .set_default("static_files.index_file", "index.html")?
            .set_default("health.enabled", true)?
            .set_default("health.path", "/health")?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make the gateway misbehave at runtime
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.proxy.timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "proxy.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.proxy.delay_min_ms > self.proxy.delay_max_ms {
            return Err(config::ConfigError::Message(format!(
                "proxy.delay_min_ms ({}) must not exceed proxy.delay_max_ms ({})",
                self.proxy.delay_min_ms, self.proxy.delay_max_ms
            )));
        }
        if !self.proxy.path.starts_with('/') || !self.proxy.probe_path.starts_with('/') {
            return Err(config::ConfigError::Message(
                "proxy.path and proxy.probe_path must start with '/'".to_string(),
            ));
        }
        if self.performance.connection_timeout == 0 {
            return Err(config::ConfigError::Message(
                "performance.connection_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl ProxyConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub const fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            timeout: self.timeout(),
            max_redirects: self.max_redirects,
        }
    }

    pub fn site_identity(&self) -> SiteIdentity {
        SiteIdentity {
            referer: self.referer.clone(),
            origin: self.origin.clone(),
        }
    }
}
