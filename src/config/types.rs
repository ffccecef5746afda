// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub proxy: ProxyConfig,
    pub static_files: StaticFilesConfig,
    pub health: HealthConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Diagnostic log filter (`RUST_LOG` syntax), overridden by `RUST_LOG`
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Diagnostic log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Upper bound for a whole client connection, in seconds
    pub connection_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub cors_allow_origin: String,
    pub cors_allow_methods: Vec<String>,
    pub cors_allow_headers: Vec<String>,
}

/// Pre-attempt delay behaviour
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// No artificial delay
    Production,
    /// Random delay before every upstream attempt
    Development,
}

/// Fallback proxy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Route serving `?url=<target>` requests
    pub path: String,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    pub max_redirects: usize,
    pub mode: ProxyMode,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// `Referer` sent by the browser profiles
    #[serde(default)]
    pub referer: Option<String>,
    /// `Origin` sent by the browser profiles
    #[serde(default)]
    pub origin: Option<String>,
    /// Route of the upstream reachability probe
    pub probe_path: String,
    /// URL hit by the probe; the probe route answers 404 when unset
    #[serde(default)]
    pub probe_url: Option<String>,
}

/// Static asset configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StaticFilesConfig {
    pub enabled: bool,
    pub root: String,
    /// File served for `/` and directory requests
    pub index_file: String,
}

/// Health check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    pub enabled: bool,
    pub path: String,
}
