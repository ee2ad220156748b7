//! Configuration management for CiteForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use crate::errors::{AppError, Result};
use crate::models::VersionPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Traversal budgets and discipline
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Retry/timeout policy for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Global request-rate ceiling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// arXiv endpoints
    #[serde(default)]
    pub arxiv: ArxivConfig,

    /// Database configuration (in-memory stores when absent)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Frontier discipline used by the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDiscipline {
    /// FIFO frontier: nearest neighbours first
    #[default]
    BreadthFirst,
    /// LIFO work-list: follow the first citation as deep as the depth budget allows
    DepthFirst,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CrawlConfig {
    /// Seed publication identifiers
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Maximum number of publications processed (Done + Failed)
    #[serde(default = "default_max_nodes")]
    #[validate(range(min = 1))]
    pub max_nodes: usize,

    /// Maximum citation depth from a seed (seed is depth 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Number of concurrently processed publications
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,

    #[serde(default)]
    pub traversal: TraversalDiscipline,

    #[serde(default)]
    pub version_policy: VersionPolicy,

    /// Optional wall-clock budget for the whole run
    #[serde(default)]
    pub max_run_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetryConfig {
    /// Retries after the first attempt, for transient failures only
    #[serde(default = "default_max_retries")]
    #[validate(range(max = 16))]
    pub max_retries: u32,

    /// First backoff interval in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff interval in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomization factor applied to each interval (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter: f64,

    /// Timeout for a single metadata or document call, in seconds
    #[serde(default = "default_call_timeout")]
    #[validate(range(min = 1))]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second across all workers
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArxivConfig {
    /// Atom query API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// PDF download base URL
    #[serde(default = "default_pdf_base")]
    pub pdf_base: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter (e.g. "info", "citeforge_crawler=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_max_nodes() -> usize { 100 }
fn default_max_depth() -> u32 { 2 }
fn default_concurrency() -> usize { 4 }
fn default_max_retries() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 1000 }
fn default_max_delay_ms() -> u64 { 30_000 }
fn default_jitter() -> f64 { 0.5 }
fn default_call_timeout() -> u64 { 30 }
fn default_rate_limit() -> u32 { 4 }
fn default_burst() -> u32 { 4 }
fn default_enabled() -> bool { true }
fn default_api_base() -> String { "http://export.arxiv.org/api".to_string() }
fn default_pdf_base() -> String { "https://arxiv.org/pdf".to_string() }
fn default_user_agent() -> String { format!("citeforge/{}", crate::VERSION) }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__CRAWL__MAX_NODES=500
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("crawl.seeds")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Check the sections a crawl run depends on
    pub fn validate(&self) -> Result<()> {
        self.crawl.validate()?;
        self.retry.validate()?;

        if self.crawl.seeds.is_empty() {
            return Err(AppError::Validation {
                message: "at least one seed identifier is required".to_string(),
                field: Some("seeds".to_string()),
            });
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_second == 0 {
            return Err(AppError::Configuration {
                message: "rate_limit.requests_per_second must be positive when enabled".to_string(),
            });
        }

        Ok(())
    }
}

impl CrawlConfig {
    pub fn max_run_duration(&self) -> Option<Duration> {
        self.max_run_secs.map(Duration::from_secs)
    }
}

impl RetryConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            max_nodes: default_max_nodes(),
            max_depth: default_max_depth(),
            concurrency: default_concurrency(),
            traversal: TraversalDiscipline::default(),
            version_policy: VersionPolicy::default(),
            max_run_secs: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            pdf_base: default_pdf_base(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}
