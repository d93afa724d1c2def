//! Structured logging setup
//!
//! Logs go to stderr so the `classify` report on stdout stays machine
//! readable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,

    /// Whether to use JSON formatting
    pub json_format: bool,

    /// Whether to include thread IDs
    pub include_thread_ids: bool,

    /// Whether to include target module
    pub include_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl TelemetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.include_thread_ids = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.include_target = enabled;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the global subscriber
pub fn init_with_config(config: TelemetryConfig) {
    let env_filter = config.env_filter();

    if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_timer(fmt::time::SystemTime)
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_timer(fmt::time::SystemTime)
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .init();
    }
}
