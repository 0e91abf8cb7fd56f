//! Logging initialization and configuration

use chaincode_config::LoggingSettings;
use serde::{Deserialize, Serialize};
use tracing::Dispatch;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    EnvFilter, Registry,
};

use crate::{TelemetryError, TelemetryResult};

/// Log targets governed by [`LogConfig::shim_level`].
pub const RUNTIME_TARGETS: &[&str] = &["chaincode_shim", "chaincode_fsm"];

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for chaincode code (trace, debug, info, warn, error)
    pub level: String,

    /// Level for the runtime crates
    pub shim_level: String,

    /// Log format (json, text, compact)
    pub format: LogFormat,

    /// Enable ANSI colors
    pub color: bool,

    /// Include target in log output
    pub include_target: bool,

    /// Include file location in log output
    pub include_location: bool,

    /// Include span events
    pub span_events: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Compact single-line format
    Compact,
    /// JSON format for machine parsing
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            shim_level: "info".to_string(),
            format: LogFormat::Text,
            color: true,
            include_target: true,
            include_location: false,
            span_events: false,
        }
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level_directive().to_string(),
            shim_level: settings.shim_directive().to_string(),
            ..Default::default()
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directives: the default level plus one per runtime target.
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(
            RUNTIME_TARGETS
                .iter()
                .map(|target| format!("{target}={}", self.shim_level)),
        );
        directives.join(",")
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        let directives = self.filter_directives();
        EnvFilter::try_new(&directives).map_err(|e| TelemetryError::InvalidFilter {
            directive: directives,
            reason: e.to_string(),
        })
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Builds a subscriber writing to stdout.
pub fn build_dispatch(config: &LogConfig) -> TelemetryResult<Dispatch> {
    build_dispatch_with_writer(config, std::io::stdout)
}

/// Builds a subscriber writing to `writer`.
pub fn build_dispatch_with_writer<W>(config: &LogConfig, writer: W) -> TelemetryResult<Dispatch>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = config.filter()?;
    let registry = Registry::default().with(filter);

    let dispatch = match config.format {
        LogFormat::Text => Dispatch::new(
            registry.with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(config.color)
                    .with_target(config.include_target)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_span_events(config.span_events()),
            ),
        ),
        LogFormat::Compact => Dispatch::new(
            registry.with(
                fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_ansi(config.color)
                    .with_target(config.include_target)
                    .with_span_events(config.span_events()),
            ),
        ),
        LogFormat::Json => Dispatch::new(
            registry.with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(config.include_target)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_span_events(config.span_events()),
            ),
        ),
    };

    Ok(dispatch)
}

/// Builds the subscriber and installs it as the process-wide default.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<Dispatch> {
    let dispatch = build_dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch.clone())
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    tracing::info!(level = %config.level, shim = %config.shim_level, "logging initialized");
    Ok(dispatch)
}
