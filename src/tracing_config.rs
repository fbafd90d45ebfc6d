//! Tracing subscriber setup for the CLI
//!
//! Libraries only emit events; the binary installs the subscriber. `log`
//! records from the pipeline reach the subscriber through the `tracing-log`
//! bridge that `tracing-subscriber` installs with `init()`.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    #[default]
    Console,
    /// Compact console output without colors, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive, overrides `verbosity`
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive for the configured verbosity
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// The directive actually used: the explicit filter when set
    #[must_use]
    pub fn filter_directive(&self) -> &str {
        self.env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter())
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.filter_directive())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer().with_ansi(false).with_target(false).compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        tracing::debug!(filter = %self.filter_directive(), "Tracing initialized");
        Ok(())
    }
}

/// Initialize tracing with CLI defaults
///
/// # Errors
/// - See [`TracingConfig::init`]
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, json: bool) -> anyhow::Result<()> {
    let format = if json {
        #[cfg(feature = "tracing-json")]
        {
            TracingFormat::Json
        }
        #[cfg(not(feature = "tracing-json"))]
        {
            anyhow::bail!("JSON logs need the 'tracing-json' feature");
        }
    } else if std::env::var_os("CI").is_some() {
        TracingFormat::Compact
    } else {
        TracingFormat::Console
    };

    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let filters: Vec<&str> = (0..4)
            .map(|v| TracingConfig::new().with_verbosity(v).verbosity_to_filter())
            .collect();
        assert_eq!(filters, ["info", "debug", "trace", "trace"]);
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_env_filter("badge_portrait=debug");
        assert_eq!(config.filter_directive(), "badge_portrait=debug");
        assert_eq!(TracingConfig::new().filter_directive(), "info");
    }
}
