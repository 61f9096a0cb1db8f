//! Tracing configuration module for structured logging
//!
//! The library only emits spans and events. The binary installs a subscriber
//! writing to stderr, leaving stdout to the final status line.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Primary filter variable, takes precedence over `RUST_LOG`
pub const LOG_ENV: &str = "REMOVE_BG_LOG";
/// Conventional filter variable used when [`LOG_ENV`] is unset
pub const RUST_LOG_ENV: &str = "RUST_LOG";
/// Filter applied when neither variable is set
pub const DEFAULT_FILTER: &str = "warn";

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Filter directive, `None` means [`DEFAULT_FILTER`]
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the filter from `REMOVE_BG_LOG`, then `RUST_LOG`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_filter = [LOG_ENV, RUST_LOG_ENV]
            .into_iter()
            .filter_map(&lookup)
            .find(|value| !value.trim().is_empty());

        Self { env_filter }
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive that [`TracingConfig::init`] will apply
    #[must_use]
    pub fn filter_directive(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(DEFAULT_FILTER)
    }

    /// Install the global subscriber, writing to stderr
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use std::io::IsTerminal;
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.filter_directive())?;

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_level(true)
            .compact();

        Registry::default().with(filter).with(fmt_layer).try_init()?;
        Ok(())
    }
}

/// Initialize tracing with CLI defaults from the environment
///
/// # Errors
/// - See [`TracingConfig::init`]
#[cfg(feature = "cli")]
pub fn init_cli_tracing() -> anyhow::Result<()> {
    TracingConfig::from_env().init()
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span for one input file through the CLI
    pub fn file_processing(input: &std::path::Path, output: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "file_processing",
            input = %input.display(),
            output = %output.display()
        )
    }

    /// Span for model loading operations
    pub fn model_loading(model_name: &str, provider: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "model_loading",
            model_name = %model_name,
            provider = %provider
        )
    }

    /// Span for inference operations
    pub fn inference(model_name: &str, backend: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "inference",
            model_name = %model_name,
            backend = %backend
        )
    }

    /// Span for download operations
    pub fn download(url: &str, destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "download",
            url = %url,
            destination = %destination.display()
        )
    }

    /// Span for preprocessing operations
    pub fn preprocessing(original_size: (u32, u32), target_size: (u32, u32)) -> Span {
        tracing::span!(
            Level::DEBUG,
            "preprocessing",
            original_width = %original_size.0,
            original_height = %original_size.1,
            target_width = %target_size.0,
            target_height = %target_size.1
        )
    }

    /// Span for postprocessing operations
    pub fn postprocessing(operation: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "postprocessing",
            operation = %operation
        )
    }
}
