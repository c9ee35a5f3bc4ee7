//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};
use tracing_subscriber::EnvFilter;

/// Configuration for the log subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
    /// Whether to colour output.
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            ansi: false,
        }
    }
}

impl TracingConfig {
    /// Debug output for every span and event.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            ..Self::default()
        }
    }

    /// The filter this config installs; `RUST_LOG` wins when set.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }

    /// Install a stderr subscriber.
    ///
    /// Stdout carries the compiled commands, so logs never go there. A
    /// subscriber that is already installed is left in place.
    pub fn init(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .with_ansi(self.ansi)
            .with_target(false)
            .try_init();
    }
}

/// Create a span for one compilation run.
///
/// # Example
///
/// ```rust
/// use lanegen::observability::span_compile;
///
/// let span = span_compile(2);
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_compile(lanes: usize) -> Span {
    span!(Level::INFO, "compile", lanes)
}

/// Create a span for one lane.
#[inline]
pub fn span_lane(name: &str, number: usize) -> Span {
    span!(Level::INFO, "lane", name = %name, number)
}

/// Create a span for one branch within a lane.
#[inline]
pub fn span_branch(lane: usize, branch: usize, camera: &str) -> Span {
    span!(Level::DEBUG, "branch", lane, branch, camera = %camera)
}
