//! Logging setup for processes embedding the REST core.
//!
//! The transport emits `debug` events for every exchange (method, path,
//! status), the reconciler emits `info` events when an entity is created,
//! updated, imported or deleted, and `warn` events when tracking drops an
//! entity or a listing repeats a cursor. Credentials never appear in events,
//! and diffs are logged by attribute name only.
//!
//! Everything is written to **stderr**; a provider's stdout belongs to the
//! host protocol.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `hemmer_provider_rest=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show every HTTP exchange
//! RUST_LOG=hemmer_provider_rest::transport=debug ./my-provider
//!
//! # Lifecycle events only
//! RUST_LOG=warn,hemmer_provider_rest::reconciler=info ./my-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "info";

/// Install the global subscriber, filtering with `RUST_LOG` or `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Install the global subscriber, filtering with `RUST_LOG` or
/// `default_level`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use hemmer_provider_rest::init_logging_with_default;
///
/// fn main() {
///     init_logging_with_default("hemmer_provider_rest=debug");
/// }
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to install the global subscriber.
///
/// Returns `false` instead of panicking when a subscriber is already set,
/// which happens when several tests in one binary initialize logging.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter syntax is checked here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LEVEL).is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_rest=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_rest::reconciler=info").is_ok());
    }

    #[test]
    fn test_try_init_is_repeatable() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
