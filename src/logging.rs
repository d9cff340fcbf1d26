//! Tracing setup for the agent binary
//!
//! Library code only emits `tracing` events; without a subscriber they are
//! dropped, so the connection layer runs in tests with no logging backend.

/// Initialize tracing output
///
/// Call early in main() before any logging occurs.
/// `RUST_LOG` takes precedence; otherwise `verbose` selects debug over info.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(false)
                .compact(),
        )
        .with(filter)
        .try_init();
}
