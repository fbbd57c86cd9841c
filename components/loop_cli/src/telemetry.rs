//! Log output for the binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter for a `-v` count; `RUST_LOG` takes precedence.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs a stderr subscriber, so logs never mix with the report on stdout.
///
/// Calling it a second time leaves the first subscriber in place.
pub fn init_tracing(verbosity: u8) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbosity).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
