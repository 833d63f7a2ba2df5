//! Diagnostics initialization.
//!
//! Port reporting goes to stdout; diagnostics go to stderr through
//! `tracing`. Controlled by:
//! - `RUST_LOG` → standard env-filter directives (overrides everything)
//! - `--verbose` → debug-level diagnostics for the fwport crates
//! - `FWPORT_LOG_FORMAT=json` → JSON events to stderr instead of text

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Initialize the diagnostics subscriber.
///
/// Without `RUST_LOG`, the filter is `warn` by default and
/// `fwport=debug,fwport_git=debug,fwport_github=debug` with `verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "warn,fwport=debug,fwport_git=debug,fwport_github=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let json = std::env::var("FWPORT_LOG_FORMAT").is_ok_and(|v| v == "json");
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(verbose)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
