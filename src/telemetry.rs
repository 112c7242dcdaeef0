//! Log output for the queue binaries.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to executables.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "ce_queue=info";

/// Installs a formatting subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info` for this crate when `RUST_LOG` is unset or invalid.
/// Calling it twice leaves the first subscriber in place.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _already_set = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_err();
}
