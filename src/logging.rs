//! Logging setup.
//!
//! Installs a `tracing-subscriber` formatter on stderr so that stdout stays
//! reserved for results. With no `-v` flag, `RUST_LOG` decides the level
//! (default `warn`).

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}
