//! Logging Setup
//!
//! Verbosity comes from `RUST_LOG`, e.g `RUST_LOG=champi=trace` traces every
//! executed instruction.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the logger, later calls do nothing.
#[cfg(any(test, feature = "pretty_env_logger"))]
pub fn setup_logging() {
    INIT.call_once(|| {
        // Another logger may already be installed by the host.
        if pretty_env_logger::try_init().is_err() {
            log::warn!("A logger was already installed");
        }
    });
}

#[cfg(not(any(test, feature = "pretty_env_logger")))]
pub fn setup_logging() {
    INIT.call_once(|| ());
}
