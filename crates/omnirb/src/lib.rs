//! Command-line surface for omnirb.
//!
//! This crate re-exports the config library and provides the `check`, `show`,
//! and `get` commands used by the `omnirb` binary.

pub mod cli;

/// Re-export for convenience.
pub use omnirb_config as config;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. `RUST_LOG` controls the
/// verbosity; the default shows warnings only.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp_millis()
            .try_init();
    }
}
