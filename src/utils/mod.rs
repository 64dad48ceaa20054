//! Utilities: logging setup (level derived from -v/-q, `RUST_LOG` override)
//! and terminal formatting for listings.
//!
//! Key items:
//!   init_logging / derive_level
//!   format::* (StyleOptions, color, table, truncate_ellipsis)

pub mod format;

/// Logging helpers.
pub mod logging {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    /// Map CLI verbosity flags to a level filter.
    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Install the stderr subscriber. `RUST_LOG`, when set, wins over `level`.
    /// Calling this twice is harmless (the second install is ignored).
    pub fn init_logging(level: LevelFilter) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn quiet_beats_verbose() {
            assert_eq!(derive_level(3, true), LevelFilter::ERROR);
        }

        #[test]
        fn verbosity_steps() {
            assert_eq!(derive_level(0, false), LevelFilter::INFO);
            assert_eq!(derive_level(1, false), LevelFilter::DEBUG);
            assert_eq!(derive_level(5, false), LevelFilter::TRACE);
        }
    }
}

pub use logging::{derive_level, init_logging};
