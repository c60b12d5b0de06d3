#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error;

pub use log;

/// Environment variable checked first for the log filter.
pub const LOG_ENV: &str = "LOADGEN_LOG";

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: &str = "loadgen=debug";
#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: &str = "loadgen=info";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// Picks the log filter: `LOADGEN_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_LOG_LEVEL`]. Empty values are skipped.
#[must_use]
pub fn filter_from(loadgen_log: Option<String>, rust_log: Option<String>) -> String {
    loadgen_log
        .filter(|x| !x.trim().is_empty())
        .or_else(|| rust_log.filter(|x| !x.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global logger.
///
/// # Errors
///
/// * If a global logger has already been installed
pub fn init() -> Result<(), InitError> {
    let filter = filter_from(std::env::var(LOG_ENV).ok(), std::env::var("RUST_LOG").ok());

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .try_init()?;

    log::trace!("Initialized logging with filter '{filter}'");

    Ok(())
}

#[cfg(feature = "macros")]
#[macro_export]
macro_rules! debug_or_trace {
    (($($debug:tt)+), ($($trace:tt)+)) => {
        if $crate::log::log_enabled!($crate::log::Level::Trace) {
            $crate::log::trace!($($trace)*);
        } else {
            $crate::log::debug!($($debug)*);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_loadgen_log_takes_precedence() {
        assert_eq!(
            filter_from(Some("loadgen=trace".into()), Some("warn".into())),
            "loadgen=trace"
        );
    }

    #[test_log::test]
    fn test_falls_back_to_rust_log() {
        assert_eq!(filter_from(None, Some("warn".into())), "warn");
        assert_eq!(filter_from(Some("  ".into()), Some("warn".into())), "warn");
    }

    #[test_log::test]
    fn test_falls_back_to_default() {
        assert_eq!(filter_from(None, None), DEFAULT_LOG_LEVEL);
        assert_eq!(filter_from(Some(String::new()), Some(String::new())), DEFAULT_LOG_LEVEL);
    }

    #[test_log::test]
    fn test_second_init_fails() {
        let _ = init();

        assert!(matches!(init(), Err(InitError::SetLogger(_))));
    }
}
