//! Logger setup driven by `SATCHECK_LOG_LEVEL`.

use log::LevelFilter;

pub const ENV_LOG_LEVEL: &str = "SATCHECK_LOG_LEVEL";

/// Map a level name to a filter. Names are case-insensitive.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_uppercase().as_str() {
        "NOTSET" => Some(LevelFilter::Trace),
        "DEBUG" => Some(LevelFilter::Debug),
        "INFO" => Some(LevelFilter::Info),
        "WARNING" | "WARN" => Some(LevelFilter::Warn),
        "ERROR" | "CRITICAL" => Some(LevelFilter::Error),
        _ => None,
    }
}

/// Install `env_logger` at the level named by `SATCHECK_LOG_LEVEL`.
///
/// Unset means INFO. An unknown name also falls back to INFO and is
/// reported once the logger is up. Calling this twice is harmless.
pub fn init_logging() -> LevelFilter {
    let raw = std::env::var(ENV_LOG_LEVEL).ok();
    let parsed = raw.as_deref().map(parse_level);
    let level = match parsed {
        Some(Some(level)) => level,
        _ => LevelFilter::Info,
    };

    let installed = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .try_init()
        .is_ok();

    if installed {
        if let (Some(raw), Some(None)) = (raw, parsed) {
            log::warn!(
                "{}={:?} is not a valid level, using INFO",
                ENV_LOG_LEVEL,
                raw
            );
        }
    }
    level
}
