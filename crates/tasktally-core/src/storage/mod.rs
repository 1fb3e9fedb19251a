mod config;
pub mod database;
pub mod migrations;

pub use config::{
    CompletionsConfig, Config, DatabaseConfig, DisplayConfig, LoggingConfig, OperationsConfig,
    TaskSort,
};
pub use database::{Database, PoolSettings};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the tasktally data directory.
///
/// `TASKTALLY_HOME` wins when set. Otherwise `~/.config/tasktally[-dev]/`,
/// with the `-dev` suffix when `TASKTALLY_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TASKTALLY_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TASKTALLY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("tasktally-dev")
            } else {
                base_dir.join("tasktally")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Current time at the precision timestamps are stored with.
pub(crate) fn storage_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Storage form of a timestamp. Fixed width, so text order is time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS[.f][+HH:MM]` text written by
/// older releases.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Older rows may carry a monotonic clock reading and a zone name,
    // e.g. "2024-05-01 10:00:00 +0000 UTC m=+0.000123".
    let mut trimmed = raw.trim();
    if let Some(idx) = trimmed.find(" m=") {
        trimmed = &trimmed[..idx];
    }
    if let Some((head, zone)) = trimmed.rsplit_once(' ') {
        if !zone.is_empty() && zone.chars().all(|c| c.is_ascii_alphabetic()) {
            trimmed = head;
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Like [`parse_timestamp`], falling back to the Unix epoch for garbage.
pub(crate) fn parse_timestamp_or_epoch(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        tracing::warn!(value = raw, "unparsable stored timestamp");
        DateTime::<Utc>::UNIX_EPOCH
    })
}
