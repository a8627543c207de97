//! Runtime configuration.
//!
//! Values come from the environment. A `.env` file is read for local runs
//! but never under test.

use chrono::FixedOffset;
use chronicles_core::time::utc_offset;
use services::AvatarConfig;

pub const DEFAULT_DB_URL: &str = "sqlite:chronicles.sqlite3";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Largest accepted calendar offset, exclusive.
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing the environment variable {0}")]
    MissingVar(String),
    #[error("invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db_url: String,
    /// Calendar used for the study streak.
    pub utc_offset: FixedOffset,
    pub log_filter: String,
    /// `None` disables avatar uploads.
    pub avatar: Option<AvatarConfig>,
}

impl Config {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a malformed offset.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a malformed offset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_url = lookup("CHRONICLES_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_URL.to_owned());

        let utc_offset = match lookup("CHRONICLES_UTC_OFFSET_MINUTES") {
            Some(raw) => parse_offset(&raw)?,
            None => utc_offset(),
        };

        let log_filter = lookup("RUST_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());

        let avatar = match (lookup("CHRONICLES_AVATAR_URL"), lookup("CHRONICLES_AVATAR_KEY")) {
            (Some(url), Some(key)) => AvatarConfig::new(url, key),
            _ => None,
        };

        Ok(Self {
            db_url,
            utc_offset,
            log_filter,
            avatar,
        })
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = |why: String| {
        ConfigError::InvalidValue("CHRONICLES_UTC_OFFSET_MINUTES".to_owned(), why)
    };
    let minutes: i32 = raw.trim().parse().map_err(|_| invalid(format!("'{raw}' is not a number")))?;
    if minutes.abs() >= MAX_OFFSET_MINUTES {
        return Err(invalid(format!("{minutes} is outside -1439..=1439")));
    }
    FixedOffset::east_opt(minutes * 60).ok_or_else(|| invalid(format!("{minutes} minutes")))
}

/// Read a required variable. Used by commands that cannot fall back.
///
/// # Errors
///
/// Returns `ConfigError::MissingVar` when the variable is unset or blank.
pub fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(key.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_url, DEFAULT_DB_URL);
        assert_eq!(config.utc_offset, utc_offset());
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.avatar.is_none());
    }

    #[test]
    fn reads_offset_and_avatar_settings() {
        let config = Config::from_lookup(lookup(&[
            ("CHRONICLES_UTC_OFFSET_MINUTES", "-180"),
            ("CHRONICLES_AVATAR_URL", "https://files.example.org"),
            ("CHRONICLES_AVATAR_KEY", "secret"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.utc_offset.local_minus_utc(), -180 * 60);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.avatar.map(|a| a.bucket), Some("avatars".to_owned()));
    }

    #[test]
    fn rejects_bad_offset() {
        for raw in ["east", "1440", "-5000"] {
            let err = Config::from_lookup(lookup(&[("CHRONICLES_UTC_OFFSET_MINUTES", raw)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(..)), "{raw}");
        }
    }
}
