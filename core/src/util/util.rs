// src/util/util.rs

use crate::error::Error;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// retrieve environment variable
pub fn getenv(key: &str) -> Result<String, Error> {
    std::env::var(key).map_err(|_| Error::MissingEnv(key.to_string()))
}

/// retrieve environment variable, with default value
pub fn getenv_default(key: &str, default_val: &str) -> String {
    match std::env::var(key) {
        Ok(v) => v,
        Err(_) => String::from(default_val),
    }
}

/// Current time as RFC3339 with second precision in UTC, e.g. `2020-05-04T16:55:12Z`
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp
pub fn parse_rfc3339(s: &str) -> Result<DateTime<FixedOffset>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map_err(|e| Error::Malformed(format!("invalid timestamp '{}': {}", s, e)))
}
