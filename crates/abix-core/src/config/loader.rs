//! Environment variable loading helpers.
//!
//! Empty values are treated as unset everywhere.

use std::env;

/// Read `key`, falling back to `default` when unset or empty.
pub fn env_or<F>(key: &str, default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(key).unwrap_or_else(default)
}

/// Read `key` as a trimmed, non-empty string.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

/// Parse a boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(key: &str, default: bool) -> bool {
    match env_optional(key) {
        Some(s) => !matches!(s.to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        None => default,
    }
}

/// Parse an unsigned integer variable; unparsable values fall back to `default`.
pub fn env_u64(key: &str, default: u64) -> u64 {
    match env_optional(key) {
        Some(s) => match s.parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("{}={} is not a number, using {}", key, s, default);
                default
            }
        },
        None => default,
    }
}
