//! Environment configuration helpers
//!
//! Settings are read from the process environment (populated from `.env`
//! by the binary). Malformed values never abort startup: they are logged
//! and replaced by the default.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Read and parse `key`, falling back to `default` when unset or malformed.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    parse_or(key, env::var(key).ok(), default)
}

/// Read `key` as an optional non-empty string.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Boolean toggle accepting `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn env_flag(key: &str, default: bool) -> bool {
    flag_or(key, env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => default,
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(key = key, value = %value, error = %e, "Invalid config value, using default");
                default
            }
        },
    }
}

fn flag_or(key: &str, raw: Option<String>, default: bool) -> bool {
    let Some(value) = raw else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            tracing::warn!(key = key, value = %other, "Invalid boolean config value, using default");
            default
        }
    }
}
