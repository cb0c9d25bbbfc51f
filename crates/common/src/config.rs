//! Helpers for reading configuration from environment-like sources.
//!
//! Every reader takes a lookup function instead of touching the process
//! environment directly, so tests can feed a plain map.

use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading configuration. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Reads a value that must be present and non-empty.
pub fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

/// Reads and parses a value that must be present.
pub fn required_parsed<T, F>(lookup: &F, var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, var)?;
    parse(var, &raw)
}

/// Reads an optional value, falling back to `default` when absent.
pub fn optional<F>(lookup: &F, var: &'static str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Reads and parses an optional value. A present but unparsable value is an error.
pub fn optional_parsed<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        Some(raw) => parse(var, &raw),
        None => Ok(default),
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

/// Lookup backed by the process environment.
pub fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn required_rejects_missing_and_blank() {
        let lookup = lookup_from(&[("BLANK", "  ")]);
        assert_eq!(required(&lookup, "ABSENT"), Err(ConfigError::Missing("ABSENT")));
        assert_eq!(required(&lookup, "BLANK"), Err(ConfigError::Missing("BLANK")));
    }

    #[test]
    fn required_parsed_reports_invalid_values() {
        let lookup = lookup_from(&[("PORT", "not-a-port")]);
        let err = required_parsed::<u16, _>(&lookup, "PORT").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
    }

    #[test]
    fn optional_falls_back_to_default() {
        let lookup = lookup_from(&[("HOST", "127.0.0.1")]);
        assert_eq!(optional(&lookup, "HOST", "0.0.0.0"), "127.0.0.1");
        assert_eq!(optional(&lookup, "OTHER", "fallback"), "fallback");
        assert_eq!(optional_parsed(&lookup, "ATTEMPTS", 5u32), Ok(5));
    }
}
