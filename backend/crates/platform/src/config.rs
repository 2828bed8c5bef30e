//! Environment configuration helpers
//!
//! Every setting has a default; a present but unparsable value logs a warning
//! and falls back to the default instead of aborting startup.

use std::str::FromStr;
use std::time::Duration;

/// String variable with a default
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parsed variable with a default
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    parse_or(key, std::env::var(key).ok(), default)
}

/// Whole seconds, e.g. `THUMBNAIL_CACHE_TTL_SECS=3600`
pub fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parse(key, default_secs))
}

/// `true/false`, `1/0`, `yes/no`, `on/off`
pub fn env_bool(key: &str, default: bool) -> bool {
    bool_or(key, std::env::var(key).ok(), default)
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = key, value = %raw, "Invalid configuration value, using default");
                default
            }
        },
        None => default,
    }
}

fn bool_or(key: &str, raw: Option<String>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            tracing::warn!(key = key, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or() {
        assert_eq!(parse_or("K", Some(" 42 ".into()), 7u32), 42);
        assert_eq!(parse_or("K", Some("x".into()), 7u32), 7);
        assert_eq!(parse_or::<u32>("K", None, 7), 7);
    }

    #[test]
    fn test_bool_or() {
        assert!(bool_or("K", Some("YES".into()), false));
        assert!(!bool_or("K", Some("0".into()), true));
        assert!(bool_or("K", Some("maybe".into()), true));
        assert!(!bool_or("K", None, false));
    }

    #[test]
    fn test_missing_variable_uses_default() {
        let key = "PLATFORM_CONFIG_TEST_SURELY_UNSET";
        assert_eq!(env_or(key, "fallback"), "fallback");
        assert_eq!(env_secs(key, 90), Duration::from_secs(90));
        assert!(env_bool(key, true));
    }
}
