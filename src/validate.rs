use chrono::DateTime;
use regex::Regex;
use std::collections::HashMap;
use crate::error::AppError;

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 50;
pub const DEFAULT_LIMIT: i64 = 10;

pub const DEFAULT_REPO_LIMIT: i64 = 15;
pub const MAX_FEED_PAGES: i64 = 10;
pub const MAX_PER_PAGE: i64 = 50;
pub const DEFAULT_PER_PAGE: i64 = 20;

const MAX_USERNAME_LEN: usize = 39;

lazy_static::lazy_static! {
    // Alphanumeric runs joined by single hyphens. Length is checked separately.
    static ref USERNAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$")
        .expect("username pattern is a valid regex");
    static ref INTEGER_PATTERN: Regex = Regex::new(r"^[+-]?[0-9]+$")
        .expect("integer pattern is a valid regex");
}

/// Check a GitHub account name before it is used in any upstream URL or query.
pub fn validate_username(username: &str) -> Result<&str, AppError> {
    if username.is_empty()
        || username.len() > MAX_USERNAME_LEN
        || !USERNAME_PATTERN.is_match(username)
    {
        return Err(AppError::InvalidArgument(
            "Invalid username format. GitHub usernames must be alphanumeric with hyphens, 1-39 characters."
                .to_string(),
        ));
    }
    Ok(username)
}

pub fn clamp(value: i64, min: i64, max: i64) -> u32 {
    value.clamp(min, max) as u32
}

/// Repository limit for the stats endpoint.
pub fn clamp_limit(value: i64) -> u32 {
    clamp(value, MIN_LIMIT, MAX_LIMIT)
}

/// Read an integer query parameter, falling back to `default` when absent.
/// Integers too large for `i64` saturate so the caller's clamp still applies.
pub fn int_param(query: &HashMap<String, String>, name: &str, default: i64) -> Result<i64, AppError> {
    let raw = match query.get(name).map(|v| v.trim()) {
        None | Some("") => return Ok(default),
        Some(raw) => raw,
    };
    if !INTEGER_PATTERN.is_match(raw) {
        return Err(AppError::InvalidArgument(format!(
            "Query parameter '{}' must be an integer",
            name
        )));
    }
    Ok(raw.parse::<i64>().unwrap_or(if raw.starts_with('-') { i64::MIN } else { i64::MAX }))
}

/// Optional `since` bound. Must be an RFC 3339 timestamp when present.
pub fn since_param(query: &HashMap<String, String>) -> Result<Option<String>, AppError> {
    match query.get("since").map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => {
            DateTime::parse_from_rfc3339(raw).map_err(|_| {
                AppError::InvalidArgument(
                    "Query parameter 'since' must be an ISO 8601 timestamp".to_string(),
                )
            })?;
            Ok(Some(raw.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_usernames() {
        let max_len = "a".repeat(39);
        for name in ["a", "octocat", "Octo-Cat", "a1-b2-c3", "0day", "x-y", max_len.as_str()] {
            assert!(validate_username(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn rejects_invalid_usernames() {
        let too_long = "a".repeat(40);
        for name in [
            "",
            too_long.as_str(),
            "-octocat",
            "octocat-",
            "octo--cat",
            "octo_cat",
            "octo.cat",
            "octo cat",
            "../etc",
            "ünïcode",
        ] {
            let err = validate_username(name).unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)), "{} should be rejected", name);
        }
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-5), 1);
        assert_eq!(clamp_limit(1000), 50);
        assert_eq!(clamp_limit(10), 10);
    }

    #[test]
    fn int_param_defaults_and_rejects_garbage() {
        let mut query = HashMap::new();
        assert_eq!(int_param(&query, "limit", DEFAULT_LIMIT).unwrap(), 10);

        query.insert("limit".to_string(), "-5".to_string());
        assert_eq!(int_param(&query, "limit", DEFAULT_LIMIT).unwrap(), -5);

        query.insert("limit".to_string(), "ten".to_string());
        assert!(int_param(&query, "limit", DEFAULT_LIMIT).is_err());

        query.insert("limit".to_string(), "1.5".to_string());
        assert!(int_param(&query, "limit", DEFAULT_LIMIT).is_err());
    }

    #[test]
    fn oversized_integers_saturate_then_clamp() {
        let mut query = HashMap::new();
        query.insert("limit".to_string(), "99999999999999999999".to_string());
        let limit = int_param(&query, "limit", DEFAULT_LIMIT).unwrap();
        assert_eq!(limit, i64::MAX);
        assert_eq!(clamp_limit(limit), 50);

        query.insert("limit".to_string(), "-99999999999999999999".to_string());
        let limit = int_param(&query, "limit", DEFAULT_LIMIT).unwrap();
        assert_eq!(limit, i64::MIN);
        assert_eq!(clamp_limit(limit), 1);
    }

    #[test]
    fn since_must_be_a_timestamp() {
        let mut query = HashMap::new();
        assert_eq!(since_param(&query).unwrap(), None);

        query.insert("since".to_string(), "2024-01-01T00:00:00Z".to_string());
        assert_eq!(since_param(&query).unwrap().as_deref(), Some("2024-01-01T00:00:00Z"));

        query.insert("since".to_string(), "last tuesday".to_string());
        assert!(since_param(&query).is_err());
    }
}
