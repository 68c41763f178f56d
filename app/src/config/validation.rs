//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

use crate::managed::parse_managed_topics;

static RE_HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/?#]+(/[^\s?#]*)?$").unwrap());
static RE_UUID_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .unwrap()
});

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "SERVER_PORT" => validate_int_range(value, 1, 65535)?,
        "DEFAULT_SERVER_URL" => {
            if !RE_HTTP_URL.is_match(value) {
                return Err("must be an http(s) URL".into());
            }
        }
        "NOTIFICATION_MIN_PRIORITY" => validate_int_range(value, 1, 5)?,
        "NOTIFICATION_ALLOWED_TOPICS" => {
            for id in split_list(value) {
                if !RE_UUID_HYPHEN.is_match(id) {
                    return Err(format!("invalid topic id: {id}"));
                }
            }
        }
        "MESSAGE_RETENTION_DAYS" => validate_int_range(value, 0, 3650)?,
        "KEEPALIVE_TIMEOUT_SECS" => validate_int_range(value, 10, 3600)?,
        "MANAGED_TOPICS" => {
            let topics = parse_managed_topics(value).map_err(|e| format!("invalid JSON: {e}"))?;
            if topics.iter().any(|t| t.name.trim().is_empty()) {
                return Err("every managed topic needs a name".into());
            }
            let bad_url = topics
                .iter()
                .filter_map(|t| t.server_url.as_deref())
                .find(|u| !RE_HTTP_URL.is_match(u));
            if let Some(url) = bad_url {
                return Err(format!("invalid serverURL: {url}"));
            }
        }
        // Boolean settings
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

/// Non-empty, trimmed entries of a comma-separated list.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "NOTIFICATION_ENABLED" | "LAUNCH_AT_LOGIN")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_boolean() {
        assert!(validate_setting("NOTIFICATION_ENABLED", "true").is_ok());
        assert!(validate_setting("LAUNCH_AT_LOGIN", "false").is_ok());
        assert!(validate_setting("LAUNCH_AT_LOGIN", "yes").is_err());
    }

    #[test]
    fn test_server_url() {
        assert!(validate_setting("DEFAULT_SERVER_URL", "https://ntfy.sh").is_ok());
        assert!(validate_setting("DEFAULT_SERVER_URL", "http://localhost:8080/ntfy").is_ok());
        assert!(validate_setting("DEFAULT_SERVER_URL", "ftp://ntfy.sh").is_err());
        assert!(validate_setting("DEFAULT_SERVER_URL", "ntfy.sh").is_err());
        assert!(validate_setting("DEFAULT_SERVER_URL", "").is_err());
    }

    #[test]
    fn test_ranges() {
        assert!(validate_setting("NOTIFICATION_MIN_PRIORITY", "5").is_ok());
        assert!(validate_setting("NOTIFICATION_MIN_PRIORITY", "0").is_err());
        assert!(validate_setting("KEEPALIVE_TIMEOUT_SECS", "9").is_err());
        assert!(validate_setting("KEEPALIVE_TIMEOUT_SECS", "3600").is_ok());
        assert!(validate_setting("MESSAGE_RETENTION_DAYS", "0").is_ok());
        assert!(validate_setting("SERVER_PORT", "70000").is_err());
        assert!(validate_setting("SERVER_PORT", "abc").is_err());
    }

    #[test]
    fn test_allowed_topics() {
        assert!(validate_setting("NOTIFICATION_ALLOWED_TOPICS", "").is_ok());
        assert!(
            validate_setting(
                "NOTIFICATION_ALLOWED_TOPICS",
                "12345678-1234-1234-1234-123456789abc, 87654321-4321-4321-4321-cba987654321"
            )
            .is_ok()
        );
        assert!(validate_setting("NOTIFICATION_ALLOWED_TOPICS", "alerts").is_err());
    }

    #[test]
    fn test_managed_topics() {
        assert!(validate_setting("MANAGED_TOPICS", "[]").is_ok());
        assert!(
            validate_setting(
                "MANAGED_TOPICS",
                r#"[{"name":"corp-alerts","serverURL":"https://ntfy.example.com","username":"ops"}]"#
            )
            .is_ok()
        );
        assert!(validate_setting("MANAGED_TOPICS", r#"[{"name":"  "}]"#).is_err());
        assert!(validate_setting("MANAGED_TOPICS", r#"[{"name":"a","serverURL":"nope"}]"#).is_err());
        assert!(validate_setting("MANAGED_TOPICS", "{").is_err());
    }
}
