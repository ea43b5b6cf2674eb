use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Parse a boolean-like environment flag.
/// Accepts common values such as 1/0, true/false, yes/no, on/off (case-insensitive).
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read an environment variable and parse it as a boolean flag using [`parse_bool_flag`].
pub fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_bool_flag(&raw))
}

/// Read a non-empty, trimmed environment variable.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read an environment variable and parse it; unparsable values are ignored.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|raw| raw.parse().ok())
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_flag_recognizes_common_values() {
        assert_eq!(parse_bool_flag("true"), Some(true));
        assert_eq!(parse_bool_flag("YES"), Some(true));
        assert_eq!(parse_bool_flag("0"), Some(false));
        assert_eq!(parse_bool_flag("off"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
        assert_eq!(parse_bool_flag(""), None);
    }
}
