//! Environment variable helpers shared by the config structs.

/// Parse a boolean flag. Accepts `true/1/yes/on` and `false/0/no/off`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean variable, falling back to `default` when unset or unparseable.
pub fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read a variable, treating empty values as unset.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_and_falsy_values() {
        for v in ["true", "1", "YES", " on "] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "No", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn unset_variable_uses_default() {
        assert!(env_bool("GIGS_TEST_SURELY_UNSET_FLAG", true));
        assert!(!env_bool("GIGS_TEST_SURELY_UNSET_FLAG", false));
        assert_eq!(env_opt("GIGS_TEST_SURELY_UNSET_FLAG"), None);
    }
}
