use std::str::FromStr;

/// Get an environment variable with the `PAYHOOK_` prefix, falling back to the unprefixed name
///
/// `PAYHOOK_PORT` wins over `PORT`, which keeps the service deployable on hosts
/// that only inject the conventional names.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("PAYHOOK_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Read a prefixed environment variable and parse it, ignoring unparsable values
pub fn get_env_parsed<T: FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|v| v.trim().parse().ok())
}

/// Read a prefixed environment variable as a flag
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off` (case-insensitive).
pub fn get_env_flag(key: &str) -> Option<bool> {
    get_env_with_prefix(key).and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    })
}

/// Read a prefixed environment variable, treating blank values as unset
pub fn get_env_non_empty(key: &str) -> Option<String> {
    get_env_with_prefix(key).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("PAYHOOK_ENV_TEST_VAR", "prefixed_value");
            std::env::set_var("ENV_TEST_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("PAYHOOK_ENV_TEST_VAR");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("ENV_TEST_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_TEST_NON_EXISTENT"), None);
    }

    #[test]
    fn test_get_env_parsed_and_flag() {
        unsafe {
            std::env::set_var("PAYHOOK_ENV_TEST_NUM", " 42 ");
            std::env::set_var("PAYHOOK_ENV_TEST_BAD_NUM", "forty-two");
            std::env::set_var("PAYHOOK_ENV_TEST_FLAG", "Yes");
            std::env::set_var("PAYHOOK_ENV_TEST_BLANK", "   ");
        }

        assert_eq!(get_env_parsed::<u64>("ENV_TEST_NUM"), Some(42));
        assert_eq!(get_env_parsed::<u64>("ENV_TEST_BAD_NUM"), None);
        assert_eq!(get_env_flag("ENV_TEST_FLAG"), Some(true));
        assert_eq!(get_env_non_empty("ENV_TEST_BLANK"), None);

        unsafe {
            std::env::remove_var("PAYHOOK_ENV_TEST_NUM");
            std::env::remove_var("PAYHOOK_ENV_TEST_BAD_NUM");
            std::env::remove_var("PAYHOOK_ENV_TEST_FLAG");
            std::env::remove_var("PAYHOOK_ENV_TEST_BLANK");
        }
    }
}
