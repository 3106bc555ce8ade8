use std::path::PathBuf;

// === Limits ===
pub const MAX_USER_ID_LENGTH: usize = 64;
pub const MAX_POST_LENGTH: usize = 5000;
pub const FEED_PAGE_SIZE: usize = 20;

/// Header carrying the acting user. Identifiers are trusted as supplied.
pub const USER_HEADER: &str = "x-pedal-user";

// === Table keys ===
pub const FOLLOW_EDGES_KEY: &str = "pedal_follow_graph_v1";
pub const FOLLOW_REQUESTS_KEY: &str = "pedal_follow_requests_v1";
pub const MESSAGE_EDGES_KEY: &str = "pedal_message_edges_v1";
pub const MESSAGE_REQUESTS_KEY: &str = "pedal_message_requests_v1";
pub const USER_SETTINGS_KEY: &str = "pedal_user_settings_v1";
pub const NOTIFICATIONS_KEY: &str = "pedal_notifications_v1";
pub const POSTS_KEY: &str = "pedal_posts_v1";

pub const ALL_TABLE_KEYS: [&str; 7] = [
    FOLLOW_EDGES_KEY,
    FOLLOW_REQUESTS_KEY,
    MESSAGE_EDGES_KEY,
    MESSAGE_REQUESTS_KEY,
    USER_SETTINGS_KEY,
    NOTIFICATIONS_KEY,
    POSTS_KEY,
];

// === Environment ===
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn bind_addr() -> String {
    std::env::var("PEDAL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

pub fn data_dir() -> PathBuf {
    std::env::var("PEDAL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".pedal"))
}

pub fn seed_demo() -> bool {
    env_flag("PEDAL_SEED_DEMO", false)
}

pub fn reset_on_start() -> bool {
    env_flag("PEDAL_RESET_ON_START", false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn unset_flag_uses_default() {
        assert!(env_flag("PEDAL_TEST_FLAG_THAT_IS_NEVER_SET", true));
        assert!(!env_flag("PEDAL_TEST_FLAG_THAT_IS_NEVER_SET", false));
    }
}
