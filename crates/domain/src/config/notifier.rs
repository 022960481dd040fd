use serde::{Deserialize, Serialize};

/// Notifier (C11) configuration: an OneBot-compatible HTTP endpoint plus
/// the broadcast target lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "d_bot_http_url")]
    pub bot_http_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub target_groups: Vec<String>,
    #[serde(default)]
    pub target_users: Vec<String>,
    #[serde(default = "d_retry_count")]
    pub retry_count: u32,
    #[serde(default = "d_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Seconds to wait before the first send of a broadcast.
    #[serde(default)]
    pub default_delay_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_http_url: d_bot_http_url(),
            access_token: None,
            target_groups: Vec::new(),
            target_users: Vec::new(),
            retry_count: d_retry_count(),
            retry_delay_secs: d_retry_delay_secs(),
            default_delay_secs: 0,
        }
    }
}

fn d_bot_http_url() -> String {
    "http://127.0.0.1:3000".into()
}
fn d_retry_count() -> u32 {
    3
}
fn d_retry_delay_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_count_is_three() {
        assert_eq!(NotifierConfig::default().retry_count, 3);
    }
}
