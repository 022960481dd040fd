//! Notifier (C11): OneBot-compatible HTTP fan-out with at-least-once retry.

use std::time::Duration;

use serde_json::json;

use booking_domain::config::NotifierConfig;

use crate::message::{build_monitor_message, build_order_message, MonitorNotification, OrderNotification};

pub struct Notifier {
    http: reqwest::Client,
    cfg: NotifierConfig,
}

fn unique_ids(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for raw in values {
        let text = raw.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("all") || text.eq_ignore_ascii_case("everyone") {
            continue;
        }
        if seen.insert(text.to_string()) {
            result.push(text.to_string());
        }
    }
    result
}

impl Notifier {
    pub fn new(cfg: NotifierConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client with static config never fails to build");
        Self { http, cfg }
    }

    /// Sends a plain text message to every configured group and user,
    /// retrying each target independently (§10.5).
    pub async fn broadcast(&self, message: &str) -> bool {
        let groups = unique_ids(&self.cfg.target_groups);
        let users = unique_ids(&self.cfg.target_users);
        if groups.is_empty() && users.is_empty() {
            tracing::warn!("notification skipped: no target groups or users configured");
            return false;
        }

        if self.cfg.default_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.cfg.default_delay_secs)).await;
        }

        let mut any_success = false;
        for group_id in groups {
            let Ok(numeric) = group_id.parse::<i64>() else {
                tracing::error!(group_id, "not a valid numeric group id, skipped");
                continue;
            };
            let payload = json!({"group_id": numeric, "message": message});
            if self.post_with_retry("/send_group_msg", payload).await {
                any_success = true;
            }
        }
        for user_id in users {
            let Ok(numeric) = user_id.parse::<i64>() else {
                tracing::error!(user_id, "not a valid numeric user id, skipped");
                continue;
            };
            let payload = json!({"user_id": numeric, "message": message});
            if self.post_with_retry("/send_private_msg", payload).await {
                any_success = true;
            }
        }
        any_success
    }

    pub async fn send_order_notification(&self, notification: &OrderNotification) -> bool {
        self.broadcast(&build_order_message(notification)).await
    }

    pub async fn send_monitor_notification(&self, notification: &MonitorNotification) -> bool {
        if notification.slots.is_empty() {
            return false;
        }
        self.broadcast(&build_monitor_message(notification)).await
    }

    async fn post_with_retry(&self, path: &str, payload: serde_json::Value) -> bool {
        let url = format!("{}{}", self.cfg.bot_http_url.trim_end_matches('/'), path);
        let attempts = self.cfg.retry_count.max(1);

        for attempt in 1..=attempts {
            let mut req = self.http.post(&url).json(&payload);
            if let Some(token) = &self.cfg.access_token {
                req = req.bearer_auth(token);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<serde_json::Value>().await {
                    Ok(body) if body.get("status").and_then(|v| v.as_str()) == Some("ok") => return true,
                    Ok(body) => tracing::error!(%path, ?body, "bot returned a non-ok status"),
                    Err(e) => tracing::error!(%path, error = %e, "bot response was not valid json"),
                },
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::error!(%path, %status, body = %body.chars().take(500).collect::<String>(), "bot http error");
                    if status.as_u16() == 502 {
                        tracing::error!(bot_http_url = %self.cfg.bot_http_url, "bot gateway returned 502, is the OneBot service running?");
                    }
                }
                Err(e) => {
                    tracing::error!(%path, attempt, attempts, error = %e, "bot request failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_secs)).await;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids_drops_blank_and_all_markers() {
        let ids = vec!["123".to_string(), "".to_string(), "ALL".to_string(), "123".to_string(), "456".to_string()];
        assert_eq!(unique_ids(&ids), vec!["123".to_string(), "456".to_string()]);
    }
}
