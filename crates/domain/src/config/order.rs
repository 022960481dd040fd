use serde::{Deserialize, Serialize};

/// Configurable keyword sets used by the Booking API's success/failure
/// classifier (§4.4.1) and the multi-user rate-limit detector (§4.8.1).
///
/// Both are configuration rather than compiled-in constants: spec.md's
/// open question 4 flags that substring matching over Chinese keywords
/// can false-positive against a venue or message that happens to contain
/// one of the tokens, so operators need the ability to tune the set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Substrings that, if present in an order response message, mark the
    /// attempt a `BusinessError` even though the HTTP call itself
    /// succeeded.
    #[serde(default = "d_failure_keywords")]
    pub failure_keywords: Vec<String>,
    /// Substrings (and the literal "500") that mark an error message as a
    /// rate limit, triggering multi-user failover.
    #[serde(default = "d_rate_limit_keywords")]
    pub rate_limit_keywords: Vec<String>,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            failure_keywords: d_failure_keywords(),
            rate_limit_keywords: d_rate_limit_keywords(),
        }
    }
}

fn d_failure_keywords() -> Vec<String> {
    [
        "失败", "错误", "超时", "登录", "权限", "不存在", "已满", "不可用",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn d_rate_limit_keywords() -> Vec<String> {
    ["请求过于频繁", "频率", "500"].into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_limit_keywords_include_500() {
        assert!(OrderConfig::default().rate_limit_keywords.iter().any(|k| k == "500"));
    }

    #[test]
    fn default_failure_keywords_has_eight_entries() {
        assert_eq!(OrderConfig::default().failure_keywords.len(), 8);
    }
}
