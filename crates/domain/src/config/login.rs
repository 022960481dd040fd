use serde::{Deserialize, Serialize};

/// Session Authenticator (C5) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Login entry URL (CAS-style form page). Required to start a login
    /// session.
    #[serde(default)]
    pub login_url: Option<String>,
    /// Max redirects followed while resolving the final entry URL
    /// (`Prepare` step).
    #[serde(default = "d_prepare_redirects")]
    pub prepare_max_redirects: u32,
    /// Max redirects followed after a successful submit (`Follow` step).
    #[serde(default = "d_follow_redirects")]
    pub follow_max_redirects: u32,
    /// Minimum OCR confidence below which a short (4-6 char) answer is
    /// still tried, but anything shorter/longer falls straight to human
    /// fallback.
    #[serde(default = "d_confidence_threshold")]
    pub captcha_confidence_threshold: f32,
    /// Number of captcha resubmissions allowed on `BadCaptcha` before
    /// surfacing the error (does not re-run Prepare).
    #[serde(default = "d_bad_captcha_retries")]
    pub bad_captcha_retries: u32,
    /// TTL assigned to the cookie minted by a successful login.
    #[serde(default = "d_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            login_url: None,
            prepare_max_redirects: d_prepare_redirects(),
            follow_max_redirects: d_follow_redirects(),
            captcha_confidence_threshold: d_confidence_threshold(),
            bad_captcha_retries: d_bad_captcha_retries(),
            session_ttl_hours: d_session_ttl_hours(),
        }
    }
}

fn d_prepare_redirects() -> u32 {
    8
}
fn d_follow_redirects() -> u32 {
    5
}
fn d_confidence_threshold() -> f32 {
    0.3
}
fn d_bad_captcha_retries() -> u32 {
    3
}
fn d_session_ttl_hours() -> i64 {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_confidence_threshold_matches_spec() {
        assert!((LoginConfig::default().captcha_confidence_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn default_session_ttl_is_eight_hours() {
        assert_eq!(LoginConfig::default().session_ttl_hours, 8);
    }
}
