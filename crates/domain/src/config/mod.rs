mod codec;
mod credentials;
mod jobs;
mod login;
mod notifier;
mod observability;
mod order;
mod presets;
mod server;

pub use codec::*;
pub use credentials::*;
pub use jobs::*;
pub use login::*;
pub use notifier::*;
pub use observability::*;
pub use order::*;
pub use presets::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub order: OrderConfig,
    #[serde(default)]
    pub presets: PresetsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Process-wide debug flag: when set, the Cron Runtime fires
    /// warmup+job once immediately instead of waiting for the configured
    /// wall-clock time. Normally driven by the `BOOKING_SCHEDULE_DEBUG`
    /// env var rather than the config file.
    #[serde(default)]
    pub schedule_debug: bool,
}

impl Config {
    /// Load from a TOML file, falling back to defaults for every section
    /// the file omits.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from a YAML file.
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut errors = Vec::new();

        if self.upstream.base_url.is_empty() {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "upstream.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "upstream.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.upstream.base_url
                ),
            });
        }

        if self.upstream.timeout_secs == 0 {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "upstream.timeout_secs".into(),
                message: "timeout_secs must be greater than 0".into(),
            });
        }

        if self.codec.rsa_public_key_pem.is_none() {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "codec.rsa_public_key_pem".into(),
                message: "no RSA public key configured — order submission will fail with ConfigError".into(),
            });
        }

        if self.presets.presets.is_empty() {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "presets".into(),
                message: "no presets configured — bookings must specify venue_id/field_type_id explicitly".into(),
            });
        }

        for (i, pattern) in self.order.failure_keywords.iter().enumerate() {
            if pattern.is_empty() {
                errors.push(ConfigIssue {
                    severity: ConfigSeverity::Warning,
                    field: format!("order.failure_keywords[{i}]"),
                    message: "empty keyword matches every message".into(),
                });
            }
        }

        if self.notifier.retry_count == 0 {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "notifier.retry_count".into(),
                message: "retry_count must be at least 1".into(),
            });
        }

        if !self.notifier.bot_http_url.starts_with("http://")
            && !self.notifier.bot_http_url.starts_with("https://")
        {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "notifier.bot_http_url".into(),
                message: "bot_http_url must start with http:// or https://".into(),
            });
        }

        if self.login.captcha_confidence_threshold < 0.0
            || self.login.captcha_confidence_threshold > 1.0
        {
            errors.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "login.captcha_confidence_threshold".into(),
                message: "must be in [0.0, 1.0]".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            codec: CodecConfig {
                rsa_public_key_pem: Some("-----BEGIN PUBLIC KEY-----\n...".into()),
            },
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn missing_rsa_key_is_warning_not_error() {
        let issues = Config::default().validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "codec.rsa_public_key_pem")
            .expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn empty_base_url_is_error() {
        let mut cfg = valid_config();
        cfg.upstream.base_url = String::new();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "upstream.base_url" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn bad_scheme_base_url_is_error() {
        let mut cfg = valid_config();
        cfg.upstream.base_url = "ftp://sports.example.edu.cn".into();
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.field == "upstream.base_url"));
    }

    #[test]
    fn zero_timeout_is_error() {
        let mut cfg = valid_config();
        cfg.upstream.timeout_secs = 0;
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.field == "upstream.timeout_secs"));
    }

    #[test]
    fn confidence_threshold_out_of_range_is_error() {
        let mut cfg = valid_config();
        cfg.login.captcha_confidence_threshold = 1.5;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "login.captcha_confidence_threshold"));
    }

    #[test]
    fn toml_roundtrip_uses_defaults_for_missing_sections() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.upstream.timeout_secs, 10);
        assert_eq!(cfg.jobs.keep_alive_interval_secs, 900);
    }
}
