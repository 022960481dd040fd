use serde::{Deserialize, Serialize};

/// Credential store (C1) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path to the credentials JSON file.
    #[serde(default = "d_path")]
    pub path: String,
    /// Default TTL applied when a caller saves a cookie without an
    /// explicit `expires_at`, and when migrating a legacy record that
    /// lacks one.
    #[serde(default = "d_default_ttl_hours")]
    pub default_ttl_hours: i64,
    /// Name of the environment variable holding the at-rest encryption
    /// secret. When unset or the variable is absent, the file is stored
    /// as plain JSON.
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: d_path(),
            default_ttl_hours: d_default_ttl_hours(),
            secret_env: d_secret_env(),
        }
    }
}

fn d_path() -> String {
    "./data/credentials.json".into()
}
fn d_default_ttl_hours() -> i64 {
    4
}
fn d_secret_env() -> String {
    "BOOKING_CREDENTIALS_SECRET".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_four_hours() {
        assert_eq!(CredentialsConfig::default().default_ttl_hours, 4);
    }
}
