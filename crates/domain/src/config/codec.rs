use serde::{Deserialize, Serialize};

/// Protocol codec (C2) configuration: the RSA public key used to wrap the
/// per-request AES key and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// RSA public key, PEM-encoded (PKCS#1 or SPKI — both accepted at
    /// load time). Required for order submission; absence is a
    /// `ConfigError` surfaced the first time an order is attempted.
    #[serde(default)]
    pub rsa_public_key_pem: Option<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            rsa_public_key_pem: None,
        }
    }
}
