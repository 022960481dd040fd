use serde::Serialize;

use booking_domain::Result;

use crate::crypto::{aes_encrypt_ecb, generate_aes_key, rsa_encrypt_pkcs1v15, timestamp_millis};

/// The encrypted order request: a body plus the two headers the upstream
/// expects (§4.2 step 6).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub body: String,
    pub sid_header: String,
    pub tim_header: String,
}

/// Builds the encrypted order envelope for an arbitrary serialisable
/// payload, following the hybrid RSA+AES scheme step by step.
pub fn build_envelope<T: Serialize>(
    rsa_public_key_pem: &str,
    payload: &T,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Envelope> {
    let plain_json = serde_json::to_string(payload)?;
    let aes_key = generate_aes_key();
    let body = aes_encrypt_ecb(&aes_key, &plain_json)?;

    let timestamp = timestamp_millis(now);
    let sid_header = rsa_encrypt_pkcs1v15(rsa_public_key_pem, &aes_key)?;
    let tim_header = rsa_encrypt_pkcs1v15(rsa_public_key_pem, &timestamp)?;

    Ok(Envelope {
        body,
        sid_header,
        tim_header,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_envelope_rejects_malformed_public_key() {
        let payload = json!({"venueId": "v1", "fieldType": "篮球场"});
        let err = build_envelope("not a pem key", &payload, chrono::Utc::now()).unwrap_err();
        assert!(matches!(err, booking_domain::Error::Config(_)));
    }
}
