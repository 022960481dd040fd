use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use booking_domain::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// Derives a 256-bit AES-GCM key from the process-wide secret via
/// HMAC-SHA256, domain-separated so the same secret used elsewhere in
/// the process can't be replayed as a credentials key.
fn derive_key(secret: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(b"booking-credentials-file-key-v1");
    let digest = mac.finalize().into_bytes();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Encrypts `plaintext` under the secret, returning a base64 blob of
/// `nonce || ciphertext`.
pub fn encrypt(secret: &str, plaintext: &[u8]) -> Result<String> {
    let key_bytes = derive_key(secret);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::Other(format!("credential encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Inverse of [`encrypt`].
pub fn decrypt(secret: &str, blob: &str) -> Result<Vec<u8>> {
    let raw = STANDARD
        .decode(blob)
        .map_err(|e| Error::Other(format!("credential blob is not base64: {e}")))?;
    if raw.len() < NONCE_LEN {
        return Err(Error::Other("credential blob too short".into()));
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);

    let key_bytes = derive_key(secret);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| Error::Other(format!("credential decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let secret = "super-secret-process-key";
        let plaintext = b"{\"version\":2,\"cookies\":{}}";
        let blob = encrypt(secret, plaintext).unwrap();
        let decrypted = decrypt(secret, &blob).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_with_wrong_secret_fails() {
        let blob = encrypt("secret-a", b"payload").unwrap();
        assert!(decrypt("secret-b", &blob).is_err());
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let secret = "k";
        let a = encrypt(secret, b"same plaintext").unwrap();
        let b = encrypt(secret, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
