use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine};
use cipher::{BlockEncryptMut, KeyInit};
use ecb::Encryptor as EcbEncryptor;
use rand::Rng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use booking_domain::{Error, Result};

type Aes128EcbEnc = EcbEncryptor<Aes128>;

const AES_KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a fresh 16-character ASCII AES key (uppercase letters and
/// digits), one per order request (§4.2 step 1).
pub fn generate_aes_key() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let idx = rng.gen_range(0..AES_KEY_ALPHABET.len());
            AES_KEY_ALPHABET[idx] as char
        })
        .collect()
}

/// AES-128-ECB, PKCS#7 padding, base64-encoded ciphertext (§4.2 step 3).
pub fn aes_encrypt_ecb(key: &str, plaintext: &str) -> Result<String> {
    if key.len() != 16 {
        return Err(Error::Other(format!(
            "AES key must be 16 bytes, got {}",
            key.len()
        )));
    }
    let enc = Aes128EcbEnc::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Other(format!("bad AES key: {e}")))?;
    let ciphertext = enc.encrypt_padded_vec_mut::<cipher::block_padding::Pkcs7>(plaintext.as_bytes());
    Ok(STANDARD.encode(ciphertext))
}

/// RSA PKCS#1 v1.5 encryption of an arbitrary UTF-8 string, base64-encoded
/// (§4.2 step 5). Used for both the AES key and the timestamp.
pub fn rsa_encrypt_pkcs1v15(public_key_pem: &str, data: &str) -> Result<String> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| Error::Config(format!("invalid RSA public key: {e}")))?;
    let mut rng = rand::thread_rng();
    let ciphertext = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, data.as_bytes())
        .map_err(|e| Error::Other(format!("RSA encryption failed: {e}")))?;
    Ok(STANDARD.encode(ciphertext))
}

/// Millisecond-precision Unix timestamp as a decimal string (§4.2 step 4).
pub fn timestamp_millis(now: chrono::DateTime<chrono::Utc>) -> String {
    now.timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_aes_key_is_sixteen_chars_of_alphabet() {
        let key = generate_aes_key();
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn aes_encrypt_rejects_wrong_key_length() {
        let err = aes_encrypt_ecb("short", "{}").unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn aes_encrypt_produces_base64() {
        let key = "ABCDEFGH12345678";
        let out = aes_encrypt_ecb(key, "{\"a\":1}").unwrap();
        assert!(STANDARD.decode(&out).is_ok());
    }

    #[test]
    fn timestamp_millis_is_numeric() {
        let now = chrono::Utc::now();
        let ts = timestamp_millis(now);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }
}
