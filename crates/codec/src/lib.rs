//! Order payload encryption and `sign` token decoding for the upstream
//! booking protocol.

pub mod crypto;
pub mod envelope;
pub mod sign;

pub use crypto::{aes_encrypt_ecb, generate_aes_key, rsa_encrypt_pkcs1v15, timestamp_millis};
pub use envelope::{build_envelope, Envelope};
pub use sign::{decode_sign_window, DecodedWindow};
