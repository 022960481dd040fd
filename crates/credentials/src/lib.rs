//! Multi-user credential store (C1): a single JSON file, optionally
//! encrypted at rest, holding one cookie record per user.

pub mod encryption;
pub mod store;

pub use store::{CredentialRecord, CredentialStore};
