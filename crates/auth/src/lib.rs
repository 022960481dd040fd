//! Session Authenticator (C5): scrapes the CAS-style login form, solves
//! or delegates captchas, submits credentials, and manually walks the
//! post-login redirect chain to mint a session cookie.

pub mod client;
pub mod scrape;
pub mod solver;

pub use client::{login, AuthClient, AuthResult, AuthState};
pub use solver::{CaptchaSolver, FixedSolver, HumanFallback};
