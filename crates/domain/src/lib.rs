//! Shared types, configuration, and error handling for the booking agent.

pub mod config;
pub mod error;
pub mod models;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};
pub use trace::TraceEvent;
