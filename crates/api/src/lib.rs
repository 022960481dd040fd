//! Booking API (C4): typed wrappers over the upstream sports-venue
//! platform's endpoints, plus response-shape coercion and order
//! success/failure classification.

pub mod classify;
pub mod client;
pub mod models;
pub mod parsing;
pub mod resolver;

pub use classify::{classify_order_response, is_rate_limited};
pub use client::BookingApi;
pub use models::{FieldType, Venue};
pub use resolver::{expand_dates, filter_by_start_hour, find_venue, parse_date_input, resolve_target, ResolvedTarget};
