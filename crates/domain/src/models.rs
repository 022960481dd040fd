//! Core data model shared by every component (§3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// The per-user session record (cookie + TTL + username/nickname
// identity) lives entirely in `booking_credentials::store::CredentialRecord`,
// which owns both the on-disk shape and the `key()`/expiry logic the
// Credential Store (C1) needs — there is no separate domain-level copy.

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Preset catalogue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub index: i64,
    pub venue_id: String,
    pub venue_name: String,
    pub field_type_id: String,
    pub field_type_name: String,
    #[serde(default)]
    pub field_type_code: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolver input / output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One or more day offsets (an int or a list, per spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateOffset {
    Single(i64),
    Many(Vec<i64>),
}

impl DateOffset {
    pub fn into_vec(self) -> Vec<i64> {
        match self {
            DateOffset::Single(n) => vec![n],
            DateOffset::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BookingTarget {
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub venue_keyword: Option<String>,
    #[serde(default)]
    pub field_type_id: Option<String>,
    #[serde(default)]
    pub field_type_keyword: Option<String>,
    #[serde(default)]
    pub field_type_code: Option<String>,
    #[serde(default)]
    pub date_offset: Option<DateOffset>,
    #[serde(default)]
    pub fixed_dates: Vec<String>,
    #[serde(default)]
    pub use_all_dates: bool,
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: u32,
    #[serde(default)]
    pub target_users: Vec<String>,
    #[serde(default)]
    pub exclude_users: Vec<String>,
}

fn default_start_hour() -> u32 {
    18
}
fn default_duration_hours() -> u32 {
    1
}

impl BookingTarget {
    /// §9 resolution 1: a target must name a preset or a venue somehow.
    pub fn has_venue_reference(&self) -> bool {
        self.venue_id.is_some() || self.venue_keyword.is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slot / order
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub remain: Option<i64>,
    #[serde(default)]
    pub capacity: Option<i64>,
    pub available: bool,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub area_name: Option<String>,
    #[serde(default)]
    pub sub_site_id: Option<String>,
    /// Opaque single-use nonce required for ordering; never cached
    /// across requests.
    #[serde(default)]
    pub sign: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Slot {
    /// The integer hour parsed from `start` (`"HH:MM"`), used by the
    /// resolver's post-fetch start_hour filter (§4.7 step 5).
    pub fn start_hour(&self) -> Option<u32> {
        self.start.split(':').next()?.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub venue_id: String,
    pub field_type_id: String,
    pub slot_id: String,
    pub date: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub sign: String,
    #[serde(default)]
    pub sub_site_id: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Monitor,
    Schedule,
    AutoBooking,
    KeepAlive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Stopped,
    Failed,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_type: JobType,
    pub name: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pid: Option<u32>,
    pub config: serde_json::Value,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorState {
    pub target: BookingTarget,
    pub interval_seconds: u64,
    pub auto_book: bool,
    #[serde(default)]
    pub operating_window: Option<(u32, u32)>,
    #[serde(default)]
    pub require_all_users_success: bool,
    #[serde(default = "default_max_time_gap_hours")]
    pub max_time_gap_hours: u32,
    #[serde(default)]
    pub preferred_hours: Vec<u32>,
    #[serde(default)]
    pub preferred_days: Vec<u32>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub found_slots: Vec<Slot>,
    #[serde(default)]
    pub booking_attempts: u64,
    #[serde(default)]
    pub successful_bookings: u64,
    #[serde(default)]
    pub window_active: bool,
    #[serde(default)]
    pub next_window_start: Option<DateTime<Utc>>,
}

fn default_max_time_gap_hours() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleState {
    pub target: BookingTarget,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub date_offset: i64,
    #[serde(default = "default_start_hours")]
    pub start_hours: Vec<u32>,
    pub duration_hours: u32,
    #[serde(default)]
    pub require_all_users_success: bool,
    #[serde(default = "default_max_time_gap_hours")]
    pub max_time_gap_hours: u32,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub success_count: u64,
}

fn default_start_hours() -> Vec<u32> {
    vec![18]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBookingTarget {
    pub preset: i64,
    pub priority: i32,
    pub enabled: bool,
    #[serde(default)]
    pub time_slots: Vec<u32>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    #[serde(default)]
    pub order_id: Option<String>,
    pub preset: Option<i64>,
    pub venue_name: String,
    pub field_type_name: String,
    pub date: String,
    pub start: String,
    pub end: String,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user outcome of a multi-user booking attempt (original_source
/// `multi_user.py::UserBookingResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBookingResult {
    pub nickname: String,
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub type PresetCatalogue = HashMap<i64, Preset>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_start_hour_parses_hh_mm() {
        let slot = Slot {
            slot_id: "1".into(),
            start: "18:00".into(),
            end: "19:00".into(),
            price: None,
            remain: None,
            capacity: None,
            available: true,
            field_name: None,
            area_name: None,
            sub_site_id: None,
            sign: None,
            raw: serde_json::Value::Null,
        };
        assert_eq!(slot.start_hour(), Some(18));
    }

    #[test]
    fn date_offset_single_becomes_one_element_vec() {
        let d: DateOffset = serde_json::from_str("7").unwrap();
        assert_eq!(d.into_vec(), vec![7]);
    }

    #[test]
    fn date_offset_list_round_trips() {
        let d: DateOffset = serde_json::from_str("[1,2,3]").unwrap();
        assert_eq!(d.into_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn booking_target_requires_venue_reference() {
        let t = BookingTarget::default();
        assert!(!t.has_venue_reference());
    }
}
