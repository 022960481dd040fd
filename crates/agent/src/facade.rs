//! Service Facade (C12, §4.12): the single entry point every external
//! caller (bot, admin API, or the CLI in this repo) uses. Each method is
//! short — build an HTTP client for the chosen (or active) user, call
//! one or two Booking API methods, return a plain result record — and
//! every booking outcome is persisted as a [`BookingRecord`].

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use booking_api::resolver::{filter_by_start_hour, parse_date_input, resolve_target};
use booking_api::BookingApi;
use booking_domain::models::{BookingRecord, BookingTarget, Job, JobType, MonitorState, OrderIntent, ScheduleState};
use booking_domain::{Error, Result};
use booking_http::UserHttpClient;

use crate::bootstrap::AppContext;
use crate::login_session::LoginSessionInfo;

/// `ListSlots` result (§4.12): the venue/field-type a target resolved
/// to, and every fetched slot paired with the concrete date it came
/// from.
#[derive(Debug, Clone, Serialize)]
pub struct SlotListResult {
    pub venue_id: String,
    pub venue_name: Option<String>,
    pub field_type_id: String,
    pub field_type_name: Option<String>,
    pub slots: Vec<(String, booking_domain::models::Slot)>,
}

/// `OrderOnce` result (§4.12).
#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
}

pub struct ServiceFacade {
    ctx: AppContext,
}

impl ServiceFacade {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Builds a per-user `BookingApi`, failing with `AuthExpired` when
    /// the chosen (or active) user has no live cookie (§3 User invariant).
    fn api_for_user(&self, user: Option<&str>) -> Result<BookingApi> {
        let (cookie, expires_at) = self
            .ctx
            .credentials
            .load(user)
            .ok_or_else(|| Error::AuthExpired {
                user: user.unwrap_or("__default__").to_string(),
            })?;
        if Utc::now() >= expires_at {
            return Err(Error::AuthExpired {
                user: user.unwrap_or("__default__").to_string(),
            });
        }

        let upstream = &self.ctx.config.upstream;
        let http = UserHttpClient::new(&upstream.base_url, cookie, upstream.timeout_secs)?;
        Ok(BookingApi::new(
            http,
            upstream.clone(),
            self.ctx.config.order.clone(),
            self.ctx.config.codec.rsa_public_key_pem.clone(),
        ))
    }

    fn return_url(&self) -> String {
        format!("{}/pc/", self.ctx.config.upstream.base_url)
    }

    // ── ListSlots ──────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn list_slots(
        &self,
        preset: Option<i64>,
        venue_id: Option<String>,
        field_type_id: Option<String>,
        date: Option<String>,
        start_hour: Option<u32>,
        show_full: bool,
        user: Option<&str>,
    ) -> Result<SlotListResult> {
        let api = self.api_for_user(user)?;

        let mut target = BookingTarget {
            venue_id,
            field_type_id,
            ..Default::default()
        };
        if preset.is_none() && !target.has_venue_reference() {
            return Err(Error::Config("neither preset nor venue_id/venue_keyword was given".into()));
        }
        target.start_hour = start_hour.unwrap_or(target.start_hour);

        let resolved = resolve_target(&api, &target, &self.ctx.config.presets.presets, preset).await?;
        if resolved.venue_id.is_empty() || resolved.field_type_id.is_empty() {
            return Err(Error::Config("could not resolve venue/field type from the given target".into()));
        }

        let date = date.unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
        let date = parse_date_input(&date, Utc::now()).ok_or_else(|| Error::Config(format!("invalid date {date}")))?;

        let mut slots = api.query_slots(&resolved.venue_id, &resolved.field_type_id, &date, None).await?;
        slots = filter_by_start_hour(slots, start_hour);
        if !show_full {
            slots.retain(|s| s.available);
        }

        Ok(SlotListResult {
            venue_id: resolved.venue_id,
            venue_name: resolved.venue_name,
            field_type_id: resolved.field_type_id,
            field_type_name: resolved.field_type_name,
            slots: slots.into_iter().map(|s| (date.clone(), s)).collect(),
        })
    }

    // ── OrderOnce ──────────────────────────────────────────────────

    pub async fn order_once(
        &self,
        preset: Option<i64>,
        date: String,
        start_time: String,
        end_time: Option<String>,
        user: Option<&str>,
    ) -> Result<OrderResult> {
        let api = self.api_for_user(user)?;

        let target = BookingTarget::default();
        if preset.is_none() && !target.has_venue_reference() {
            return Err(Error::Config("OrderOnce requires a preset".into()));
        }
        let resolved = resolve_target(&api, &target, &self.ctx.config.presets.presets, preset).await?;
        if resolved.venue_id.is_empty() || resolved.field_type_id.is_empty() {
            return Err(Error::Config("preset did not resolve to a venue/field type".into()));
        }

        let date = parse_date_input(&date, Utc::now()).ok_or_else(|| Error::Config(format!("invalid date input {date}")))?;
        let start_hour = parse_hour(&start_time)?;
        let end_hour = match &end_time {
            Some(t) => parse_hour(t)?,
            None => start_hour + target.duration_hours,
        };

        let slots = api.query_slots(&resolved.venue_id, &resolved.field_type_id, &date, None).await?;
        let candidate = slots
            .iter()
            .find(|s| s.available && s.start_hour() == Some(start_hour))
            .ok_or_else(|| Error::Config(format!("no available slot at {start_hour:02}:00 on {date}")))?;

        let intent = OrderIntent {
            venue_id: resolved.venue_id.clone(),
            field_type_id: resolved.field_type_id.clone(),
            slot_id: candidate.slot_id.clone(),
            date: date.clone(),
            start: candidate.start.clone(),
            end: format!("{end_hour:02}:00"),
            price: candidate.price,
            sign: candidate.sign.clone().ok_or_else(|| Error::Config("slot has no sign token".into()))?,
            sub_site_id: candidate.sub_site_id.clone(),
            field_name: candidate.field_name.clone(),
            order_id: None,
            payload: serde_json::json!({}),
        };

        let result = match api.order_immediately(&intent, &self.return_url()).await {
            Ok(order_id) => OrderResult {
                success: true,
                message: format!("预订成功，订单号 {order_id}"),
                order_id: Some(order_id),
                category: None,
            },
            Err(e) => OrderResult {
                success: false,
                message: e.to_string(),
                order_id: None,
                category: Some(e.category()),
            },
        };

        self.ctx.records.append(&BookingRecord {
            order_id: result.order_id.clone(),
            preset,
            venue_name: resolved.venue_name.unwrap_or(resolved.venue_id),
            field_type_name: resolved.field_type_name.unwrap_or(resolved.field_type_id),
            date,
            start: candidate.start.clone(),
            end: intent.end.clone(),
            status: if result.success { "success".into() } else { "failed".into() },
            message: result.message.clone(),
            created_at: Utc::now(),
        })?;

        Ok(result)
    }

    // ── Monitor jobs ───────────────────────────────────────────────

    pub fn start_monitor(&self, name: String, state: MonitorState) -> Result<Job> {
        self.ctx
            .supervisor
            .create_job(JobType::Monitor, name, serde_json::to_value(&state)?, true)
    }

    pub async fn stop_monitor(&self, job_id: &str) -> Result<bool> {
        self.ctx.supervisor.stop_job(job_id).await
    }

    /// Pausing is stopping the worker while keeping its job record and
    /// config (C10 has no separate paused status; the job supervisor's
    /// stop/start pair on the same `job_id` is idempotent and preserves
    /// the persisted `MonitorState`).
    pub async fn pause_monitor(&self, job_id: &str) -> Result<bool> {
        self.ctx.supervisor.stop_job(job_id).await
    }

    pub fn resume_monitor(&self, job_id: &str) -> Result<bool> {
        self.ctx.supervisor.start_job(job_id)
    }

    pub fn monitor_status(&self, job_id: &str) -> Option<Job> {
        self.ctx.supervisor.get_job(job_id).filter(|j| j.job_type == JobType::Monitor)
    }

    // ── Schedule jobs ──────────────────────────────────────────────

    pub fn schedule_daily_job(&self, name: String, state: ScheduleState) -> Result<Job> {
        self.ctx
            .supervisor
            .create_job(JobType::Schedule, name, serde_json::to_value(&state)?, true)
    }

    pub fn list_scheduled_jobs(&self) -> Vec<Job> {
        self.ctx.supervisor.list_jobs(Some(JobType::Schedule))
    }

    pub async fn cancel_scheduled_job(&self, job_id: &str) -> Result<bool> {
        self.ctx.supervisor.delete_job(job_id).await
    }

    // ── Login sessions ─────────────────────────────────────────────

    pub async fn start_login_session(&self, username: String, password: String) -> Result<LoginSessionInfo> {
        self.ctx.login_sessions.start(username, password).await
    }

    pub async fn submit_login_session_code(&self, session_id: Uuid, code: Option<String>) -> Result<LoginSessionInfo> {
        self.ctx.login_sessions.submit_code(session_id, code).await
    }

    pub fn cancel_login_session(&self, session_id: Uuid) -> bool {
        self.ctx.login_sessions.cancel(session_id)
    }

    pub fn login_status(&self, session_id: Uuid) -> Option<LoginSessionInfo> {
        self.ctx.login_sessions.status(session_id)
    }

    // ── Misc ─────────────────────────────────────────────────────

    pub fn recent_bookings(&self, limit: usize) -> Vec<BookingRecord> {
        self.ctx.records.recent(limit)
    }

    pub fn list_jobs(&self, job_type: Option<JobType>) -> Vec<Job> {
        self.ctx.supervisor.list_jobs(job_type)
    }

    pub fn job_logs(&self, job_id: &str, lines: usize) -> Vec<String> {
        self.ctx.supervisor.get_job_logs(job_id, lines)
    }
}

/// Parses `"H"`, `"HH"`, or `"HH:MM"` into an hour integer (§4.12
/// `OrderOnce`'s time-parsing contract).
fn parse_hour(input: &str) -> Result<u32> {
    let hour_part = input.split(':').next().unwrap_or(input);
    hour_part
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("invalid time {input}, expected H, HH, or HH:MM")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hour_accepts_bare_hour() {
        assert_eq!(parse_hour("18").unwrap(), 18);
    }

    #[test]
    fn parse_hour_accepts_hour_minute() {
        assert_eq!(parse_hour("18:30").unwrap(), 18);
    }

    #[test]
    fn parse_hour_rejects_garbage() {
        assert!(parse_hour("not-a-time").is_err());
    }
}
