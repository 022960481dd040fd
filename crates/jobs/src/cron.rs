//! Cron Runtime (C9): fires a daily wall-clock job, with an optional
//! warmup a few seconds ahead, and a debug short-circuit for local
//! verification (§4.9, §10.5).

use std::future::Future;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

use booking_domain::trace::TraceEvent;

/// Env vars that short-circuit scheduling into "fire once, now" (§10.5).
pub const DEBUG_ENV_VARS: &[&str] = &["SCHEDULE_DEBUG", "BOOKING_SCHEDULE_DEBUG"];

pub fn debug_mode_enabled() -> bool {
    DEBUG_ENV_VARS.iter().any(|name| {
        std::env::var(name)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    })
}

/// The next UTC instant at which `hour:minute:second` occurs, strictly
/// after `after`.
pub fn next_daily_fire(after: DateTime<Utc>, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    let today = after
        .date_naive()
        .and_hms_opt(hour, minute, second)
        .expect("hour/minute/second must be valid clock components");
    let today_utc = Utc.from_utc_datetime(&today);
    if today_utc > after {
        today_utc
    } else {
        Utc.from_utc_datetime(&(today + Duration::days(1)))
    }
}

/// Subtracts `offset_seconds` from a daily fire time, clamped to not
/// cross below `:00` of that same minute (matching the source's warmup
/// scheduling, which never borrows from the minute field).
pub fn warmup_fire(fire_at: DateTime<Utc>, offset_seconds: i64) -> DateTime<Utc> {
    if offset_seconds <= 0 {
        return fire_at;
    }
    let seconds = fire_at.second() as i64;
    let clamped_offset = offset_seconds.min(seconds);
    fire_at - Duration::seconds(clamped_offset)
}

/// Runs `job` once a day at `hour:minute:second` UTC, preceded by
/// `warmup` at `warmup_offset_seconds` earlier. In debug mode
/// ([`debug_mode_enabled`]), both fire immediately, once, and the
/// function returns instead of looping forever.
pub async fn run_daily<J, JFut, W, WFut>(
    hour: u32,
    minute: u32,
    second: u32,
    warmup_offset_seconds: i64,
    job_id: &str,
    mut warmup: W,
    mut job: J,
) where
    J: FnMut() -> JFut,
    JFut: Future<Output = ()>,
    W: FnMut() -> WFut,
    WFut: Future<Output = ()>,
{
    if debug_mode_enabled() {
        tracing::info!(job_id, "cron debug mode: firing warmup+job immediately");
        warmup().await;
        job().await;
        return;
    }

    loop {
        let now = Utc::now();
        let fire_at = next_daily_fire(now, hour, minute, second);
        let warmup_at = warmup_fire(fire_at, warmup_offset_seconds);

        TraceEvent::ScheduleFired {
            job_id: job_id.to_string(),
            scheduled_for: fire_at.to_rfc3339(),
            warmup_offset_seconds,
        }
        .emit();

        if warmup_at > now {
            sleep_until(warmup_at).await;
        }
        warmup().await;

        let now = Utc::now();
        if fire_at > now {
            sleep_until(fire_at).await;
        }
        job().await;
    }
}

/// Expands a list of start hours into independent fire times sharing the
/// same minute/second, for §4.9's multi-hour parallel booking attempts
/// (§9 resolution 2).
pub fn expand_start_hours(start_hours: &[u32], minute: u32, second: u32) -> Vec<(u32, u32, u32)> {
    start_hours.iter().map(|h| (*h, minute, second)).collect()
}

async fn sleep_until(target: DateTime<Utc>) {
    let now = Utc::now();
    let delta = (target - now).to_std().unwrap_or(std::time::Duration::ZERO);
    tokio::time::sleep(delta).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, h, m, s).unwrap()
    }

    #[test]
    fn next_daily_fire_rolls_to_tomorrow_when_time_passed() {
        let after = at(12, 0, 1);
        let next = next_daily_fire(after, 12, 0, 0);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap());
    }

    #[test]
    fn next_daily_fire_stays_today_when_time_not_reached() {
        let after = at(11, 59, 0);
        let next = next_daily_fire(after, 12, 0, 0);
        assert_eq!(next, at(12, 0, 0));
    }

    #[test]
    fn warmup_fire_subtracts_offset() {
        let fire = at(12, 0, 0);
        assert_eq!(warmup_fire(fire, 3), at(11, 59, 57));
    }

    #[test]
    fn warmup_fire_clamps_to_minute_boundary() {
        let fire = at(12, 0, 1);
        assert_eq!(warmup_fire(fire, 3), at(12, 0, 0));
    }

    #[test]
    fn expand_start_hours_pairs_each_hour_with_shared_minute_second() {
        let expanded = expand_start_hours(&[18, 19, 20], 0, 0);
        assert_eq!(expanded, vec![(18, 0, 0), (19, 0, 0), (20, 0, 0)]);
    }
}
