//! `job-worker --job-id <id>` dispatch: the body of the re-exec'd
//! subprocess [`booking_jobs::process::spawn_worker`] launches (§4.10).
//! Looks up the job's recorded type and config, then runs the matching
//! per-kind runtime (C6/C8/C9) until the process is killed by the
//! supervisor's stop sequence.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use booking_domain::models::{AutoBookingTarget, JobType, MonitorState, ScheduleState};
use booking_domain::{Error, Result};
use booking_jobs::cron::{debug_mode_enabled, run_daily};
use booking_jobs::keepalive::run_keep_alive_cycle;
use booking_jobs::{run_autobooking_sweep, run_monitor_tick, run_schedule_fire, AutoBookingContext, MonitorContext, ScheduleContext};

use crate::bootstrap::AppContext;
use crate::records::BookingRecordLog;

/// Seconds before the configured fire time that the warmup ping runs
/// (§4.9 default).
const DEFAULT_WARMUP_OFFSET_SECS: i64 = 3;

/// Job-kind-specific config for `JobType::AutoBooking`: a prioritised
/// target list plus the single daily fire time they all share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBookingJobConfig {
    pub targets: Vec<AutoBookingTarget>,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    #[serde(default)]
    pub date_offset_days: i64,
}

pub async fn run(job_id: &str, ctx: &AppContext) -> Result<()> {
    let job = ctx
        .supervisor
        .get_job(job_id)
        .ok_or_else(|| Error::Config(format!("job {job_id} not found in registry")))?;

    match job.job_type {
        JobType::KeepAlive => run_keep_alive(job_id, ctx).await,
        JobType::Monitor => run_monitor(job_id, ctx, job.config).await,
        JobType::Schedule => run_schedule(job_id, ctx, job.config).await,
        JobType::AutoBooking => run_autobooking(job_id, ctx, job.config).await,
    }
}

async fn run_keep_alive(job_id: &str, ctx: &AppContext) -> Result<()> {
    let interval = std::time::Duration::from_secs(ctx.config.jobs.keep_alive_interval_secs);
    loop {
        tracing::info!(job_id, "keep-alive: running cycle");
        run_keep_alive_cycle(&ctx.credentials, &ctx.config.upstream).await;
        ctx.login_sessions.gc_expired();
        tokio::time::sleep(interval).await;
    }
}

async fn run_monitor(job_id: &str, ctx: &AppContext, config: serde_json::Value) -> Result<()> {
    let mut state: MonitorState = serde_json::from_value(config)
        .map_err(|e| Error::Config(format!("invalid MonitorState for job {job_id}: {e}")))?;
    if !state.target.has_venue_reference() {
        return Err(Error::Config("monitor target has neither a venue_id nor a venue_keyword".into()));
    }

    let monitor_ctx = MonitorContext {
        upstream: &ctx.config.upstream,
        order_cfg: &ctx.config.order,
        rsa_public_key_pem: ctx.config.codec.rsa_public_key_pem.as_deref(),
        preset_catalogue: &ctx.config.presets.presets,
        preset_index: None,
        return_url: &format!("{}/pc/", ctx.config.upstream.base_url),
        max_order_retries: ctx.config.upstream.order_retries,
    };

    loop {
        match run_monitor_tick(job_id, &mut state, &ctx.credentials, &monitor_ctx, &ctx.notifier).await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!(job_id, error = %e, "monitor tick failed");
                return Err(e);
            }
        }
        ctx.supervisor.update_config(job_id, serde_json::to_value(&state)?)?;
        tokio::time::sleep(std::time::Duration::from_secs(state.interval_seconds)).await;
    }
}

async fn run_schedule(job_id: &str, ctx: &AppContext, config: serde_json::Value) -> Result<()> {
    let state: ScheduleState = serde_json::from_value(config)
        .map_err(|e| Error::Config(format!("invalid ScheduleState for job {job_id}: {e}")))?;
    if !state.target.has_venue_reference() {
        return Err(Error::Config("schedule target has neither a venue_id nor a venue_keyword".into()));
    }

    let hours = if state.start_hours.is_empty() {
        vec![state.hour]
    } else {
        state.start_hours.clone()
    };

    // §4.9 / REDESIGN FLAG 2: every configured hour gets its own parallel
    // booking attempt against the same target template, all firing at the
    // shared `hour:minute:second` wall clock time; each attempt searches
    // only its own hour instead of the whole list.
    let mut handles = Vec::new();
    for hour in hours {
        let mut per_hour_state = state.clone();
        per_hour_state.start_hours = vec![hour];
        let ctx = ctx.clone();
        let job_id = job_id.to_string();
        handles.push(tokio::spawn(async move {
            run_one_schedule_lane(&job_id, ctx, per_hour_state).await
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(job_id, error = %e, "schedule lane task panicked");
        }
    }
    Ok(())
}

async fn run_one_schedule_lane(job_id: &str, ctx: AppContext, mut state: ScheduleState) {
    let schedule_ctx = ScheduleContext {
        upstream: &ctx.config.upstream,
        order_cfg: &ctx.config.order,
        rsa_public_key_pem: ctx.config.codec.rsa_public_key_pem.as_deref(),
        preset_catalogue: &ctx.config.presets.presets,
        preset_index: None,
        return_url: &format!("{}/pc/", ctx.config.upstream.base_url),
        max_order_retries: ctx.config.upstream.order_retries,
    };

    run_daily(
        state.hour,
        state.minute,
        state.second,
        DEFAULT_WARMUP_OFFSET_SECS,
        job_id,
        || async { tracing::info!(job_id, "schedule: warmup ping") },
        || async {
            match run_schedule_fire(job_id, &mut state, &ctx.credentials, &schedule_ctx, &ctx.notifier).await {
                Ok(results) => {
                    record_results(&ctx.records, &state.target, &state.hour.to_string(), &results);
                }
                Err(e) => tracing::error!(job_id, error = %e, "scheduled fire failed"),
            }
            if let Err(e) = ctx.supervisor.update_config(job_id, serde_json::to_value(&state).unwrap_or_default()) {
                tracing::warn!(job_id, error = %e, "failed to persist schedule state");
            }
        },
    )
    .await;

    if debug_mode_enabled() {
        let _ = ctx.supervisor.mark_completed(job_id);
    }
}

fn record_results(
    records: &BookingRecordLog,
    target: &booking_domain::models::BookingTarget,
    date: &str,
    results: &[booking_domain::models::UserBookingResult],
) {
    for result in results {
        let record = booking_domain::models::BookingRecord {
            order_id: result.order_id.clone(),
            preset: None,
            venue_name: target.venue_keyword.clone().unwrap_or_else(|| target.venue_id.clone().unwrap_or_default()),
            field_type_name: target.field_type_keyword.clone().unwrap_or_default(),
            date: date.to_string(),
            start: String::new(),
            end: String::new(),
            status: if result.success { "success".into() } else { "failed".into() },
            message: result.message.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = records.append(&record) {
            tracing::warn!(error = %e, "failed to append booking record");
        }
    }
}

async fn run_autobooking(job_id: &str, ctx: &AppContext, config: serde_json::Value) -> Result<()> {
    let job_config: AutoBookingJobConfig = serde_json::from_value(config)
        .map_err(|e| Error::Config(format!("invalid AutoBookingJobConfig for job {job_id}: {e}")))?;

    let autobooking_ctx = AutoBookingContext {
        upstream: &ctx.config.upstream,
        order_cfg: &ctx.config.order,
        rsa_public_key_pem: ctx.config.codec.rsa_public_key_pem.as_deref(),
        preset_catalogue: &ctx.config.presets.presets,
        return_url: &format!("{}/pc/", ctx.config.upstream.base_url),
        max_order_retries: ctx.config.upstream.order_retries,
        date_offset_days: job_config.date_offset_days,
    };

    run_daily(
        job_config.hour,
        job_config.minute,
        job_config.second,
        DEFAULT_WARMUP_OFFSET_SECS,
        job_id,
        || async { tracing::info!(job_id, "auto-booking: warmup ping") },
        || async {
            match run_autobooking_sweep(job_id, &job_config.targets, &ctx.credentials, &autobooking_ctx).await {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        let record = booking_domain::models::BookingRecord {
                            order_id: if outcome.success { Some(outcome.message.clone()) } else { None },
                            preset: Some(outcome.preset),
                            venue_name: outcome.description.clone().unwrap_or_default(),
                            field_type_name: String::new(),
                            date: Utc::now().format("%Y-%m-%d").to_string(),
                            start: String::new(),
                            end: String::new(),
                            status: if outcome.success { "success".into() } else { "failed".into() },
                            message: outcome.message,
                            created_at: Utc::now(),
                        };
                        if let Err(e) = ctx.records.append(&record) {
                            tracing::warn!(error = %e, "failed to append auto-booking record");
                        }
                    }
                }
                Err(e) => tracing::error!(job_id, error = %e, "auto-booking sweep failed"),
            }
        },
    )
    .await;

    if debug_mode_enabled() {
        let _ = ctx.supervisor.mark_completed(job_id);
    }
    Ok(())
}
