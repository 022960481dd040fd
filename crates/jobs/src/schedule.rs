//! Scheduled daily booking (JobType::Schedule, §4.9 Cron Runtime applied
//! to a single target template): fires once a day at a fixed wall-clock
//! time (optionally expanded across several `start_hours`) and attempts
//! to book the target immediately, using the same multi-user policy as
//! the Monitor Runtime (§4.8.1).

use chrono::Utc;

use booking_api::resolver::{expand_dates, resolve_target};
use booking_api::BookingApi;
use booking_credentials::CredentialStore;
use booking_domain::config::{OrderConfig, UpstreamConfig};
use booking_domain::models::{BookingTarget, OrderIntent, PresetCatalogue, ScheduleState, UserBookingResult};
use booking_domain::Result;
use booking_http::UserHttpClient;
use booking_notifier::{Notifier, OrderNotification};

use crate::attempt::attempt_order_with_retry;

pub struct ScheduleContext<'a> {
    pub upstream: &'a UpstreamConfig,
    pub order_cfg: &'a OrderConfig,
    pub rsa_public_key_pem: Option<&'a str>,
    pub preset_catalogue: &'a PresetCatalogue,
    pub preset_index: Option<i64>,
    pub return_url: &'a str,
    pub max_order_retries: u32,
}

struct EligibleUser {
    key: String,
    nickname: String,
    api: BookingApi,
}

/// One firing of a scheduled booking job: for every `start_hour` in
/// `state.start_hours`, resolve the target for `today + date_offset`
/// and attempt to book the first (or best, under all-users-success) slot
/// at that hour for every eligible user.
pub async fn run_schedule_fire(
    job_id: &str,
    state: &mut ScheduleState,
    store: &CredentialStore,
    ctx: &ScheduleContext<'_>,
    notifier: &Notifier,
) -> Result<Vec<UserBookingResult>> {
    let users = build_eligible_users(store, &state.target, ctx)?;
    if users.is_empty() {
        tracing::warn!(job_id, "scheduled fire: no eligible users");
        return Ok(Vec::new());
    }

    let date = expand_dates_for_schedule(state);

    let mut per_user: Vec<(&EligibleUser, Option<OrderIntent>)> = Vec::new();
    for user in &users {
        let intent = resolve_best_intent(user, &state.target, &date, &state.start_hours, ctx).await;
        per_user.push((user, intent));
    }

    let results = if state.require_all_users_success {
        book_all_or_nothing(job_id, &per_user, state, ctx).await
    } else {
        book_independently(job_id, &per_user, ctx).await
    };

    state.last_run = Some(Utc::now());
    state.run_count += 1;
    state.success_count += results.iter().filter(|r| r.success).count() as u64;

    for result in &results {
        notifier
            .send_order_notification(&OrderNotification {
                order_id: result.order_id.clone(),
                user_nickname: result.nickname.clone(),
                venue_name: state
                    .target
                    .venue_keyword
                    .clone()
                    .unwrap_or_else(|| state.target.venue_id.clone().unwrap_or_default()),
                field_type_name: state.target.field_type_keyword.clone().unwrap_or_default(),
                date: date.clone(),
                start_time: format!("{:02}:00", state.start_hours.first().copied().unwrap_or(state.hour)),
                end_time: String::new(),
                success: result.success,
                message: result.message.clone(),
            })
            .await;
    }

    Ok(results)
}

fn expand_dates_for_schedule(state: &ScheduleState) -> String {
    let mut target = state.target.clone();
    target.date_offset = Some(booking_domain::models::DateOffset::Single(state.date_offset));
    expand_dates(&target, Utc::now()).into_iter().next().unwrap_or_else(|| {
        (Utc::now() + chrono::Duration::days(state.date_offset))
            .format("%Y-%m-%d")
            .to_string()
    })
}

async fn resolve_best_intent(
    user: &EligibleUser,
    target: &BookingTarget,
    date: &str,
    start_hours: &[u32],
    ctx: &ScheduleContext<'_>,
) -> Option<OrderIntent> {
    let resolved = resolve_target(&user.api, target, ctx.preset_catalogue, ctx.preset_index).await.ok()?;
    if resolved.venue_id.is_empty() || resolved.field_type_id.is_empty() {
        return None;
    }
    let slots = user.api.query_slots(&resolved.venue_id, &resolved.field_type_id, date, None).await.ok()?;
    let candidate = start_hours
        .iter()
        .find_map(|hour| slots.iter().find(|s| s.available && s.start_hour() == Some(*hour)))
        .or_else(|| slots.iter().find(|s| s.available))?;

    Some(OrderIntent {
        venue_id: resolved.venue_id,
        field_type_id: resolved.field_type_id,
        slot_id: candidate.slot_id.clone(),
        date: date.to_string(),
        start: candidate.start.clone(),
        end: candidate.end.clone(),
        price: candidate.price,
        sign: candidate.sign.clone().unwrap_or_default(),
        sub_site_id: candidate.sub_site_id.clone(),
        field_name: candidate.field_name.clone(),
        order_id: None,
        payload: serde_json::json!({}),
    })
}

async fn book_independently(job_id: &str, per_user: &[(&EligibleUser, Option<OrderIntent>)], ctx: &ScheduleContext<'_>) -> Vec<UserBookingResult> {
    let mut results = Vec::new();
    for (user, intent) in per_user {
        let Some(intent) = intent.clone() else {
            results.push(UserBookingResult {
                nickname: user.nickname.clone(),
                success: false,
                message: "未找到可预订的时间段".into(),
                order_id: None,
                error: Some("no_candidate_slot".into()),
            });
            continue;
        };
        results.push(attempt_for_user(job_id, user, intent, ctx).await);
    }
    results
}

async fn book_all_or_nothing(job_id: &str, per_user: &[(&EligibleUser, Option<OrderIntent>)], state: &ScheduleState, ctx: &ScheduleContext<'_>) -> Vec<UserBookingResult> {
    if per_user.iter().any(|(_, intent)| intent.is_none()) {
        tracing::info!(job_id, "scheduled fire: not every user has a candidate slot, skipping (require_all_users_success)");
        return Vec::new();
    }

    let hours: Vec<u32> = per_user.iter().filter_map(|(_, i)| i.as_ref().and_then(|i| i.start.split(':').next()?.parse().ok())).collect();
    if let (Some(min), Some(max)) = (hours.iter().min(), hours.iter().max()) {
        if max - min > state.max_time_gap_hours {
            tracing::info!(job_id, spread = max - min, "scheduled fire: candidate slots exceed max_time_gap_hours, skipping");
            return Vec::new();
        }
    }

    let mut results = Vec::new();
    for (user, intent) in per_user {
        results.push(attempt_for_user(job_id, user, intent.clone().expect("checked above"), ctx).await);
    }
    results
}

async fn attempt_for_user(job_id: &str, user: &EligibleUser, intent: OrderIntent, ctx: &ScheduleContext<'_>) -> UserBookingResult {
    match attempt_order_with_retry(
        &user.api,
        &user.key,
        intent,
        ctx.max_order_retries,
        ctx.return_url,
        ctx.order_cfg,
    )
    .await
    {
        Ok(order_id) => {
            tracing::info!(job_id, user = %user.key, order_id = %order_id, "scheduled booking succeeded");
            UserBookingResult {
                nickname: user.nickname.clone(),
                success: true,
                message: "预订成功".into(),
                order_id: Some(order_id),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(job_id, user = %user.key, error = %e, "scheduled booking failed");
            UserBookingResult {
                nickname: user.nickname.clone(),
                success: false,
                message: "预订失败".into(),
                order_id: None,
                error: Some(e.to_string()),
            }
        }
    }
}

fn build_eligible_users(store: &CredentialStore, target: &BookingTarget, ctx: &ScheduleContext<'_>) -> Result<Vec<EligibleUser>> {
    let (records, _active) = store.load_all();
    let mut users = Vec::new();

    for (key, record) in records {
        if target.exclude_users.contains(&key) {
            continue;
        }
        if !target.target_users.is_empty() && !target.target_users.contains(&key) {
            continue;
        }
        if Utc::now() >= record.expires_at {
            continue;
        }

        let http = UserHttpClient::new(&ctx.upstream.base_url, record.cookie.clone(), ctx.upstream.timeout_secs)?;
        let api = BookingApi::new(http, ctx.upstream.clone(), ctx.order_cfg.clone(), ctx.rsa_public_key_pem.map(str::to_string));
        users.push(EligibleUser {
            nickname: record.nickname.clone().unwrap_or_else(|| key.clone()),
            key,
            api,
        });
    }

    Ok(users)
}

