//! Monitor Runtime (C8): one cooperative tick of a monitor job, plus the
//! multi-user booking policy it uses to decide who gets booked (§4.8,
//! §4.8.1).

use std::collections::HashSet;

use chrono::{Datelike, Duration, Timelike, Utc};

use booking_api::classify::is_rate_limited;
use booking_api::resolver::{expand_dates, resolve_target};
use booking_api::BookingApi;
use booking_credentials::CredentialStore;
use booking_domain::config::{OrderConfig, UpstreamConfig};
use booking_domain::models::{MonitorState, OrderIntent, PresetCatalogue, Slot, UserBookingResult};
use booking_domain::trace::TraceEvent;
use booking_domain::{Error, Result};
use booking_http::UserHttpClient;
use booking_notifier::{MonitorNotification, MonitorSlotLine, Notifier};

use crate::attempt::attempt_order_with_retry;

/// Everything a monitor tick needs that does not change between ticks.
pub struct MonitorContext<'a> {
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

/// A slot paired with the concrete date it was queried for, so an order
/// can be submitted against the right day even when the target expands
/// into several candidate dates.
#[derive(Clone)]
struct DatedSlot {
    date: String,
    slot: Slot,
}

/// Runs one tick of a monitor job: operating-window gate, slot
/// resolution, notification, and (if `auto_book`) the booking policy.
/// Persistence of the mutated `state` is the caller's responsibility.
pub async fn run_monitor_tick(
    job_id: &str,
    state: &mut MonitorState,
    store: &CredentialStore,
    ctx: &MonitorContext<'_>,
    notifier: &Notifier,
) -> Result<()> {
    let now = Utc::now();

    if let Some((start_hour, end_hour)) = state.operating_window {
        if !hour_in_window(now.hour(), start_hour, end_hour) {
            state.window_active = false;
            state.next_window_start = Some(next_window_start(now, start_hour));
            state.last_check = Some(now);
            return Ok(());
        }
        if !state.window_active {
            // Freshly entered the window: restart de-duplication.
            state.found_slots.clear();
        }
    }
    state.window_active = true;
    state.last_check = Some(now);

    let eligible = build_eligible_users(store, &state.target.target_users, &state.target.exclude_users, ctx)?;
    if eligible.is_empty() {
        tracing::warn!(job_id, "monitor tick: no eligible users with a live session");
        return Ok(());
    }

    let dates = expand_dates(&state.target, now);
    let mut per_user_slots: Vec<(&EligibleUser, Vec<DatedSlot>)> = Vec::with_capacity(eligible.len());
    let mut union_slots: Vec<DatedSlot> = Vec::new();

    for user in &eligible {
        let resolved = resolve_target(&user.api, &state.target, ctx.preset_catalogue, ctx.preset_index).await?;
        let candidate_dates = query_dates(&dates, &user.api, &resolved).await;
        let candidate_dates = filter_dates_by_preferred_days(candidate_dates, &state.preferred_days);
        let mut slots = Vec::new();
        for date in candidate_dates {
            match user.api.query_slots(&resolved.venue_id, &resolved.field_type_id, &date, None).await {
                Ok(found) => slots.extend(
                    filter_by_start_hour_list(found, &state.preferred_hours)
                        .into_iter()
                        .filter(|s| s.available)
                        .map(|slot| DatedSlot {
                            date: date.clone(),
                            slot,
                        }),
                ),
                Err(e) => {
                    tracing::warn!(job_id, user = %user.key, date, error = %e, "monitor: slot query failed");
                }
            }
        }
        for dated in &slots {
            if !union_slots
                .iter()
                .any(|s| s.date == dated.date && s.slot.slot_id == dated.slot.slot_id)
            {
                union_slots.push(dated.clone());
            }
        }
        per_user_slots.push((user, slots));
    }

    TraceEvent::MonitorTick {
        job_id: job_id.to_string(),
        slots_found: union_slots.len(),
        auto_book_triggered: state.auto_book && !union_slots.is_empty(),
    }
    .emit();

    let fresh: Vec<Slot> = union_slots
        .iter()
        .filter(|s| !state.found_slots.iter().any(|seen| seen.slot_id == s.slot.slot_id))
        .map(|s| s.slot.clone())
        .collect();
    if !fresh.is_empty() {
        notify_found_slots(notifier, state, &fresh).await;
        state.found_slots.extend(fresh);
    }

    if state.auto_book && !union_slots.is_empty() {
        state.booking_attempts += 1;
        let results = if state.require_all_users_success {
            book_all_or_nothing(job_id, &per_user_slots, state, ctx).await
        } else {
            book_independently(job_id, &per_user_slots, state, ctx).await
        };
        if !results.is_empty() && results.iter().any(|r| r.success) {
            state.successful_bookings += 1;
        }
    }

    Ok(())
}

fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

fn next_window_start(now: chrono::DateTime<Utc>, start_hour: u32) -> chrono::DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(start_hour, 0, 0)
        .expect("start_hour must be a valid hour");
    let today_utc = chrono::TimeZone::from_utc_datetime(&Utc, &today);
    if today_utc > now {
        today_utc
    } else {
        chrono::TimeZone::from_utc_datetime(&Utc, &(today + Duration::days(1)))
    }
}

async fn query_dates(dates: &[String], api: &BookingApi, resolved: &booking_api::ResolvedTarget) -> Vec<String> {
    if !dates.is_empty() {
        return dates.to_vec();
    }
    // `use_all_dates`: fall back to server-supplied dates (§4.7 step 4).
    api.list_available_dates(&resolved.venue_id, &resolved.field_type_id)
        .await
        .into_iter()
        .map(|(date, _token)| date)
        .collect()
}

/// Keeps only dates whose weekday (`0`=Monday..`6`=Sunday) is in
/// `preferred_days`; a malformed date string is dropped rather than kept.
fn filter_dates_by_preferred_days(dates: Vec<String>, preferred_days: &[u32]) -> Vec<String> {
    if preferred_days.is_empty() {
        return dates;
    }
    let allowed: HashSet<u32> = preferred_days.iter().copied().collect();
    dates
        .into_iter()
        .filter(|d| {
            chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map(|parsed| allowed.contains(&parsed.weekday().num_days_from_monday()))
                .unwrap_or(false)
        })
        .collect()
}

fn filter_by_start_hour_list(slots: Vec<Slot>, preferred_hours: &[u32]) -> Vec<Slot> {
    if preferred_hours.is_empty() {
        return slots;
    }
    let allowed: HashSet<u32> = preferred_hours.iter().copied().collect();
    slots
        .into_iter()
        .filter(|s| s.start_hour().map(|h| allowed.contains(&h)).unwrap_or(false))
        .collect()
}

fn build_eligible_users(
    store: &CredentialStore,
    target_users: &[String],
    exclude_users: &[String],
    ctx: &MonitorContext<'_>,
) -> Result<Vec<EligibleUser>> {
    let (records, _active) = store.load_all();
    let targets: HashSet<&str> = target_users.iter().map(|s| s.as_str()).collect();
    let excluded: HashSet<&str> = exclude_users.iter().map(|s| s.as_str()).collect();

    let mut eligible = Vec::new();
    for (key, record) in records {
        if excluded.contains(key.as_str()) {
            continue;
        }
        if !targets.is_empty() && !targets.contains(key.as_str()) {
            continue;
        }
        if Utc::now() >= record.expires_at {
            continue;
        }
        let http = UserHttpClient::new(&ctx.upstream.base_url, record.cookie.clone(), ctx.upstream.timeout_secs)?;
        let api = BookingApi::new(
            http,
            ctx.upstream.clone(),
            ctx.order_cfg.clone(),
            ctx.rsa_public_key_pem.map(str::to_string),
        );
        eligible.push(EligibleUser {
            nickname: record.nickname.clone().unwrap_or_else(|| key.clone()),
            key,
            api,
        });
    }
    Ok(eligible)
}

async fn notify_found_slots(notifier: &Notifier, state: &MonitorState, slots: &[Slot]) {
    let lines: Vec<MonitorSlotLine> = slots
        .iter()
        .map(|s| MonitorSlotLine {
            date: String::new(),
            start: s.start.clone(),
            end: s.end.clone(),
            field_name: s.field_name.clone().or_else(|| s.area_name.clone()),
            area_name: s.area_name.clone(),
            remain: s.remain,
            price: s.price,
        })
        .collect();

    let notification = MonitorNotification {
        monitor_id: String::new(),
        venue_name: state.target.venue_keyword.clone(),
        field_type_name: state.target.field_type_keyword.clone(),
        slots: lines,
        auto_book: state.auto_book,
        preferred_hours: state.preferred_hours.clone(),
        preferred_days: state.preferred_days.clone(),
        booking_users: Vec::new(),
        excluded_users: state.target.exclude_users.clone(),
    };
    notifier.send_monitor_notification(&notification).await;
}

fn slot_to_intent(slot: &Slot, target: &booking_domain::models::BookingTarget, date: &str) -> Option<OrderIntent> {
    Some(OrderIntent {
        venue_id: target.venue_id.clone()?,
        field_type_id: target.field_type_id.clone()?,
        slot_id: slot.slot_id.clone(),
        date: date.to_string(),
        start: slot.start.clone(),
        end: slot.end.clone(),
        price: slot.price,
        sign: slot.sign.clone()?,
        sub_site_id: slot.sub_site_id.clone(),
        field_name: slot.field_name.clone(),
        order_id: None,
        payload: serde_json::json!({}),
    })
}

/// §4.8.1, `require_all_users_success=false`: each user books the first
/// candidate slot independently; one success is enough for the monitor,
/// but every user is still attempted so partial failures are reported.
async fn book_independently(
    job_id: &str,
    per_user_slots: &[(&EligibleUser, Vec<DatedSlot>)],
    state: &MonitorState,
    ctx: &MonitorContext<'_>,
) -> Vec<UserBookingResult> {
    let mut results = Vec::new();
    for (user, slots) in per_user_slots {
        let Some(dated) = slots.first() else { continue };
        let Some(intent) = slot_to_intent(&dated.slot, &state.target, &dated.date) else {
            continue;
        };
        let result = attempt_for_user(job_id, user, intent, ctx).await;
        if is_rate_limited_result(&result, ctx.order_cfg) {
            // §4.8.1 round-robin failover: the offending user gets no
            // further attempts this tick; the loop simply carries on to
            // the next eligible user.
            tracing::info!(job_id, user = %user.key, "monitor: rate limited, switching to next eligible user");
        }
        results.push(result);
    }
    results
}

fn is_rate_limited_result(result: &UserBookingResult, order_cfg: &OrderConfig) -> bool {
    !result.success
        && result
            .error
            .as_deref()
            .map(|e| is_rate_limited(e, order_cfg))
            .unwrap_or(false)
}

/// §4.8.1, `require_all_users_success=true`: searches for an assignment
/// of one slot per eligible user whose pairwise start-hour spread is
/// within `max_time_gap_hours`, and only then submits orders.
async fn book_all_or_nothing(
    job_id: &str,
    per_user_slots: &[(&EligibleUser, Vec<DatedSlot>)],
    state: &MonitorState,
    ctx: &MonitorContext<'_>,
) -> Vec<UserBookingResult> {
    let candidates: Vec<(&EligibleUser, &Vec<DatedSlot>)> =
        per_user_slots.iter().map(|(u, s)| (*u, s)).collect();
    let Some(assignment) = find_group_assignment(&candidates, state.max_time_gap_hours) else {
        tracing::info!(job_id, "monitor: no slot assignment within max_time_gap_hours yet, keeping watch");
        return Vec::new();
    };

    let mut results = Vec::new();
    for (user, dated) in assignment {
        let Some(intent) = slot_to_intent(&dated.slot, &state.target, &dated.date) else {
            continue;
        };
        let result = attempt_for_user(job_id, user, intent, ctx).await;
        if is_rate_limited_result(&result, ctx.order_cfg) {
            tracing::info!(job_id, user = %user.key, "monitor: rate limited, switching to next eligible user");
        }
        results.push(result);
    }
    results
}

async fn attempt_for_user(
    job_id: &str,
    user: &EligibleUser,
    intent: OrderIntent,
    ctx: &MonitorContext<'_>,
) -> UserBookingResult {
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
            tracing::info!(job_id, user = %user.key, order_id, "monitor: booking succeeded");
            UserBookingResult {
                nickname: user.nickname.clone(),
                success: true,
                message: "预订成功".into(),
                order_id: Some(order_id),
                error: None,
            }
        }
        Err(e @ Error::RateLimited { .. }) => {
            // §4.8.1: the offending user is parked for the remainder of
            // this tick (no further attempt is made for them here) and
            // the monitor moves on to the next eligible user.
            tracing::warn!(job_id, user = %user.key, error = %e, "monitor: user rate limited, parking for remainder of tick");
            UserBookingResult {
                nickname: user.nickname.clone(),
                success: false,
                message: "预订失败：触发频率限制，已切换下一个用户".into(),
                order_id: None,
                error: Some(e.to_string()),
            }
        }
        Err(e) => {
            tracing::warn!(job_id, user = %user.key, error = %e, "monitor: booking failed");
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

/// Backtracking search over each user's candidate slot list for an
/// assignment whose pairwise start-hour spread is within `max_gap_hours`
/// (§9 resolution 3). Candidate lists are small in practice (a handful
/// of slots per user per tick), so exhaustive search with min/max
/// pruning is cheap.
fn find_group_assignment<'a>(
    per_user: &[(&'a EligibleUser, &'a Vec<DatedSlot>)],
    max_gap_hours: u32,
) -> Option<Vec<(&'a EligibleUser, DatedSlot)>> {
    fn recurse<'a>(
        per_user: &[(&'a EligibleUser, &'a Vec<DatedSlot>)],
        idx: usize,
        max_gap_hours: u32,
        chosen: &mut Vec<(&'a EligibleUser, DatedSlot)>,
        current_min: Option<u32>,
        current_max: Option<u32>,
    ) -> Option<Vec<(&'a EligibleUser, DatedSlot)>> {
        if idx == per_user.len() {
            return Some(chosen.clone());
        }
        let (user, slots) = per_user[idx];
        for dated in slots.iter() {
            let Some(hour) = dated.slot.start_hour() else { continue };
            let new_min = current_min.map(|m| m.min(hour)).unwrap_or(hour);
            let new_max = current_max.map(|m| m.max(hour)).unwrap_or(hour);
            if new_max - new_min > max_gap_hours {
                continue;
            }
            chosen.push((user, dated.clone()));
            if let Some(found) = recurse(per_user, idx + 1, max_gap_hours, chosen, Some(new_min), Some(new_max)) {
                return Some(found);
            }
            chosen.pop();
        }
        None
    }

    if per_user.iter().any(|(_, slots)| slots.is_empty()) {
        return None;
    }
    recurse(per_user, 0, max_gap_hours, &mut Vec::new(), None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, start: &str) -> Slot {
        Slot {
            slot_id: id.into(),
            start: start.into(),
            end: start.into(),
            price: None,
            remain: None,
            capacity: None,
            available: true,
            field_name: None,
            area_name: None,
            sub_site_id: None,
            sign: Some("sign".into()),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn hour_in_window_handles_same_day_range() {
        assert!(hour_in_window(19, 18, 22));
        assert!(!hour_in_window(23, 18, 22));
    }

    #[test]
    fn hour_in_window_handles_overnight_range() {
        assert!(hour_in_window(23, 22, 6));
        assert!(hour_in_window(2, 22, 6));
        assert!(!hour_in_window(12, 22, 6));
    }

    #[test]
    fn filter_by_start_hour_list_passes_through_when_empty() {
        let slots = vec![slot("a", "18:00")];
        assert_eq!(filter_by_start_hour_list(slots.clone(), &[]).len(), 1);
    }

    #[test]
    fn filter_by_start_hour_list_keeps_only_preferred_hours() {
        let slots = vec![slot("a", "18:00"), slot("b", "20:00")];
        let kept = filter_by_start_hour_list(slots, &[20]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].slot_id, "b");
    }

    #[test]
    fn filter_dates_by_preferred_days_keeps_matching_weekday() {
        // 2026-07-28 is a Tuesday (num_days_from_monday = 1).
        let dates = vec!["2026-07-28".to_string(), "2026-07-29".to_string()];
        let kept = filter_dates_by_preferred_days(dates, &[1]);
        assert_eq!(kept, vec!["2026-07-28".to_string()]);
    }

    #[test]
    fn is_rate_limited_result_detects_rate_limit_keyword_in_error() {
        let cfg = OrderConfig::default();
        let result = UserBookingResult {
            nickname: "alice".into(),
            success: false,
            message: "预订失败".into(),
            order_id: None,
            error: Some("rate limited: 请求过于频繁".into()),
        };
        assert!(is_rate_limited_result(&result, &cfg));
    }

    #[test]
    fn is_rate_limited_result_false_for_ordinary_failure() {
        let cfg = OrderConfig::default();
        let result = UserBookingResult {
            nickname: "alice".into(),
            success: false,
            message: "预订失败".into(),
            order_id: None,
            error: Some("business error 0: 场地已满".into()),
        };
        assert!(!is_rate_limited_result(&result, &cfg));
    }

    #[test]
    fn is_rate_limited_result_false_for_success() {
        let cfg = OrderConfig::default();
        let result = UserBookingResult {
            nickname: "alice".into(),
            success: true,
            message: "预订成功".into(),
            order_id: Some("ORD1".into()),
            error: None,
        };
        assert!(!is_rate_limited_result(&result, &cfg));
    }

    #[test]
    fn find_group_assignment_with_no_users_is_vacuously_satisfied() {
        let assignment = find_group_assignment(&[], 1);
        assert!(assignment.is_some());
        assert!(assignment.unwrap().is_empty());
    }
}
