//! Shared order-submission-with-sign-refresh-retry helper (§4.4.1),
//! used by both the Monitor Runtime and the Cron Runtime so the retry
//! policy lives in exactly one place.

use booking_api::classify::is_rate_limited;
use booking_api::BookingApi;
use booking_domain::config::OrderConfig;
use booking_domain::models::{OrderIntent, Slot};
use booking_domain::trace::TraceEvent;
use booking_domain::{Error, Result};

/// Attempts to submit `intent` up to `max_retries` times. Between
/// attempts the slot is re-queried for a fresh `sign`; if the refresh
/// itself fails, the previous `sign` is retried unchanged.
///
/// A rate-limited failure (§4.8.1: messages containing "请求过于频繁",
/// "频率", or "500") is never retried against the same user — it is
/// returned immediately as `Error::RateLimited` so the caller can fail
/// over to the next eligible user instead of burning retries against a
/// user that is already being throttled.
pub async fn attempt_order_with_retry(
    api: &BookingApi,
    user: &str,
    mut intent: OrderIntent,
    max_retries: u32,
    return_url: &str,
    order_cfg: &OrderConfig,
) -> Result<String> {
    let venue_id = intent.venue_id.clone();
    let mut last_err = Error::Other("no attempts made".into());

    for attempt in 1..=max_retries.max(1) {
        TraceEvent::OrderAttempted {
            user: user.to_string(),
            venue_id: venue_id.clone(),
            slot_id: intent.slot_id.clone(),
            attempt,
        }
        .emit();

        let started = std::time::Instant::now();
        match api.order_immediately(&intent, return_url).await {
            Ok(order_id) => {
                TraceEvent::OrderResult {
                    user: user.to_string(),
                    venue_id: venue_id.clone(),
                    slot_id: intent.slot_id.clone(),
                    success: true,
                    message: order_id.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();
                return Ok(order_id);
            }
            Err(e) => {
                TraceEvent::OrderResult {
                    user: user.to_string(),
                    venue_id: venue_id.clone(),
                    slot_id: intent.slot_id.clone(),
                    success: false,
                    message: e.to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();

                if matches!(e, Error::RateLimited { .. }) || is_rate_limited(&e.to_string(), order_cfg) {
                    return Err(Error::RateLimited { message: e.to_string() });
                }

                if attempt == max_retries.max(1) {
                    last_err = e;
                    break;
                }

                if let Ok(slots) = api
                    .query_slots(&intent.venue_id, &intent.field_type_id, &intent.date, None)
                    .await
                {
                    if let Some(refreshed) = find_matching_slot(&slots, &intent) {
                        if let Some(sign) = &refreshed.sign {
                            intent.sign = sign.clone();
                        }
                    }
                }

                last_err = e;
            }
        }
    }

    Err(Error::BusinessError {
        code: "order_retries_exhausted".into(),
        message: format!("下单失败，已重试{}次: {last_err}", max_retries.max(1)),
    })
}

/// Finds the slot in a fresh query that matches the one the intent was
/// built from, so its `sign` can replace a stale one.
fn find_matching_slot<'a>(slots: &'a [Slot], intent: &OrderIntent) -> Option<&'a Slot> {
    slots
        .iter()
        .find(|s| s.slot_id == intent.slot_id)
        .or_else(|| slots.iter().find(|s| s.start == intent.start && s.end == intent.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_domain::models::Slot;

    fn slot(id: &str, start: &str, end: &str, sign: &str) -> Slot {
        Slot {
            slot_id: id.into(),
            start: start.into(),
            end: end.into(),
            price: None,
            remain: None,
            capacity: None,
            available: true,
            field_name: None,
            area_name: None,
            sub_site_id: None,
            sign: Some(sign.into()),
            raw: serde_json::json!({}),
        }
    }

    fn intent(slot_id: &str, start: &str, end: &str) -> OrderIntent {
        OrderIntent {
            venue_id: "v1".into(),
            field_type_id: "f1".into(),
            slot_id: slot_id.into(),
            date: "2026-07-29".into(),
            start: start.into(),
            end: end.into(),
            price: None,
            sign: "stale".into(),
            sub_site_id: None,
            field_name: None,
            order_id: None,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn find_matching_slot_prefers_slot_id() {
        let slots = vec![slot("a", "18:00", "19:00", "sign-a"), slot("b", "19:00", "20:00", "sign-b")];
        let target = intent("b", "19:00", "20:00");
        let found = find_matching_slot(&slots, &target).unwrap();
        assert_eq!(found.sign.as_deref(), Some("sign-b"));
    }

    #[test]
    fn find_matching_slot_falls_back_to_time_window() {
        let slots = vec![slot("new-id", "18:00", "19:00", "sign-fresh")];
        let target = intent("old-id", "18:00", "19:00");
        let found = find_matching_slot(&slots, &target).unwrap();
        assert_eq!(found.sign.as_deref(), Some("sign-fresh"));
    }
}
