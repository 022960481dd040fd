//! Auto-booking sweep (JobType::AutoBooking, original_source
//! `auto_booking.py::AutoBookingSystem`): once a day, walk a prioritised
//! list of presets and book the first one that has an available slot at
//! one of its preferred hours, using the store's active user.

use chrono::Utc;

use booking_api::resolver::resolve_target;
use booking_api::BookingApi;
use booking_credentials::CredentialStore;
use booking_domain::config::{OrderConfig, UpstreamConfig};
use booking_domain::models::{AutoBookingTarget, BookingTarget, OrderIntent, PresetCatalogue};
use booking_domain::Result;
use booking_http::UserHttpClient;

use crate::attempt::attempt_order_with_retry;

pub struct AutoBookingContext<'a> {
    pub upstream: &'a UpstreamConfig,
    pub order_cfg: &'a OrderConfig,
    pub rsa_public_key_pem: Option<&'a str>,
    pub preset_catalogue: &'a PresetCatalogue,
    pub return_url: &'a str,
    pub max_order_retries: u32,
    pub date_offset_days: i64,
}

#[derive(Debug, Clone)]
pub struct AutoBookingOutcome {
    pub preset: i64,
    pub description: Option<String>,
    pub success: bool,
    pub message: String,
}

/// Processes `targets` in ascending `priority` order, stopping at the
/// first successful booking (the source's default "stop on first
/// success" path; it never re-tries a lower-priority target once one
/// succeeds).
pub async fn run_autobooking_sweep(
    job_id: &str,
    targets: &[AutoBookingTarget],
    store: &CredentialStore,
    ctx: &AutoBookingContext<'_>,
) -> Result<Vec<AutoBookingOutcome>> {
    let (cookie, _expires) = match store.load(None) {
        Some(c) => c,
        None => {
            tracing::warn!(job_id, "auto-booking sweep: no active user credential");
            return Ok(Vec::new());
        }
    };

    let http = UserHttpClient::new(&ctx.upstream.base_url, cookie, ctx.upstream.timeout_secs)?;
    let api = BookingApi::new(http, ctx.upstream.clone(), ctx.order_cfg.clone(), ctx.rsa_public_key_pem.map(str::to_string));

    let date = (Utc::now() + chrono::Duration::days(ctx.date_offset_days)).format("%Y-%m-%d").to_string();

    let mut enabled: Vec<&AutoBookingTarget> = targets.iter().filter(|t| t.enabled).collect();
    enabled.sort_by_key(|t| t.priority);

    let mut outcomes = Vec::new();
    for target in enabled {
        let outcome = book_one(job_id, &api, target, &date, ctx).await;
        let succeeded = outcome.success;
        outcomes.push(outcome);
        if succeeded {
            break;
        }
    }
    Ok(outcomes)
}

async fn book_one(job_id: &str, api: &BookingApi, target: &AutoBookingTarget, date: &str, ctx: &AutoBookingContext<'_>) -> AutoBookingOutcome {
    let preset_target = BookingTarget::default();
    let resolved = match resolve_target(api, &preset_target, ctx.preset_catalogue, Some(target.preset)).await {
        Ok(r) if !r.venue_id.is_empty() && !r.field_type_id.is_empty() => r,
        Ok(_) => {
            return AutoBookingOutcome {
                preset: target.preset,
                description: target.description.clone(),
                success: false,
                message: "预设未配置场馆或场地类型".into(),
            }
        }
        Err(e) => {
            return AutoBookingOutcome {
                preset: target.preset,
                description: target.description.clone(),
                success: false,
                message: format!("解析预设失败: {e}"),
            }
        }
    };

    let slots = match api.query_slots(&resolved.venue_id, &resolved.field_type_id, date, None).await {
        Ok(s) => s,
        Err(e) => {
            return AutoBookingOutcome {
                preset: target.preset,
                description: target.description.clone(),
                success: false,
                message: format!("获取时间段失败: {e}"),
            }
        }
    };

    let candidate = target
        .time_slots
        .iter()
        .find_map(|hour| slots.iter().find(|s| s.available && s.start_hour() == Some(*hour)))
        .or_else(|| slots.iter().find(|s| s.available));

    let Some(candidate) = candidate else {
        return AutoBookingOutcome {
            preset: target.preset,
            description: target.description.clone(),
            success: false,
            message: "没有可用时间段".into(),
        };
    };

    let intent = OrderIntent {
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
    };

    match attempt_order_with_retry(
        api,
        "__default__",
        intent,
        target.max_attempts.max(ctx.max_order_retries),
        ctx.return_url,
        ctx.order_cfg,
    )
    .await
    {
        Ok(order_id) => {
            tracing::info!(job_id, preset = target.preset, order_id = %order_id, "auto-booking succeeded");
            AutoBookingOutcome {
                preset: target.preset,
                description: target.description.clone(),
                success: true,
                message: order_id,
            }
        }
        Err(e) => {
            tracing::warn!(job_id, preset = target.preset, error = %e, "auto-booking attempt failed");
            AutoBookingOutcome {
                preset: target.preset,
                description: target.description.clone(),
                success: false,
                message: e.to_string(),
            }
        }
    }
}
