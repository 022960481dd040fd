//! Keep-Alive Loop (C6): periodically refreshes every stored cookie's
//! TTL by probing the "current user" endpoint.

use chrono::{Duration, Utc};

use booking_credentials::CredentialStore;
use booking_domain::config::UpstreamConfig;
use booking_domain::trace::TraceEvent;
use booking_http::UserHttpClient;

const RENEWED_TTL_HOURS: i64 = 1;

/// Runs one keep-alive cycle over every stored cookie (§4.6). Never
/// returns an error: individual failures are logged and the cycle moves
/// on to the next user, matching the monitor/keep-alive error-recovery
/// rule in spec.md §7.
pub async fn run_keep_alive_cycle(store: &CredentialStore, upstream: &UpstreamConfig) {
    let (records, _active) = store.load_all();

    for (key, record) in records {
        let client = match UserHttpClient::new(&upstream.base_url, record.cookie.clone(), upstream.timeout_secs) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(user = %key, error = %e, "keep-alive: failed to build http client");
                continue;
            }
        };

        match client.get_json(&upstream.endpoints.current_user, &[200, 301, 302, 303]).await {
            Ok(_) => {
                let renewed = Utc::now() + Duration::hours(RENEWED_TTL_HOURS);
                if let Err(e) = store.save(
                    record.cookie.clone(),
                    Some(renewed),
                    record.username.clone(),
                    record.nickname.clone(),
                ) {
                    tracing::warn!(user = %key, error = %e, "keep-alive: failed to persist renewed ttl");
                }
                TraceEvent::KeepAliveCycle {
                    user: key.clone(),
                    success: true,
                    renewed_expiry: Some(renewed.to_rfc3339()),
                }
                .emit();
                tracing::info!(user = %key, "keep-alive: session refreshed");
            }
            Err(booking_domain::Error::UpstreamError { status: 401, .. }) => {
                TraceEvent::KeepAliveCycle {
                    user: key.clone(),
                    success: false,
                    renewed_expiry: None,
                }
                .emit();
                tracing::warn!(user = %key, "keep-alive: session expired, needs re-authentication");
            }
            Err(e) => {
                TraceEvent::KeepAliveCycle {
                    user: key.clone(),
                    success: false,
                    renewed_expiry: None,
                }
                .emit();
                tracing::warn!(user = %key, error = %e, "keep-alive: transient failure, ttl left untouched");
            }
        }
    }
}
