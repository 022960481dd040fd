use serde::Serialize;

/// Structured trace events emitted across the booking agent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LoginStateChanged {
        user: String,
        from: String,
        to: String,
    },
    CaptchaSolved {
        user: String,
        confidence: f64,
        accepted: bool,
        attempt: u32,
    },
    KeepAliveCycle {
        user: String,
        success: bool,
        renewed_expiry: Option<String>,
    },
    MonitorTick {
        job_id: String,
        slots_found: usize,
        auto_book_triggered: bool,
    },
    ScheduleFired {
        job_id: String,
        scheduled_for: String,
        warmup_offset_seconds: i64,
    },
    OrderAttempted {
        user: String,
        venue_id: String,
        slot_id: String,
        attempt: u32,
    },
    OrderResult {
        user: String,
        venue_id: String,
        slot_id: String,
        success: bool,
        message: String,
        duration_ms: u64,
    },
    JobStateChanged {
        job_id: String,
        job_type: String,
        from: String,
        to: String,
    },
    NotificationSent {
        channel: String,
        target: String,
        success: bool,
        attempt: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "booking_event");
    }
}
