use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Path set for every upstream endpoint the booking API calls.
///
/// All paths are relative to [`UpstreamConfig::base_url`]. Defaults match
/// the production sports-venue platform; override per-deployment via
/// config file or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSet {
    #[serde(default = "d_current_user")]
    pub current_user: String,
    #[serde(default = "d_list_venues")]
    pub list_venues: String,
    #[serde(default = "d_venue_detail")]
    pub venue_detail: String,
    #[serde(default = "d_field_situation")]
    pub field_situation: String,
    #[serde(default = "d_field_reserve")]
    pub field_reserve: String,
    #[serde(default = "d_order_submit")]
    pub order_submit: String,
    #[serde(default = "d_order_confirm")]
    pub order_confirm: String,
    #[serde(default)]
    pub appointment_overview: Option<String>,
    #[serde(default)]
    pub slot_summary: Option<String>,
    #[serde(default = "d_ping")]
    pub ping: String,
    #[serde(default)]
    pub login_prepare: Option<String>,
    #[serde(default)]
    pub login_submit: Option<String>,
    #[serde(default)]
    pub login_captcha: Option<String>,
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self {
            current_user: d_current_user(),
            list_venues: d_list_venues(),
            venue_detail: d_venue_detail(),
            field_situation: d_field_situation(),
            field_reserve: d_field_reserve(),
            order_submit: d_order_submit(),
            order_confirm: d_order_confirm(),
            appointment_overview: Some("/appointment/disabled/getAppintmentAndSysUserbyUser".into()),
            slot_summary: Some(d_field_reserve()),
            ping: d_ping(),
            login_prepare: None,
            login_submit: None,
            login_captcha: None,
        }
    }
}

fn d_current_user() -> String {
    "/system/user/currentUser".into()
}
fn d_list_venues() -> String {
    "/manage/venue/listOrderCount".into()
}
fn d_venue_detail() -> String {
    "/manage/venue/queryVenueById".into()
}
fn d_field_situation() -> String {
    "/manage/fieldDetail/queryFieldSituation".into()
}
fn d_field_reserve() -> String {
    "/manage/fieldDetail/queryFieldReserveSituationIsFull".into()
}
fn d_order_submit() -> String {
    "/venue/personal/orderImmediatelyPC".into()
}
fn d_order_confirm() -> String {
    "/venue/personal/ConfirmOrder".into()
}
fn d_ping() -> String {
    "/".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream / HTTP client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: EndpointSet,
    /// HTTP request timeout, seconds. Applies to every call through C3.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    /// Max retries for idempotent reads on `Transient` errors.
    #[serde(default = "d_read_retries")]
    pub read_retries: u32,
    /// Max retries for order submission (refreshes `sign` between attempts).
    #[serde(default = "d_order_retries")]
    pub order_retries: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            endpoints: EndpointSet::default(),
            timeout_secs: d_timeout_secs(),
            read_retries: d_read_retries(),
            order_retries: d_order_retries(),
        }
    }
}

fn d_base_url() -> String {
    "https://sports.example.edu.cn".into()
}
fn d_timeout_secs() -> u64 {
    10
}
fn d_read_retries() -> u32 {
    3
}
fn d_order_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(UpstreamConfig::default().timeout_secs, 10);
    }

    #[test]
    fn default_order_retries_is_three() {
        assert_eq!(UpstreamConfig::default().order_retries, 3);
    }

    #[test]
    fn endpoint_set_deserializes_partial_overrides() {
        let toml_str = r#"order_submit = "/custom/order""#;
        let eps: EndpointSet = toml::from_str(toml_str).unwrap();
        assert_eq!(eps.order_submit, "/custom/order");
        assert_eq!(eps.current_user, d_current_user());
    }
}
