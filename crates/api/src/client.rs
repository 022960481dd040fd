//! Booking API (C4): typed wrappers over the upstream endpoints.

use serde_json::{json, Value};

use booking_codec::{build_envelope, decode_sign_window};
use booking_domain::config::{OrderConfig, UpstreamConfig};
use booking_domain::models::{OrderIntent, Slot};
use booking_domain::{Error, Result};
use booking_http::UserHttpClient;

use crate::classify::classify_order_response;
use crate::models::{FieldType, Venue};
use crate::parsing::{coerce_bool, extract_first_list, first_str, maybe_parse_json};

pub struct BookingApi {
    http: UserHttpClient,
    upstream: UpstreamConfig,
    order_cfg: OrderConfig,
    rsa_public_key_pem: Option<String>,
}

impl BookingApi {
    pub fn new(
        http: UserHttpClient,
        upstream: UpstreamConfig,
        order_cfg: OrderConfig,
        rsa_public_key_pem: Option<String>,
    ) -> Self {
        Self {
            http,
            upstream,
            order_cfg,
            rsa_public_key_pem,
        }
    }

    /// GET `/system/user/currentUser`; absence of recognisable user
    /// fields is treated as unauthenticated (§4.4 `CheckLogin`).
    pub async fn check_login(&self) -> Result<bool> {
        let body = self
            .http
            .get_json(&self.upstream.endpoints.current_user, &[200])
            .await?;
        let recognisable = body.is_object()
            && ["id", "userId", "username", "userName", "nickname"]
                .iter()
                .any(|k| body.get(*k).is_some());
        Ok(recognisable)
    }

    pub async fn list_venues(&self, keyword: Option<&str>, page: u32, size: u32) -> Result<Vec<Venue>> {
        let mut form = vec![
            ("pageSize".to_string(), size.to_string()),
            ("pageNum".to_string(), page.to_string()),
            ("flag".to_string(), "0".to_string()),
        ];
        if let Some(kw) = keyword {
            form.push(("venueName".to_string(), kw.to_string()));
        }
        let body = self
            .http
            .post_form(&self.upstream.endpoints.list_venues, &form, &[200])
            .await?;
        let items = extract_first_list(&body).unwrap_or_default();

        Ok(items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let id = first_str(obj, &["id", "venueId", "uuid", "bizId"])?;
                let name = first_str(obj, &["venueName", "name", "title"])?;
                Some(Venue {
                    id,
                    name,
                    address: first_str(obj, &["address", "addr"]),
                    phone: first_str(obj, &["phone", "tel"]),
                    raw: item.clone(),
                })
            })
            .collect())
    }

    pub async fn venue_detail(&self, venue_id: &str) -> Result<Value> {
        let body = self
            .http
            .post_form(
                &self.upstream.endpoints.venue_detail,
                &[("id", venue_id)],
                &[200],
            )
            .await?;
        Ok(body.get("data").cloned().unwrap_or(body))
    }

    pub fn list_field_types(&self, venue_detail: &Value) -> Vec<FieldType> {
        let candidates = ["fieldTypeList", "fieldTypes", "bizFieldTypeList", "data", "motionTypes"]
            .iter()
            .find_map(|key| venue_detail.get(*key).and_then(|v| v.as_array()))
            .cloned()
            .unwrap_or_default();

        candidates
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let id = first_str(obj, &["id", "fieldTypeId", "code", "motionId"])?;
                let name = first_str(obj, &["fieldTypeName", "name", "title", "motionName"])?;
                Some(FieldType {
                    id,
                    name,
                    category: first_str(obj, &["category", "motionCode", "bizType"]),
                    raw: item.clone(),
                })
            })
            .collect()
    }

    /// Returns `(date_string, date_token)` pairs; a missing endpoint
    /// yields an empty list rather than an error (§4.4 `ListAvailableDates`).
    pub async fn list_available_dates(&self, venue_id: &str, field_type_id: &str) -> Vec<(String, String)> {
        let path = match &self.upstream.endpoints.slot_summary {
            Some(p) if p != &self.upstream.endpoints.field_situation => p.clone(),
            _ => return Vec::new(),
        };
        let body = json!({"venueId": venue_id, "fieldType": field_type_id});
        let resp = match self.http.post_json(&path, &body, &[200]).await {
            Ok(r) => maybe_parse_json(&r),
            Err(_) => return Vec::new(),
        };

        let list = ["data", "result", "list", "rows"]
            .iter()
            .find_map(|key| resp.get(*key).and_then(|v| v.as_array()))
            .cloned()
            .unwrap_or_default();

        list.iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let date_str = first_str(obj, &["date", "dateStr"])?;
                let token = first_str(obj, &["dateId", "id", "token"]).unwrap_or_default();
                Some((date_str, token))
            })
            .collect()
    }

    pub async fn query_slots(
        &self,
        venue_id: &str,
        field_type_id: &str,
        date: &str,
        date_token: Option<&str>,
    ) -> Result<Vec<Slot>> {
        let mut body = json!({
            "venueId": venue_id,
            "fieldType": field_type_id,
            "date": date,
        });
        if let Some(token) = date_token {
            body["dateId"] = json!(token);
        }

        let resp = self
            .http
            .post_json(&self.upstream.endpoints.field_situation, &body, &[200])
            .await?;
        let resp = maybe_parse_json(&resp);

        if let Some(code) = resp.get("code") {
            let is_zero = matches!(code, Value::Number(n) if n.as_i64() == Some(0))
                || matches!(code, Value::String(s) if s == "0");
            if !code.is_null() && !is_zero {
                let msg = resp
                    .get("msg")
                    .or_else(|| resp.get("message"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                return Err(Error::BusinessError {
                    code: code.to_string(),
                    message: msg.to_string(),
                });
            }
        }

        let fields = resp
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        if fields.is_empty() {
            return Ok(self.query_slots_fallback_shape(&resp, venue_id, field_type_id));
        }

        Ok(self.parse_slots_from_fields(&fields))
    }

    fn parse_slots_from_fields(&self, fields: &[Value]) -> Vec<Slot> {
        let mut slots = Vec::new();
        for field in fields {
            let Some(field_obj) = field.as_object() else { continue };
            let field_id = first_str(field_obj, &["fieldId", "id"]).unwrap_or_default();
            let field_name = first_str(field_obj, &["fieldName", "name"]);
            let area_name = first_str(field_obj, &["fieldNameEn", "fieldAreaName", "areaName"]);
            let Some(price_list) = field.get("priceList").and_then(|v| v.as_array()) else {
                continue;
            };

            for (idx, entry) in price_list.iter().enumerate() {
                let Some(entry_obj) = entry.as_object() else { continue };
                let sign = entry_obj.get("sign").and_then(|v| v.as_str()).map(String::from);
                let decoded = sign.as_deref().and_then(decode_sign_window);

                let start = first_str(entry_obj, &["startTime", "beginTime", "startHour"])
                    .or_else(|| decoded.as_ref().map(|d| d.start.clone()))
                    .unwrap_or_else(|| format!("slot-{idx}"));
                let end = first_str(entry_obj, &["endTime", "finishTime", "endHour"])
                    .or_else(|| decoded.as_ref().map(|d| d.end.clone()))
                    .unwrap_or_else(|| "-".to_string());

                let slot_id = sign
                    .clone()
                    .or_else(|| first_str(entry_obj, &["id"]))
                    .unwrap_or_else(|| format!("{field_id}:{idx}"));

                let price = entry_obj
                    .get("price")
                    .or_else(|| entry_obj.get("amount"))
                    .and_then(|v| v.as_f64());

                let remain = entry_obj
                    .get("count")
                    .or_else(|| entry_obj.get("remain"))
                    .and_then(|v| v.as_i64());

                let status = entry_obj
                    .get("status")
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default();

                let available = remain.map(|r| r > 0).unwrap_or(false)
                    || matches!(status.as_str(), "0" | "1");

                slots.push(Slot {
                    slot_id,
                    start,
                    end,
                    price,
                    remain,
                    capacity: None,
                    available,
                    field_name: field_name.clone(),
                    area_name: area_name.clone(),
                    sub_site_id: Some(field_id.clone()),
                    sign,
                    raw: entry.clone(),
                });
            }
        }
        slots
    }

    fn query_slots_fallback_shape(&self, resp: &Value, venue_id: &str, field_type_id: &str) -> Vec<Slot> {
        let items = extract_first_list(resp).unwrap_or_default();
        items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let start = first_str(obj, &["startTime", "beginTime", "startHour", "timeStart"]);
                let end = first_str(obj, &["endTime", "finishTime", "endHour", "timeEnd"]);
                let slot_id = first_str(obj, &["id", "detailId", "timeId", "siteId"]).unwrap_or_else(|| {
                    format!(
                        "{venue_id}:{field_type_id}:{}-{}",
                        start.clone().unwrap_or_default(),
                        end.clone().unwrap_or_default()
                    )
                });
                let remain = obj
                    .get("remain")
                    .or_else(|| obj.get("left"))
                    .or_else(|| obj.get("availableNumber"))
                    .and_then(|v| v.as_i64());
                let is_full = obj.get("isFull").map(coerce_bool).unwrap_or(false);
                let available = obj.get("available").map(coerce_bool).unwrap_or(false)
                    || obj.get("status").map(coerce_bool).unwrap_or(false)
                    || remain.map(|r| r > 0).unwrap_or(false)
                    || !is_full;
                Some(Slot {
                    slot_id,
                    start: start.unwrap_or_default(),
                    end: end.unwrap_or_default(),
                    price: obj.get("price").or_else(|| obj.get("amount")).and_then(|v| v.as_f64()),
                    remain,
                    capacity: obj
                        .get("capacity")
                        .or_else(|| obj.get("total"))
                        .or_else(|| obj.get("maxNumber"))
                        .and_then(|v| v.as_i64()),
                    available,
                    field_name: first_str(obj, &["fieldName", "siteName", "name", "courtName"]),
                    area_name: first_str(obj, &["areaName", "fieldAreaName", "venueFieldName", "zoneName"]),
                    sub_site_id: None,
                    sign: None,
                    raw: item.clone(),
                })
            })
            .collect()
    }

    /// Encrypts and submits an order intent, returning the upstream
    /// order id on success (§4.2, §4.4.1).
    pub async fn order_immediately(&self, intent: &OrderIntent, return_url: &str) -> Result<String> {
        let rsa_key = self.rsa_public_key_pem.as_deref().ok_or_else(|| {
            Error::Config("codec.rsa_public_key_pem is not configured".into())
        })?;

        let payload = json!({
            "venTypeId": intent.field_type_id,
            "venueId": intent.venue_id,
            "fieldType": intent.field_name.clone().unwrap_or_default(),
            "returnUrl": return_url,
            "scheduleDate": intent.date,
            "week": "0",
            "spaces": [{
                "venuePrice": intent.price.unwrap_or(0.0).trunc().to_string(),
                "count": 1,
                "sign": intent.sign,
                "status": 1,
                "scheduleTime": format!("{}-{}", intent.start, intent.end),
                "subSitename": intent.field_name.clone().unwrap_or_default(),
                "subSiteId": intent.sub_site_id.clone().unwrap_or_default(),
                "tensity": "1",
                "venueNum": 1,
            }],
            "tenSity": "紧张",
        });

        let envelope = build_envelope(rsa_key, &payload, chrono::Utc::now())?;

        let resp = self
            .http
            .post_encrypted_body(
                &self.upstream.endpoints.order_confirm,
                envelope.body,
                &envelope.sid_header,
                &envelope.tim_header,
                &[200],
            )
            .await?;

        classify_order_response(&resp, &self.order_cfg)
    }
}
