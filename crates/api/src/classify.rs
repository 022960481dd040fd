//! Order response success/failure classification (§4.4.1).

use serde_json::Value;

use booking_domain::config::OrderConfig;
use booking_domain::{Error, Result};

fn response_code(body: &Value) -> Option<Value> {
    body.get("code").cloned()
}

fn response_message(body: &Value) -> String {
    body.get("msg")
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn order_id(body: &Value) -> Option<String> {
    ["orderId", "order_id", "id", "data"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
}

fn is_zero_code(code: &Value) -> bool {
    match code {
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s == "0",
        _ => false,
    }
}

/// Classifies an order-submission response body into success (with its
/// order id) or a categorised `Error` (§4.4.1, §7).
///
/// Rate-limit detection (§4.8.1) runs before ordinary business-code/
/// keyword classification: a response carrying "请求过于频繁", "频率", or
/// "500" is always surfaced as `Error::RateLimited` so the multi-user
/// booking policy can fail over to the next eligible user instead of
/// treating it as an ordinary business failure.
pub fn classify_order_response(body: &Value, order_cfg: &OrderConfig) -> Result<String> {
    let message = response_message(body);

    if is_rate_limited(&message, order_cfg) {
        return Err(Error::RateLimited { message });
    }

    if let Some(code) = response_code(body) {
        if !code.is_null() && !is_zero_code(&code) {
            let code_str = match &code {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(classify_business_code(&code_str, &message, order_cfg));
        }
    }

    if !message.is_empty()
        && order_cfg
            .failure_keywords
            .iter()
            .any(|kw| message.contains(kw.as_str()))
    {
        return Err(Error::BusinessError {
            code: "0".into(),
            message,
        });
    }

    match order_id(body) {
        Some(id) => Ok(id),
        None => Err(Error::BusinessError {
            code: "0".into(),
            message: format!("下单失败: 未返回订单ID - {body}"),
        }),
    }
}

fn classify_business_code(code: &str, message: &str, order_cfg: &OrderConfig) -> Error {
    if order_cfg.rate_limit_keywords.iter().any(|kw| kw == code) {
        return Error::RateLimited {
            message: format!("{code}: {message}"),
        };
    }
    match code {
        "401" => Error::AuthExpired {
            user: "current".into(),
        },
        "403" => Error::BusinessError {
            code: code.into(),
            message: format!("权限不足: {message}"),
        },
        "404" => Error::BusinessError {
            code: code.into(),
            message: format!("资源不存在: {message}"),
        },
        _ => Error::BusinessError {
            code: code.into(),
            message: message.to_string(),
        },
    }
}

/// §4.8.1: detects whether an error message indicates the caller is
/// being rate limited, used to trigger multi-user failover.
pub fn is_rate_limited(message: &str, order_cfg: &OrderConfig) -> bool {
    order_cfg
        .rate_limit_keywords
        .iter()
        .any(|kw| message.contains(kw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> OrderConfig {
        OrderConfig::default()
    }

    #[test]
    fn success_with_order_id_and_zero_code() {
        let body = json!({"code": 0, "msg": "成功", "orderId": "ORD123"});
        assert_eq!(classify_order_response(&body, &cfg()).unwrap(), "ORD123");
    }

    #[test]
    fn missing_order_id_is_failure_even_without_code() {
        let body = json!({"msg": "ok"});
        assert!(classify_order_response(&body, &cfg()).is_err());
    }

    #[test]
    fn failure_keyword_in_message_overrides_missing_code() {
        let body = json!({"msg": "场地已满", "orderId": "ORD1"});
        let err = classify_order_response(&body, &cfg()).unwrap_err();
        assert!(matches!(err, Error::BusinessError { .. }));
    }

    #[test]
    fn code_401_maps_to_auth_expired() {
        let body = json!({"code": 401, "msg": "登录超时"});
        let err = classify_order_response(&body, &cfg()).unwrap_err();
        assert!(matches!(err, Error::AuthExpired { .. }));
    }

    #[test]
    fn code_500_maps_to_rate_limited() {
        let body = json!({"code": 500, "msg": "服务器错误"});
        let err = classify_order_response(&body, &cfg()).unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[test]
    fn rate_limit_message_preempts_business_code_classification() {
        let body = json!({"code": 403, "msg": "请求过于频繁，请稍后再试"});
        let err = classify_order_response(&body, &cfg()).unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[test]
    fn rate_limit_detection_matches_literal_500_token() {
        assert!(is_rate_limited("HTTP 500 error", &cfg()));
        assert!(is_rate_limited("请求过于频繁，请稍后再试", &cfg()));
        assert!(!is_rate_limited("一切正常", &cfg()));
    }
}
