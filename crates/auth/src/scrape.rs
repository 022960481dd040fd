//! HTML scraping helpers for the CAS-style login page (§4.5).

use regex::Regex;
use std::collections::HashMap;

/// Hidden `<input type="hidden" name="..." value="...">` fields.
pub fn parse_hidden_inputs(html: &str) -> HashMap<String, String> {
    let re = Regex::new(
        r#"(?is)<input[^>]+type=["']hidden["'][^>]*>"#,
    )
    .unwrap();
    let name_re = Regex::new(r#"(?is)name=["']([^"']+)["']"#).unwrap();
    let value_re = Regex::new(r#"(?is)value=["']([^"']*)["']"#).unwrap();

    let mut fields = HashMap::new();
    for tag in re.find_iter(html) {
        let tag_str = tag.as_str();
        let Some(name) = name_re.captures(tag_str).and_then(|c| c.get(1)) else {
            continue;
        };
        let value = value_re
            .captures(tag_str)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or("");
        fields.insert(name.as_str().to_string(), value.to_string());
    }
    fields
}

/// The submit form's `action` attribute.
pub fn extract_form_action(html: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)<form[^>]+action=["']([^"']+)["']"#).ok()?;
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Scrapes an error message from any of the known CAS-rejection shapes.
pub fn extract_error_message(html: &str) -> Option<String> {
    let patterns = [
        r#"(?is)<span[^>]+id=["'](?:errmsg|errorMsg)["'][^>]*>([^<]+)<"#,
        r#"(?is)<p[^>]+class=["']error[^"']*["'][^>]*>([^<]+)<"#,
        r#"(?is)showMessage\(['"]([^'"]+)['"]\)"#,
        r#"(?is)msg\s*:\s*['"]([^'"]+)['"]"#,
    ];
    for pattern in patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(c) = re.captures(html) {
                return c.get(1).map(|m| m.as_str().trim().to_string());
            }
        }
    }
    None
}

/// Captcha `<img>` src and any `uuid` embedded in it or the page.
pub fn extract_captcha_info(html: &str) -> (Option<String>, Option<String>) {
    let img_re = Regex::new(r#"(?is)<img[^>]+(?:id=["']captcha["']|class=["'][^"']*captcha[^"']*["'])[^>]*src=["']([^"']+)["']"#)
        .or_else(|_| Regex::new(r#"(?is)<img[^>]+src=["']([^"']*captcha[^"']*)["']"#))
        .unwrap();
    let uuid_re = Regex::new(r#"uuid=([0-9a-fA-F-]{8,})"#).unwrap();

    let src = img_re
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.ends_with("image/captcha.png"));

    let uuid = src
        .as_deref()
        .and_then(|s| uuid_re.captures(s))
        .or_else(|| uuid_re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    (src, uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hidden_inputs() {
        let html = r#"<form><input type="hidden" name="sid" value="abc123"/></form>"#;
        let fields = parse_hidden_inputs(html);
        assert_eq!(fields.get("sid"), Some(&"abc123".to_string()));
    }

    #[test]
    fn extracts_form_action() {
        let html = r#"<form action="/cas/login?service=x" method="post"></form>"#;
        assert_eq!(
            extract_form_action(html),
            Some("/cas/login?service=x".to_string())
        );
    }

    #[test]
    fn extracts_error_message_from_span() {
        let html = r#"<span id="errmsg">用户名或密码错误</span>"#;
        assert_eq!(
            extract_error_message(html),
            Some("用户名或密码错误".to_string())
        );
    }

    #[test]
    fn extracts_error_message_from_show_message() {
        let html = r#"<script>showMessage('验证码错误')</script>"#;
        assert_eq!(extract_error_message(html), Some("验证码错误".to_string()));
    }

    #[test]
    fn extracts_captcha_uuid_from_query_string() {
        let html = r#"<img id="captcha" src="/captcha.jsp?uuid=11111111-2222-3333-4444-555555555555"/>"#;
        let (src, uuid) = extract_captcha_info(html);
        assert!(src.is_some());
        assert_eq!(uuid.as_deref(), Some("11111111-2222-3333-4444-555555555555"));
    }

    #[test]
    fn returns_none_when_no_captcha_present() {
        let html = "<form></form>";
        let (src, uuid) = extract_captcha_info(html);
        assert!(src.is_none());
        assert!(uuid.is_none());
    }
}
