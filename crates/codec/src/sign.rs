use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde::Deserialize;

/// Start/end decoded from a slot's `sign` token, when recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
struct SignJson {
    #[serde(rename = "startTime")]
    start_time: Option<String>,
    #[serde(rename = "endTime")]
    end_time: Option<String>,
}

/// Decodes a slot's `sign` token and extracts a start/end time window, if
/// one is embedded. The token's decoded bytes are typically UTF-8 text
/// that is either JSON with `startTime`/`endTime`, or free text
/// containing two `HH:MM` occurrences (§4.2).
pub fn decode_sign_window(sign: &str) -> Option<DecodedWindow> {
    let bytes = STANDARD.decode(sign).ok()?;
    let text = String::from_utf8(bytes).ok()?;

    if let Ok(parsed) = serde_json::from_str::<SignJson>(&text) {
        if let (Some(start), Some(end)) = (parsed.start_time, parsed.end_time) {
            return Some(DecodedWindow { start, end });
        }
    }

    let re = Regex::new(r"\b([01]?\d|2[0-3]):[0-5]\d\b").ok()?;
    let mut matches = re.find_iter(&text);
    let start = matches.next()?.as_str().to_string();
    let end = matches.next()?.as_str().to_string();
    Some(DecodedWindow { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str) -> String {
        STANDARD.encode(s.as_bytes())
    }

    #[test]
    fn decodes_embedded_json_times() {
        let sign = encode(r#"{"startTime":"18:00","endTime":"19:00","date":"2026-08-01"}"#);
        let window = decode_sign_window(&sign).unwrap();
        assert_eq!(window.start, "18:00");
        assert_eq!(window.end, "19:00");
    }

    #[test]
    fn decodes_free_text_hh_mm_pair() {
        let sign = encode("slot window 09:30 to 10:30 reserved");
        let window = decode_sign_window(&sign).unwrap();
        assert_eq!(window.start, "09:30");
        assert_eq!(window.end, "10:30");
    }

    #[test]
    fn returns_none_for_invalid_base64() {
        assert!(decode_sign_window("not-base64!!!").is_none());
    }

    #[test]
    fn returns_none_when_fewer_than_two_times_present() {
        let sign = encode("only one time here: 14:00");
        assert!(decode_sign_window(&sign).is_none());
    }
}
