use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::Value;

pub const REFRESH_SKEW_SECONDS: i64 = 30;

/// A token is usable when it is a well-formed JWT that does not expire within the refresh skew.
pub fn is_token_valid(token: &str) -> bool {
    is_token_valid_at(token, Utc::now().timestamp())
}

pub fn is_token_valid_at(token: &str, now: i64) -> bool {
    let Some(claims) = decode_claims(token) else {
        return false;
    };
    match claims.get("exp") {
        None | Some(Value::Null) => true,
        Some(exp) => exp
            .as_f64()
            .is_some_and(|exp| exp as i64 > now + REFRESH_SKEW_SECONDS),
    }
}

fn decode_claims(token: &str) -> Option<serde_json::Map<String, Value>> {
    let mut segments = token.trim().split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    if header.is_empty() || payload.is_empty() {
        return None;
    }
    decode_segment(header)?;
    match decode_segment(payload)? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

fn decode_segment(segment: &str) -> Option<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}
