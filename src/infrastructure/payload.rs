use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

const ID_KEYS: [&str; 3] = ["id", "$oid", "_id"];

pub fn field<'a>(raw: &'a Value, key: &str) -> &'a Value {
    raw.get(key).unwrap_or(&Value::Null)
}

pub fn first_field<'a>(raw: &'a Value, keys: &[&str]) -> &'a Value {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
        .unwrap_or(&Value::Null)
}

pub fn coerce_f64(raw: &Value, default: f64) -> f64 {
    let parsed = match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite()).unwrap_or(default)
}

pub fn coerce_optional_f64(raw: &Value) -> Option<f64> {
    let value = coerce_f64(raw, f64::NAN);
    value.is_finite().then_some(value)
}

pub fn coerce_u32(raw: &Value, default: u32) -> u32 {
    let value = coerce_f64(raw, -1.0);
    if value < 0.0 {
        return default;
    }
    value.min(u32::MAX as f64) as u32
}

pub fn coerce_bool(raw: &Value, default: bool) -> bool {
    match raw {
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().map(|value| value != 0.0).unwrap_or(default),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        _ => default,
    }
}

pub fn coerce_optional_string(raw: &Value) -> Option<String> {
    let text = match raw {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(value) => value.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

pub fn coerce_string(raw: &Value, fallback: &str) -> String {
    coerce_optional_string(raw).unwrap_or_else(|| fallback.to_string())
}

pub fn coerce_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => coerce_optional_string(raw),
        Value::Object(object) => {
            if let Some(nested) = ID_KEYS
                .iter()
                .filter_map(|key| object.get(*key))
                .find_map(coerce_id)
            {
                return Some(nested);
            }
            (!object.is_empty()).then(|| raw.to_string())
        }
        _ => None,
    }
}

/// Timestamps outside years 0..=9999 are dropped so they survive an RFC 3339 round trip.
pub fn coerce_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    let parsed = match raw {
        Value::String(text) => parse_timestamp(text),
        Value::Number(number) => {
            let seconds = number.as_f64().filter(|value| value.is_finite())?;
            // Values past year 2286 in seconds are epoch milliseconds.
            let millis = if seconds.abs() >= 1e10 { seconds } else { seconds * 1000.0 };
            DateTime::from_timestamp_millis(millis as i64)
        }
        _ => None,
    };
    parsed.filter(|timestamp| (0..=9999).contains(&timestamp.year()))
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn coerce_string_list(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items.iter().filter_map(coerce_id).collect(),
        _ => Vec::new(),
    }
}

pub fn list_items<'a>(raw: &'a Value, wrapper_keys: &[&str]) -> &'a [Value] {
    if let Value::Array(items) = raw {
        return items;
    }
    wrapper_keys
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn normalize_list<T>(raw: &Value, wrapper_keys: &[&str], normalize: impl Fn(&Value) -> T) -> Vec<T> {
    list_items(raw, wrapper_keys).iter().map(normalize).collect()
}

pub fn stable_fingerprint<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .map(|value| value.to_string())
        .unwrap_or_default()
}
