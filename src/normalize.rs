//! Record normalization.
//!
//! Turns an adapter's [`RawPosting`] into a [`NormalizedPosting`] whose every
//! value is a trimmed, non-empty string or the `"none"` sentinel. Dates become
//! ISO-8601, markup is stripped from `description`, and a `fetched_at` stamp is
//! added last. No field is dropped.

use crate::models::{NormalizedPosting, RawPosting, RawValue};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Placeholder for missing or empty values.
pub const NONE_SENTINEL: &str = "none";

pub const DESCRIPTION_FIELD: &str = "description";
pub const FETCHED_AT_FIELD: &str = "fetched_at";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex compiles"));

/// Normalize a posting fetched at `fetched_at`.
pub fn normalize(raw: &RawPosting, fetched_at: DateTime<Utc>) -> NormalizedPosting {
    let mut fields: BTreeMap<String, String> = raw
        .iter()
        .map(|(key, value)| (key.to_string(), coerce(value)))
        .collect();

    let description = fields
        .remove(DESCRIPTION_FIELD)
        .map(|d| or_sentinel(strip_markup(&d)))
        .unwrap_or_else(|| NONE_SENTINEL.to_string());
    fields.insert(DESCRIPTION_FIELD.to_string(), description);

    fields.insert(
        FETCHED_AT_FIELD.to_string(),
        fetched_at.to_rfc3339_opts(SecondsFormat::Micros, false),
    );

    NormalizedPosting::from_fields(fields)
}

/// Normalize a posting stamped with the current instant.
pub fn normalize_now(raw: &RawPosting) -> NormalizedPosting {
    normalize(raw, Utc::now())
}

/// Delete anything that looks like a markup tag.
pub fn strip_markup(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

fn coerce(value: &RawValue) -> String {
    let text = match value {
        RawValue::Null => return NONE_SENTINEL.to_string(),
        RawValue::Text(s) => s.clone(),
        RawValue::Integer(n) => n.to_string(),
        RawValue::Float(f) if f.is_nan() => return NONE_SENTINEL.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        RawValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        RawValue::Other(serde_json::Value::Null) => return NONE_SENTINEL.to_string(),
        RawValue::Other(serde_json::Value::String(s)) => s.clone(),
        RawValue::Other(v) => v.to_string(),
    };
    or_sentinel(text)
}

/// Trim, and collapse blank or literal "none" values to the sentinel.
fn or_sentinel(text: String) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_SENTINEL) {
        NONE_SENTINEL.to_string()
    } else if trimmed.len() == text.len() {
        text
    } else {
        trimmed.to_string()
    }
}
