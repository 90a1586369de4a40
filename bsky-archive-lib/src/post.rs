//! Accessors over raw post JSON.
//!
//! Feed and timeline endpoints wrap each post view as `{"post": {...}}`,
//! while search returns bare post views. These helpers look through either
//! shape so the rest of the crate can pass upstream JSON through unchanged.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// The post view inside an item, whichever shape it has.
pub fn view(item: &Value) -> &Value {
    match item.get("post") {
        Some(inner) if inner.is_object() => inner,
        _ => item,
    }
}

pub fn view_mut(item: &mut Value) -> Option<&mut Map<String, Value>> {
    let wrapped = item.get("post").is_some_and(Value::is_object);
    if wrapped {
        item.get_mut("post").and_then(Value::as_object_mut)
    } else {
        item.as_object_mut()
    }
}

pub fn uri(item: &Value) -> Option<&str> {
    view(item).get("uri").and_then(Value::as_str)
}

pub fn author_handle(item: &Value) -> Option<&str> {
    view(item)
        .get("author")
        .and_then(|a| a.get("handle"))
        .and_then(Value::as_str)
}

pub fn text(item: &Value) -> Option<&str> {
    view(item)
        .get("record")
        .and_then(|r| r.get("text"))
        .and_then(Value::as_str)
}

/// `record.createdAt`, parsed as UTC.
pub fn created_at(item: &Value) -> Option<DateTime<Utc>> {
    view(item)
        .get("record")
        .and_then(|r| r.get("createdAt"))
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
}

/// `record.langs`, or an empty list.
pub fn langs(item: &Value) -> Vec<&str> {
    view(item)
        .get("record")
        .and_then(|r| r.get("langs"))
        .and_then(Value::as_array)
        .map(|langs| langs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Make sure the item carries a `comments` array for thread enrichment.
pub fn init_comments(item: &mut Value) {
    if let Some(obj) = item.as_object_mut() {
        obj.entry("comments")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
}

/// RFC 3339 with `Z` or an offset; timestamps with no zone are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
