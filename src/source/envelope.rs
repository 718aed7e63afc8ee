//! Unwraps the response envelopes the REST API uses for lists.
//!
//! Accepted shapes, outermost first:
//! - a bare array
//! - `{ "data": [...] }`
//! - `{ "data": { "<list key>": [...], "total": .., "page": .., "limit": .. } }`
//! - the same object without the `data` wrapper
//!
//! Paging numbers may also sit under a nested `pagination` object and may be
//! numeric strings. A missing total falls back to the item count.

use serde_json::Value;

use super::wire::as_usize;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage<R> {
    pub items: Vec<R>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<R> RecordPage<R> {
    pub fn from_items(items: Vec<R>) -> Self {
        let total = items.len();
        RecordPage {
            items,
            total,
            page: 1,
            limit: total,
        }
    }
}

const GENERIC_LIST_KEYS: [&str; 2] = ["items", "data"];

/// Items plus paging numbers of one envelope, before record mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage<'a> {
    pub items: &'a [Value],
    pub total: Option<usize>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub fn unwrap_envelope<'a>(body: &'a Value, list_keys: &[&str]) -> Option<RawPage<'a>> {
    if let Value::Array(items) = body {
        return Some(RawPage {
            items,
            total: None,
            page: None,
            limit: None,
        });
    }
    let object = body.as_object()?;

    if let Some(inner) = object.get("data") {
        if let Some(page) = unwrap_envelope(inner, list_keys) {
            return Some(page);
        }
    }

    let items = list_keys
        .iter()
        .chain(GENERIC_LIST_KEYS.iter())
        .find_map(|key| object.get(*key).and_then(Value::as_array))?;

    let paging = object.get("pagination").and_then(Value::as_object);
    let number = |key: &str| {
        object
            .get(key)
            .and_then(as_usize)
            .or_else(|| paging.and_then(|p| p.get(key)).and_then(as_usize))
    };

    Some(RawPage {
        items,
        total: number("total"),
        page: number("page"),
        limit: number("limit"),
    })
}

/// Maps every item with `map`. Items that do not map are skipped and logged.
pub fn map_page<R>(
    body: &Value,
    list_keys: &[&str],
    kind: &str,
    map: impl Fn(&Value) -> Option<R>,
) -> Option<RecordPage<R>> {
    let raw = unwrap_envelope(body, list_keys)?;
    let mut items = Vec::with_capacity(raw.items.len());
    let mut skipped = 0usize;
    for item in raw.items {
        match map(item) {
            Some(record) => items.push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(kind, skipped, "skipped malformed records");
    }

    let total = raw.total.unwrap_or(items.len()).max(items.len());
    let limit = raw.limit.filter(|l| *l > 0).unwrap_or(items.len().max(1));
    Some(RecordPage {
        total,
        page: raw.page.filter(|p| *p > 0).unwrap_or(1),
        limit,
        items,
    })
}
