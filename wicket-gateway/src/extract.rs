//! Minimal field extraction over raw gateway response text.
//!
//! Two tiers live here. The heuristic tier ([`scalar`], [`boolean`],
//! [`count_array_objects`]) scans the raw text without building a document
//! tree — it is what the auth endpoints and the poll `has_new` flag need,
//! and it tolerates any garbage by returning `None`/`0`. The structured
//! tier ([`typed_array`]) parses properly with serde_json and maps array
//! entries into typed records, skipping entries that fail to decode.
//!
//! All functions are pure and safe to call concurrently.

use serde::de::DeserializeOwned;
use serde_json::Value;

// ─── Heuristic tier ───────────────────────────────────────────────────────────

/// Extract the first scalar value stored under `"<key>":`.
///
/// Supported value shapes:
/// * strings — returned without the surrounding quotes;
/// * the literals `true` / `false` — returned as their token text.
///
/// Numbers, objects, and arrays are not supported and yield `None`, as does
/// a missing key.
///
/// Known limitation: escape sequences inside strings are *not* decoded. A
/// value containing `\"` terminates at that quote and the result is the
/// prefix up to it. Gateway scalar fields (statuses, phone numbers, session
/// blobs) never contain quotes, so the simple scan is sufficient; use
/// [`typed_array`] wherever full JSON strings matter.
pub fn scalar<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\":");
    let at = json.find(&needle)? + needle.len();
    let rest = &json[at..];
    let rest = rest.trim_start_matches(' ');

    match rest.chars().next()? {
        '"' => {
            let inner = &rest[1..];
            let end = inner.find('"')?;
            Some(&inner[..end])
        }
        't' | 'f' => {
            let end = rest
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            Some(&rest[..end])
        }
        _ => None,
    }
}

/// `true` iff `scalar(json, key)` is exactly the literal `true`.
pub fn boolean(json: &str, key: &str) -> bool {
    scalar(json, key) == Some("true")
}

/// Count the objects directly inside the array stored under `"<key>":[`.
///
/// This is an item counter, not a parser: it tracks bracket depth only, and
/// counts every `{` seen at depth 1 until the matching `]` closes the
/// array. Returns 0 when the key (or the array) is absent.
pub fn count_array_objects(json: &str, key: &str) -> usize {
    let needle = format!("\"{key}\":[");
    let Some(at) = json.find(&needle) else { return 0 };
    // Start on the opening bracket so it establishes depth 1.
    let body = &json[at + needle.len() - 1..];

    let mut count = 0usize;
    let mut depth = 0i32;
    for c in body.chars() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            '{' if depth == 1 => count += 1,
            _ => {}
        }
    }
    count
}

// ─── Structured tier ──────────────────────────────────────────────────────────

/// Decode the array stored under `key` into typed records.
///
/// Error-tolerant by design: an unparseable body, a missing key, or a
/// non-array value all yield an empty vector, and individual entries that
/// fail to decode are skipped rather than failing the whole call.
pub fn typed_array<T: DeserializeOwned>(json: &str, key: &str) -> Vec<T> {
    let Ok(root) = serde_json::from_str::<Value>(json) else {
        return Vec::new();
    };
    let Some(items) = root.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
