//! Header compaction
//!
//! Turns a multi-valued header collection into a flat JSON object that can be
//! stored alongside an entry.

use http::HeaderMap;
use serde_json::{Map, Value as JsonValue};

/// Compact a header map into `name -> value` (or `name -> [values]`).
///
/// With `as_single_value` every header collapses to its first value. Without
/// it every header maps to the list of all its values, even when there is
/// only one. Names keep the lower-case form `HeaderMap` stores them in.
pub fn compact(headers: &HeaderMap, as_single_value: bool) -> JsonValue {
    let mut out = Map::new();

    for name in headers.keys() {
        let mut values = headers
            .get_all(name)
            .iter()
            .map(|v| JsonValue::String(String::from_utf8_lossy(v.as_bytes()).into_owned()));

        let compacted = if as_single_value {
            match values.next() {
                Some(first) => first,
                None => continue,
            }
        } else {
            JsonValue::Array(values.collect())
        };

        out.insert(name.as_str().to_string(), compacted);
    }

    JsonValue::Object(out)
}
