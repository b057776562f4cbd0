//! Documents are arbitrary JSON objects; the only constraint this crate
//! imposes is that an indexable field's value must itself translate into
//! the tuple codec. Unindexable field values (JSON objects, or arrays that
//! recursively contain one) are still stored verbatim in the document body
//! — they simply never produce an `index:` entry, so equality queries
//! against them fall back to a full scan.

use serde_json::Value as Json;

use crate::tuple::Value as TupleValue;

/// A document is exactly a JSON object; `serde_json::Value::Object`'s
/// backing map already preserves insertion order with the `preserve_order`
/// feature off this is a plain alphabetical `BTreeMap`-like map, which is
/// fine since this crate never depends on field order.
pub type Document = serde_json::Map<String, Json>;

pub fn validate_is_object(value: Json) -> Option<Document> {
    match value {
        Json::Object(map) => Some(map),
        _ => None,
    }
}

/// Converts a JSON value into the tuple-codec value it would be indexed
/// as, or `None` if it has no encoding (a JSON object, or an array that
/// contains one, transitively).
pub fn json_to_tuple_value(value: &Json) -> Option<TupleValue> {
    match value {
        Json::Null => Some(TupleValue::Null),
        Json::Bool(b) => Some(TupleValue::Bool(*b)),
        Json::String(s) => Some(TupleValue::Str(s.clone())),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(TupleValue::Int(i as i128))
            } else if let Some(u) = n.as_u64() {
                Some(TupleValue::Int(u as i128))
            } else {
                n.as_f64().map(TupleValue::Double)
            }
        }
        Json::Array(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(json_to_tuple_value(item)?);
            }
            Some(TupleValue::Tuple(encoded))
        }
        Json::Object(_) => None,
    }
}
