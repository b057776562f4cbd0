//! Key layout for the two sub-spaces a [`crate::storage::Db`] keeps inside
//! one `KvEngine` handle: `docs:` maps a uid to its serialized document,
//! `index:` maps `(field name, field value, uid)` to nothing. Both are
//! plain tuple-codec encodings, so lexical byte order on the key doubles as
//! the order the codec defines over the tuple it came from (see
//! `crate::tuple`).

use crate::errors::EncodeError;
use crate::tuple::{self, Value};

/// The allocator samples uids from `[0, UID_BOUND)`; see `crate::alloc`.
pub const UID_BOUND: u64 = 1 << 63;

pub fn docs_key(uid: u64) -> Result<Vec<u8>, EncodeError> {
    tuple::pack(&[Value::Int(uid as i128)])
}

/// Recovers the uid encoded in a `docs:` key. Panics on keys not produced
/// by [`docs_key`]; the `docs:` sub-view never holds anything else.
pub fn decode_docs_key(key: &[u8]) -> u64 {
    let values = tuple::unpack(key).expect("docs: key is always a one-element uid tuple");
    match values.first() {
        Some(Value::Int(v)) if *v >= 0 => *v as u64,
        other => panic!("docs: key decoded to unexpected shape: {other:?}"),
    }
}

pub fn index_key(name: &str, value: &Value, uid: u64) -> Result<Vec<u8>, EncodeError> {
    tuple::pack(&[Value::Str(name.to_string()), value.clone(), Value::Int(uid as i128)])
}

/// Recovers the uid encoded in an `index:` key. Panics on keys not produced
/// by [`index_key`].
pub fn decode_index_key_uid(key: &[u8]) -> u64 {
    let values = tuple::unpack(key).expect("index: key is always a (name, value, uid) tuple");
    match values.get(2) {
        Some(Value::Int(v)) if *v >= 0 => *v as u64,
        other => panic!("index: key decoded to unexpected shape: {other:?}"),
    }
}

/// The half-open `[start, stop)` range covering every `index:` entry for a
/// given `(name, value)` pair, across every possible uid. The upper bound
/// deliberately mirrors the original implementation's use of the platform's
/// maximum signed integer as a stand-in "largest possible uid" rather than
/// `UID_BOUND` itself — see `DESIGN.md` for why that one-off boundary is
/// kept rather than tightened.
pub fn index_range(name: &str, value: &Value) -> Result<(Vec<u8>, Vec<u8>), EncodeError> {
    let start = index_key(name, value, 0)?;
    let stop = index_key(name, value, UID_BOUND - 1)?;
    Ok((start, stop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_key_roundtrips() {
        for uid in [0u64, 1, 42, UID_BOUND - 1] {
            let key = docs_key(uid).unwrap();
            assert_eq!(decode_docs_key(&key), uid);
        }
    }

    #[test]
    fn docs_key_orders_by_uid() {
        let a = docs_key(1).unwrap();
        let b = docs_key(2).unwrap();
        let c = docs_key(1000).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn index_key_roundtrips_uid() {
        let key = index_key("name", &Value::Str("alice".into()), 7).unwrap();
        assert_eq!(decode_index_key_uid(&key), 7);
    }

    #[test]
    fn index_range_contains_member_keys_and_excludes_others() {
        let value = Value::Int(30);
        let (start, stop) = index_range("age", &value).unwrap();
        let member = index_key("age", &value, 12345).unwrap();
        assert!(member >= start);
        assert!(member < stop);

        let other_value = index_key("age", &Value::Int(31), 0).unwrap();
        assert!(other_value >= stop);

        let other_name = index_key("name", &value, 0).unwrap();
        assert!(!(other_name >= start && other_name < stop));
    }
}
