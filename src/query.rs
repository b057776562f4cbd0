//! Conjunctive equality queries: `{field: value, ...}` matches every
//! document whose fields equal every given value. There is no query
//! planner beyond picking the first filter as the "driver" — the executor
//! range-scans `index:` for that one field/value pair (by I4, that range is
//! exactly the set of uids with that field set to that value) and then
//! point-probes the remaining filters against `index:` for each candidate,
//! short-circuiting at the first miss. The result is a lazy iterator: a
//! caller that only wants the first match never pays for the rest.

use std::ops::Bound;

use crate::document::json_to_tuple_value;
use crate::errors::QueryError;
use crate::keyspace::{decode_docs_key, decode_index_key_uid, index_key, index_range};
use crate::kv::KvEngine;

/// `(field name, value)` pairs, all of which must match for a document to
/// be returned. An empty slice matches every document.
pub type Filters = Vec<(String, serde_json::Value)>;

pub fn execute<K>(docs: K, index: K, filters: Filters) -> Result<Box<dyn Iterator<Item = Result<u64, QueryError>>>, QueryError>
where
    K: KvEngine + 'static,
{
    if filters.is_empty() {
        let iter = docs
            .range(Bound::Unbounded, Bound::Unbounded)
            .map_err(QueryError::from)?
            .map(|item| item.map(|(key, _)| decode_docs_key(&key)).map_err(QueryError::from));
        return Ok(Box::new(iter));
    }

    let (driver_name, driver_json) = &filters[0];
    let driver_value =
        json_to_tuple_value(driver_json).ok_or_else(|| QueryError::UnencodableFilter(driver_name.clone()))?;
    let (start, stop) = index_range(driver_name, &driver_value).map_err(|e| QueryError::Storage(e.into()))?;

    let mut probes = Vec::with_capacity(filters.len() - 1);
    for (name, value) in &filters[1..] {
        let tuple_value = json_to_tuple_value(value).ok_or_else(|| QueryError::UnencodableFilter(name.clone()))?;
        probes.push((name.clone(), tuple_value));
    }

    let probe_engine = index.clone();
    let driver_iter = index.range(Bound::Included(start), Bound::Excluded(stop)).map_err(QueryError::from)?;

    let candidates = driver_iter.map(|item| item.map(|(key, _)| decode_index_key_uid(&key)).map_err(QueryError::from));

    let matched = candidates.filter_map(move |candidate| match candidate {
        Err(e) => Some(Err(e)),
        Ok(uid) => match matches_all_probes(&probe_engine, &probes, uid) {
            Ok(true) => Some(Ok(uid)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        },
    });

    Ok(Box::new(matched))
}

fn matches_all_probes<K: KvEngine>(index: &K, probes: &[(String, crate::tuple::Value)], uid: u64) -> Result<bool, QueryError> {
    for (name, value) in probes {
        let key = index_key(name, value, uid).map_err(|e| QueryError::Storage(e.into()))?;
        if index.get(&key).map_err(QueryError::from)?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::{docs_key, index_key};
    use crate::kv::mem::MemEngine;
    use serde_json::json;

    fn seed(docs: &MemEngine, index: &MemEngine, uid: u64, fields: &[(&str, serde_json::Value)]) {
        docs.put(&docs_key(uid).unwrap(), b"{}").unwrap();
        for (name, value) in fields {
            let tv = json_to_tuple_value(value).unwrap();
            index.put(&index_key(name, &tv, uid).unwrap(), &[]).unwrap();
        }
    }

    #[test]
    fn empty_filters_returns_every_uid_in_ascending_order() {
        let docs = MemEngine::new();
        let index = MemEngine::new();
        for uid in [5u64, 1, 3] {
            seed(&docs, &index, uid, &[]);
        }
        let results: Vec<u64> = execute(docs, index, vec![]).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(results, vec![1, 3, 5]);
    }

    #[test]
    fn single_filter_matches_driver_range() {
        let docs = MemEngine::new();
        let index = MemEngine::new();
        seed(&docs, &index, 1, &[("name", json!("alice"))]);
        seed(&docs, &index, 2, &[("name", json!("bob"))]);

        let filters = vec![("name".to_string(), json!("alice"))];
        let results: Vec<u64> = execute(docs, index, filters).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(results, vec![1]);
    }

    #[test]
    fn conjunctive_filters_probe_remaining_fields() {
        let docs = MemEngine::new();
        let index = MemEngine::new();
        seed(&docs, &index, 1, &[("name", json!("alice")), ("age", json!(30))]);
        seed(&docs, &index, 2, &[("name", json!("alice")), ("age", json!(40))]);

        let filters = vec![("name".to_string(), json!("alice")), ("age".to_string(), json!(30))];
        let results: Vec<u64> = execute(docs, index, filters).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(results, vec![1]);
    }

    #[test]
    fn unencodable_filter_value_is_rejected() {
        let docs = MemEngine::new();
        let index = MemEngine::new();
        let filters = vec![("name".to_string(), json!({"nested": true}))];
        let err = execute(docs, index, filters).unwrap_err();
        assert!(matches!(err, QueryError::UnencodableFilter(ref f) if f == "name"));
    }

    #[test]
    fn no_matches_yields_empty_iterator() {
        let docs = MemEngine::new();
        let index = MemEngine::new();
        seed(&docs, &index, 1, &[("name", json!("alice"))]);
        let filters = vec![("name".to_string(), json!("carol"))];
        let results: Vec<u64> = execute(docs, index, filters).unwrap().collect::<Result<_, _>>().unwrap();
        assert!(results.is_empty());
    }
}
