//! The storage engine: owns the `docs:`/`index:` split over one
//! [`KvEngine`] handle and keeps invariants I1-I4 (see `SPEC_FULL.md`)
//! across `create`/`read`/`update`/`delete`. Every public method returns
//! [`DbError`], the umbrella aggregating the storage, allocation, and query
//! leaf errors.

use std::ops::Bound;
use std::path::Path;

use crate::alloc::allocate_uid;
use crate::document::{json_to_tuple_value, Document};
use crate::errors::{DbError, StorageError};
use crate::keyspace::{docs_key, index_key};
use crate::kv::{KvEngine, SledEngine};
use crate::query::{self, Filters};

/// Running totals a caller can ask for without doing a full scan
/// themselves; not part of the original query surface, added purely as
/// operational visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbStats {
    pub document_count: u64,
}

pub struct Db<K: KvEngine> {
    docs: K,
    index: K,
}

impl<K: KvEngine> Db<K> {
    /// Wraps an already-open engine handle, deriving the `docs:`/`index:`
    /// sub-views from it.
    pub fn from_engine(root: K) -> Result<Self, DbError> {
        let docs = root.prefixed(b"docs:")?;
        let index = root.prefixed(b"index:")?;
        Ok(Self { docs, index })
    }

    fn save(&self, uid: u64, doc: &Document) -> Result<(), StorageError> {
        let key = docs_key(uid)?;
        let bytes = serde_json::to_vec(doc)?;
        self.docs.put(&key, &bytes)?;
        for (name, value) in doc.iter() {
            if let Some(tuple_value) = json_to_tuple_value(value) {
                let ikey = index_key(name, &tuple_value, uid)?;
                self.index.put(&ikey, &[])?;
            }
        }
        Ok(())
    }

    fn unindex(&self, uid: u64, doc: &Document) -> Result<(), StorageError> {
        for (name, value) in doc.iter() {
            if let Some(tuple_value) = json_to_tuple_value(value) {
                let ikey = index_key(name, &tuple_value, uid)?;
                self.index.delete(&ikey)?;
            }
        }
        Ok(())
    }

    /// Allocates a fresh uid and stores `doc` under it.
    pub fn create(&self, doc: Document) -> Result<u64, DbError> {
        let uid = allocate_uid(|candidate| Ok(self.read_raw(candidate)?.is_some()))?;
        self.save(uid, &doc)?;
        Ok(uid)
    }

    pub fn read(&self, uid: u64) -> Result<Option<Document>, DbError> {
        Ok(self.read_raw(uid)?)
    }

    fn read_raw(&self, uid: u64) -> Result<Option<Document>, StorageError> {
        let key = docs_key(uid)?;
        let Some(bytes) = self.docs.get(&key)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let doc = value
            .as_object()
            .cloned()
            .ok_or_else(|| StorageError::CorruptDocument { uid, reason: "stored value is not a JSON object".into() })?;
        Ok(Some(doc))
    }

    /// Replaces the document at `uid`, deindexing the old fields first so a
    /// field dropped by the new document doesn't leave a stale `index:`
    /// entry behind. Creates the slot if it was empty — there is no
    /// existence precondition (see `SPEC_FULL.md` for why this mirrors the
    /// original behavior).
    pub fn update(&self, uid: u64, doc: Document) -> Result<(), DbError> {
        if let Some(old) = self.read_raw(uid)? {
            self.unindex(uid, &old)?;
        }
        self.save(uid, &doc)?;
        Ok(())
    }

    /// Deletes the document at `uid` along with every `index:` entry it
    /// produced. A no-op, not an error, if `uid` is already absent.
    pub fn delete(&self, uid: u64) -> Result<(), DbError> {
        let Some(doc) = self.read_raw(uid)? else {
            return Ok(());
        };
        self.unindex(uid, &doc)?;
        self.docs.delete(&docs_key(uid)?)?;
        Ok(())
    }

    /// Runs a conjunctive equality query and returns the matching uids in
    /// ascending order.
    pub fn query(&self, filters: Filters) -> Result<Box<dyn Iterator<Item = Result<u64, DbError>>>, DbError>
    where
        K: 'static,
    {
        let iter = query::execute(self.docs.clone(), self.index.clone(), filters)?;
        Ok(Box::new(iter.map(|r| r.map_err(DbError::from))))
    }

    pub fn stats(&self) -> Result<DbStats, DbError> {
        let count = self.docs.range(Bound::Unbounded, Bound::Unbounded)?.count() as u64;
        Ok(DbStats { document_count: count })
    }

    /// Forces buffered writes to durable storage.
    pub fn checkpoint(&self) -> Result<(), DbError> {
        self.docs.flush()?;
        self.index.flush()?;
        Ok(())
    }
}

impl Db<SledEngine> {
    /// Opens (or creates) a `sled`-backed database at `path`.
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self, DbError> {
        let engine = SledEngine::open(path, create_if_missing)?;
        Self::from_engine(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::mem::MemEngine;
    use serde_json::json;

    fn open() -> Db<MemEngine> {
        Db::from_engine(MemEngine::new()).unwrap()
    }

    #[test]
    fn create_then_read_roundtrips() {
        let db = open();
        let doc = json!({"name": "alice", "age": 30}).as_object().unwrap().clone();
        let uid = db.create(doc.clone()).unwrap();
        assert_eq!(db.read(uid).unwrap(), Some(doc));
    }

    #[test]
    fn read_of_missing_uid_is_none() {
        let db = open();
        assert_eq!(db.read(999).unwrap(), None);
    }

    #[test]
    fn delete_removes_document_and_index_entries() {
        let db = open();
        let doc = json!({"name": "alice"}).as_object().unwrap().clone();
        let uid = db.create(doc).unwrap();
        db.delete(uid).unwrap();
        assert_eq!(db.read(uid).unwrap(), None);

        let results: Vec<u64> = db
            .query(vec![("name".to_string(), json!("alice"))])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn delete_of_missing_uid_is_not_an_error() {
        let db = open();
        assert!(db.delete(42).is_ok());
    }

    #[test]
    fn update_reindexes_dropped_and_added_fields() {
        let db = open();
        let doc = json!({"name": "alice", "age": 30}).as_object().unwrap().clone();
        let uid = db.create(doc).unwrap();

        let replacement = json!({"name": "alice", "city": "nyc"}).as_object().unwrap().clone();
        db.update(uid, replacement.clone()).unwrap();
        assert_eq!(db.read(uid).unwrap(), Some(replacement));

        let by_age: Vec<u64> = db.query(vec![("age".to_string(), json!(30))]).unwrap().collect::<Result<_, _>>().unwrap();
        assert!(by_age.is_empty());

        let by_city: Vec<u64> = db.query(vec![("city".to_string(), json!("nyc"))]).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(by_city, vec![uid]);
    }

    #[test]
    fn update_on_unknown_uid_creates_it() {
        let db = open();
        let doc = json!({"name": "new"}).as_object().unwrap().clone();
        db.update(7, doc.clone()).unwrap();
        assert_eq!(db.read(7).unwrap(), Some(doc));
    }

    #[test]
    fn stats_counts_documents() {
        let db = open();
        assert_eq!(db.stats().unwrap().document_count, 0);
        db.create(json!({"a": 1}).as_object().unwrap().clone()).unwrap();
        db.create(json!({"b": 2}).as_object().unwrap().clone()).unwrap();
        assert_eq!(db.stats().unwrap().document_count, 2);
    }

    #[test]
    fn checkpoint_is_idempotent_and_infallible_for_mem_engine() {
        let db = open();
        db.checkpoint().unwrap();
        db.checkpoint().unwrap();
    }
}
