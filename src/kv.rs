//! The embedded ordered key-value engine contract.
//!
//! The storage engine and query executor depend only on this trait, never
//! on a concrete backend — exactly the abstract "ordered byte-store with
//! prefix sub-views, point get/put/delete, and forward range iteration"
//! the rest of the system is specified against. [`SledEngine`] is the
//! production backend; [`mem::MemEngine`] is an in-memory stand-in used by
//! unit tests that would otherwise pay for a temp-dir `sled` instance on
//! every case.

use std::ops::Bound;

use crate::errors::StorageError;

/// A forward, lazily-evaluated sequence of key/value pairs in ascending
/// byte order.
pub type RangeIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StorageError>> + 'a>;

pub trait KvEngine: Clone + Send + Sync + Sized {
    /// Returns a sub-view in which keys are logically namespaced under
    /// `prefix`, disjoint from every other prefix opened on the same
    /// handle.
    fn prefixed(&self, prefix: &[u8]) -> Result<Self, StorageError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Forward iteration over `[start, stop)`. `Bound::Unbounded` on either
    /// side scans to the beginning/end of the sub-view.
    fn range(&self, start: Bound<Vec<u8>>, stop: Bound<Vec<u8>>) -> Result<RangeIter<'_>, StorageError>;

    /// Flushes buffered writes to durable storage. A no-op for engines that
    /// have nothing to buffer.
    fn flush(&self) -> Result<(), StorageError>;
}

mod sled_engine {
    use std::ops::Bound;
    use std::path::Path;

    use super::{KvEngine, RangeIter};
    use crate::errors::StorageError;

    /// `sled` is this pack's own idiomatic choice for an embedded ordered
    /// KV store (see `ankurah-storage-sled`): an LSM-style store whose
    /// `Tree` type already provides point get/put/remove and ordered range
    /// scans, so the contract in this module is close to a direct
    /// pass-through. One `sled::Tree` per prefix gives the "disjoint
    /// subspace" semantics the `docs:`/`index:` split needs without any
    /// manual key-prefixing or stripping.
    #[derive(Clone)]
    pub struct SledEngine {
        db: sled::Db,
        tree: sled::Tree,
    }

    impl SledEngine {
        pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self, StorageError> {
            let path = path.as_ref();
            if !create_if_missing && !path.exists() {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("database path {} does not exist", path.display()),
                )));
            }
            let db = sled::open(path)?;
            let tree = db.open_tree("root")?;
            Ok(Self { db, tree })
        }

        /// An ephemeral, temp-dir-backed instance for tests.
        #[cfg(test)]
        pub fn temporary() -> Result<Self, StorageError> {
            let db = sled::Config::new().temporary(true).open()?;
            let tree = db.open_tree("root")?;
            Ok(Self { db, tree })
        }
    }

    impl KvEngine for SledEngine {
        fn prefixed(&self, prefix: &[u8]) -> Result<Self, StorageError> {
            let tree = self.db.open_tree(prefix)?;
            Ok(Self { db: self.db.clone(), tree })
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(self.tree.get(key)?.map(|v| v.to_vec()))
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
            self.tree.insert(key, value)?;
            Ok(())
        }

        fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
            self.tree.remove(key)?;
            Ok(())
        }

        fn range(&self, start: Bound<Vec<u8>>, stop: Bound<Vec<u8>>) -> Result<RangeIter<'_>, StorageError> {
            let iter = self.tree.range((start, stop)).map(|item| {
                let (k, v) = item?;
                Ok((k.to_vec(), v.to_vec()))
            });
            Ok(Box::new(iter))
        }

        fn flush(&self) -> Result<(), StorageError> {
            self.tree.flush()?;
            Ok(())
        }
    }
}

pub use sled_engine::SledEngine;

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use super::sled_engine::SledEngine;
    use super::KvEngine;

    fn exercise(engine: impl KvEngine) {
        let docs = engine.prefixed(b"docs:").unwrap();
        let index = engine.prefixed(b"index:").unwrap();

        docs.put(b"\x01", b"hello").unwrap();
        index.put(b"\x01", b"").unwrap();

        assert_eq!(docs.get(b"\x01").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(index.get(b"\x01").unwrap(), Some(Vec::new()));
        assert_eq!(docs.get(b"\x02").unwrap(), None);

        docs.delete(b"\x01").unwrap();
        assert_eq!(docs.get(b"\x01").unwrap(), None);
        // Deleting from docs: must not have touched index:'s own copy of the
        // same raw key — they are disjoint subspaces.
        assert_eq!(index.get(b"\x01").unwrap(), Some(Vec::new()));

        for key in [b"\x01", b"\x02", b"\x03"] {
            docs.put(key, b"v").unwrap();
        }
        let scanned: Vec<Vec<u8>> =
            docs.range(Bound::Unbounded, Bound::Unbounded).unwrap().map(|item| item.unwrap().0).collect();
        assert_eq!(scanned, vec![b"\x01".to_vec(), b"\x02".to_vec(), b"\x03".to_vec()]);

        engine.flush().unwrap();
    }

    #[test]
    fn mem_engine_prefix_isolation_and_ordered_range() {
        exercise(super::mem::MemEngine::new());
    }

    #[test]
    fn sled_engine_prefix_isolation_and_ordered_range() {
        exercise(SledEngine::temporary().unwrap());
    }
}

pub mod mem {
    //! An in-memory [`KvEngine`] backed by a `BTreeMap`. Exists purely so
    //! codec/storage unit tests don't each need a temp directory.

    use std::collections::{BTreeMap, HashMap};
    use std::ops::Bound;
    use std::sync::{Arc, Mutex};

    use super::{KvEngine, RangeIter};
    use crate::errors::StorageError;

    type Tree = Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>;

    #[derive(Clone)]
    pub struct MemEngine {
        trees: Arc<Mutex<HashMap<Vec<u8>, Tree>>>,
        tree: Tree,
    }

    impl MemEngine {
        pub fn new() -> Self {
            Self { trees: Arc::new(Mutex::new(HashMap::new())), tree: Arc::new(Mutex::new(BTreeMap::new())) }
        }
    }

    impl Default for MemEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl KvEngine for MemEngine {
        fn prefixed(&self, prefix: &[u8]) -> Result<Self, StorageError> {
            let mut trees = self.trees.lock().unwrap();
            let tree = trees.entry(prefix.to_vec()).or_insert_with(|| Arc::new(Mutex::new(BTreeMap::new()))).clone();
            Ok(Self { trees: self.trees.clone(), tree })
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(self.tree.lock().unwrap().get(key).cloned())
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
            self.tree.lock().unwrap().insert(key.to_vec(), value.to_vec());
            Ok(())
        }

        fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
            self.tree.lock().unwrap().remove(key);
            Ok(())
        }

        fn range(&self, start: Bound<Vec<u8>>, stop: Bound<Vec<u8>>) -> Result<RangeIter<'_>, StorageError> {
            let tree = self.tree.lock().unwrap();
            let items: Vec<_> = tree.range((start, stop)).map(|(k, v)| Ok((k.clone(), v.clone()))).collect();
            Ok(Box::new(items.into_iter()))
        }

        fn flush(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }
}
