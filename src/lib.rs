//! A schemaless document database over an order-preserving tuple codec and
//! an embedded ordered key-value store. See `SPEC_FULL.md` for the full
//! design; in short: documents are JSON objects keyed by a randomly
//! allocated uid, every top-level scalar field is secondary-indexed for
//! conjunctive equality queries, and the whole thing sits on one `sled`
//! instance split into a `docs:` and an `index:` sub-view.

pub mod alloc;
pub mod document;
pub mod errors;
pub mod http;
pub mod keyspace;
pub mod kv;
pub mod query;
pub mod storage;
pub mod tuple;

pub use errors::DbError;
pub use storage::{Db, DbStats};
