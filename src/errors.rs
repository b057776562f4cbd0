use thiserror::Error;

/// Errors raised while decoding a tuple-codec byte string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown type tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("truncated payload at offset {0}")]
    Truncated(usize),

    #[error("invalid utf-8 in string payload")]
    InvalidUtf8,

    #[error("malformed versionstamp payload")]
    BadVersionstamp,
}

/// Errors raised while encoding a value into the tuple codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unsupported value type for tuple encoding")]
    UnsupportedType,

    #[error("tuple must contain exactly one incomplete versionstamp for this pack variant")]
    VersionstampArity,
}

/// Errors surfaced by the storage engine, wrapping whatever the underlying
/// KV engine reports plus the document (de)serialization boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("kv backend error: {0}")]
    KvBackend(#[from] sled::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tuple decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("tuple encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("corrupt document at uid {uid}: {reason}")]
    CorruptDocument { uid: u64, reason: String },
}

/// Errors raised by the query executor.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("filter value for field {0:?} is not encodable by the tuple codec")]
    UnencodableFilter(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by the identifier allocator.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("exhausted retry budget looking for a free uid")]
    Exhausted,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Umbrella error returned by every public [`crate::storage::Db`] operation,
/// aggregating the leaf error types from each subsystem it calls into.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// HTTP-layer-only errors, mapped to 400/404 by the transport; anything else
/// bubbles up and is mapped to 500.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
