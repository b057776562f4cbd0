//! Identifier allocation: uids are sampled uniformly from a 63-bit space
//! rather than handed out sequentially, so two replicas (or two processes
//! racing to create a document) can't collide on a predictable counter.
//! Collisions are handled by re-rolling against a bounded retry budget
//! instead of growing the key unboundedly.

use rand::Rng;

use crate::errors::{AllocError, StorageError};
use crate::keyspace::UID_BOUND;

/// Past this many collisions in a row, the keyspace is considered too
/// dense to keep retrying cheaply.
const MAX_ATTEMPTS: u32 = 64;

/// Samples a uid from `[0, UID_BOUND)`, retrying while `exists` reports the
/// candidate is already taken, up to `MAX_ATTEMPTS` times.
pub fn allocate_uid(mut exists: impl FnMut(u64) -> Result<bool, StorageError>) -> Result<u64, AllocError> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let candidate: u64 = rng.gen_range(0..UID_BOUND);
        if !exists(candidate)? {
            return Ok(candidate);
        }
    }
    Err(AllocError::Exhausted)
}
