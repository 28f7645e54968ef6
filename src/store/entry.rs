use crate::pool::ThreadPool;
use crate::types::Value;
use std::sync::OnceLock;
use std::time::Instant;

/// Sorted sets at or above this member count are dropped on the worker
/// pool instead of the event-loop thread.
pub const LARGE_SET_LEN: usize = 1024;

/// An entry in the key index: a value plus its TTL bookkeeping.
#[derive(Debug)]
pub struct Entry {
    pub value: Value,
    /// Current position of this entry's pending expiration in the TTL
    /// heap, or `None` when no TTL is set. The heap keeps this in sync on
    /// every internal move.
    pub ttl_slot: Option<usize>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Entry {
            value,
            ttl_slot: None,
        }
    }

    /// Whether teardown is expensive enough to offload to the pool.
    pub fn is_large(&self) -> bool {
        match &self.value {
            Value::String(_) => false,
            Value::SortedSet(set) => set.len() >= LARGE_SET_LEN,
        }
    }
}

/// Release an entry. Large entries move to the pool so the event loop
/// never pays for an expensive teardown; the loop thread must not touch
/// the entry afterwards.
pub fn dispose(entry: Entry, pool: &ThreadPool) {
    if entry.is_large() {
        pool.execute(move || drop(entry));
    }
}

/// Monotonic microseconds since process start. Wall-clock time never
/// enters protocol semantics.
pub fn mono_now_us() -> u64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_micros() as u64
}
