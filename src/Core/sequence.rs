use crossbeam_utils::CachePadded;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Release};
use std::sync::Arc;

/// Value of every sequence before anything has been published or consumed.
pub const INITIAL_SEQUENCE: i64 = -1;

/// A monotonically advancing 64-bit cursor on its own cache line.
///
/// Used as the producer cursor and as each consumer's read cursor.
/// `set` is a release store and `get` an acquire load: a thread that observes
/// a value written by `set` also observes every write the setter made before
/// it. That pairing is what makes published slot bytes visible to consumers.
///
/// `CachePadded` aligns the counter to 128 bytes on x86_64 and aarch64 so the
/// producer cursor and consumer cursors never share a line.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    pub fn new(initial: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial)),
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Acquire)
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Release);
    }

    /// Atomically replaces `expected` with `value`. Returns whether it did.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, value: i64) -> bool {
        self.value
            .compare_exchange(expected, value, AcqRel, Acquire)
            .is_ok()
    }

    /// Adds `delta` and returns the previous value.
    #[inline]
    pub fn get_and_add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, AcqRel)
    }

    /// Adds `delta` and returns the new value.
    #[inline]
    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, AcqRel) + delta
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_sequence(self, f)
    }
}

/// Smallest value among `sequences`, or `default` when the slice is empty.
#[inline]
pub fn min_sequence(sequences: &[Arc<Sequence>], default: i64) -> i64 {
    sequences
        .iter()
        .map(|s| s.get())
        .min()
        .unwrap_or(default)
}
