use std::fmt;
use crate::Core::alloc::SlotStore;
use crate::Core::sequence::Sequence;
use crate::Ring::Buffer::RingBuffer;
use crate::Ring::claim::ClaimStrategy;
use crate::Ring::wait::WaitStrategy;

/// Debug function for Sequence
///
/// Shows the current value only; the padding is not interesting.
pub fn debug_sequence(sequence: &Sequence, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Sequence").field(&sequence.get()).finish()
}

/// Debug function for SlotStore
///
/// Shows:
/// - Geometry (capacity, slot size)
/// - Slot region size
/// - Backing kind
///
/// Slot contents are never printed.
pub fn debug_slot_store(store: &SlotStore, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlotStore")
        .field("capacity", &store.capacity())
        .field("slot_size", &store.slot_size())
        .field("bytes", &store.byte_len())
        .field("backing", &store.raw_handle())
        .finish_non_exhaustive()
}

/// Debug function for RingBuffer
///
/// Reads the cursors with acquire loads; values may be stale by the time
/// they are printed.
pub fn debug_ring_buffer<C: ClaimStrategy, W: WaitStrategy>(
    ring: &RingBuffer<C, W>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("store", &ring.store())
        .field("producer", &ring.claim_strategy().kind())
        .field("wait", &ring.wait_strategy().name())
        .field("cursor", &ring.cursor())
        .field("claimed", &ring.claimed())
        .field("consumers", &ring.consumer_count())
        .field("shutdown", &ring.is_shutdown())
        .finish()
}
