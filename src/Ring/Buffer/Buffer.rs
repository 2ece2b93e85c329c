// The ring buffer: slot storage composed with a claim strategy, a wait
// strategy and the registered consumer sequences.

use crate::Core::alloc::SlotStore;
use crate::Core::sequence::Sequence;
use crate::Ring::claim::{ClaimStrategy, SingleProducer};
use crate::Ring::wait::{BlockingWait, WaitStrategy};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

/// A fixed-capacity ring of fixed-size slots shared by producers and
/// consumers.
///
/// ### Concurrency Design:
/// - **Producers** reserve ranges through the claim strategy `C`, write into
///   the reserved slots through a [`Claim`](crate::Ring::Claim) guard and
///   publish. Publishing is a release store (single producer) or a run of
///   release stores into per-slot availability flags (multi producer).
/// - **Consumers** each own a [`Sequence`] and a
///   [`SequenceBarrier`](crate::Ring::SequenceBarrier). The barrier reports
///   the highest sequence that is published and already processed by every
///   upstream dependency.
/// - **Backpressure**: a producer never claims more than `capacity` past the
///   slowest gating consumer. The gating set is frozen by the first claim.
/// - **Blocking** in either direction goes through the wait strategy `W`;
///   no lock is shared with the fast path.
///
/// The ring is used through an `Arc`. Consumers must be registered before
/// the first claim.
pub struct RingBuffer<C: ClaimStrategy = SingleProducer, W: WaitStrategy = BlockingWait> {
    /// Slot storage; the single owner of the backing memory.
    pub(crate) store: SlotStore,

    /// Producer sequencing.
    pub(crate) claim: C,

    /// How blocked producers and consumers wait.
    pub(crate) wait: W,

    /// Raised by `shutdown`; every wait checks it.
    pub(crate) alert: CachePadded<AtomicBool>,

    /// Consumers registered so far. Only touched during setup.
    pub(crate) registry: Mutex<Registry>,

    /// Sequences the producer stays behind, fixed on first claim.
    pub(crate) gating: OnceLock<Box<[Arc<Sequence>]>>,
}

/// Setup-time bookkeeping of consumers and their dependency edges.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) consumers: Vec<Registered>,
    /// Set when the gating set is taken; no registration after that.
    pub(crate) frozen: bool,
}

pub(crate) struct Registered {
    pub(crate) name: Option<String>,
    pub(crate) sequence: Arc<Sequence>,
    /// Some other consumer waits on this one.
    pub(crate) has_dependents: bool,
}

impl<C: ClaimStrategy, W: WaitStrategy> std::fmt::Debug for RingBuffer<C, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_ring_buffer(self, f)
    }
}
