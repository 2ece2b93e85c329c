use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Buffer::{Registered, RingBuffer};
use crate::error::{Result, RingError};
use crate::Core::alloc::SlotStore;
use crate::Core::sequence::{min_sequence, Sequence};
use crate::Ring::barrier::SequenceBarrier;
use crate::Ring::claim::ClaimStrategy;
use crate::Ring::consumer::Consumer;
use crate::Ring::producer::{Claim, Producer};
use crate::Ring::Structs::Buffer_Structs::SequenceRange;
use crate::Ring::wait::WaitStrategy;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::OnceLock;

impl<C: ClaimStrategy, W: WaitStrategy> RingBuffer<C, W> {
    /// Compose a ring from its parts. `claim` must have been created for
    /// `store.capacity()` slots; the builder guarantees this.
    pub(crate) fn new(store: SlotStore, claim: C, wait: W) -> Self {
        Self {
            store,
            claim,
            wait,
            alert: CachePadded::new(AtomicBool::new(false)),
            registry: Mutex::new(Default::default()),
            gating: OnceLock::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    #[inline]
    pub fn slot_size(&self) -> usize {
        self.store.slot_size()
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn claim_strategy(&self) -> &C {
        &self.claim
    }

    pub fn wait_strategy(&self) -> &W {
        &self.wait
    }

    /// The producer cursor consumers gate on (see `ClaimStrategy::cursor`).
    #[inline]
    pub fn cursor(&self) -> i64 {
        self.claim.cursor().get()
    }

    /// Highest sequence handed out to any producer.
    #[inline]
    pub fn claimed(&self) -> i64 {
        self.claim.claimed()
    }

    /// Slots a producer could claim right now without waiting.
    pub fn remaining_capacity(&self) -> usize {
        let claimed = self.claim.claimed();
        let consumed = min_sequence(self.gating_sequences(), claimed);
        let in_use = (claimed - consumed).max(0) as usize;
        self.capacity().saturating_sub(in_use)
    }

    // ---------------------------------------------------------------------
    // Consumers and gating
    // ---------------------------------------------------------------------

    /// Register a consumer whose barrier waits on the producer cursor and on
    /// every sequence in `dependencies` (each must belong to a consumer
    /// already registered on this ring).
    ///
    /// Fails once any producer has claimed: the gating set is fixed by then.
    pub fn register_consumer(
        self: &Arc<Self>,
        dependencies: &[&Arc<Sequence>],
    ) -> Result<Consumer<C, W>> {
        self.register(None, dependencies.iter().map(|s| Arc::clone(*s)).collect())
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        name: Option<&str>,
        dependencies: Vec<Arc<Sequence>>,
    ) -> Result<Consumer<C, W>> {
        let mut registry = self.registry.lock();
        if registry.frozen {
            return Err(RingError::config(
                "consumers must be registered before the first claim",
            ));
        }

        for dep in &dependencies {
            let upstream = registry
                .consumers
                .iter_mut()
                .find(|c| Arc::ptr_eq(&c.sequence, dep))
                .ok_or_else(|| {
                    RingError::config("dependency is not a consumer registered on this ring")
                })?;
            upstream.has_dependents = true;
        }

        let sequence = Arc::new(Sequence::default());
        registry.consumers.push(Registered {
            name: name.map(str::to_owned),
            sequence: Arc::clone(&sequence),
            has_dependents: false,
        });
        let total = registry.consumers.len();
        drop(registry);

        tracing::debug!(
            consumer = name.unwrap_or("<unnamed>"),
            dependencies = dependencies.len(),
            total,
            "registered consumer"
        );

        let barrier = SequenceBarrier::new(Arc::clone(self), dependencies);
        Ok(Consumer::new(barrier, sequence, name.map(str::to_owned)))
    }

    /// A barrier on the producer cursor and `dependencies`, without a
    /// sequence of its own. Its holder does not gate producers.
    pub fn new_barrier(self: &Arc<Self>, dependencies: &[&Arc<Sequence>]) -> SequenceBarrier<C, W> {
        SequenceBarrier::new(
            Arc::clone(self),
            dependencies.iter().map(|s| Arc::clone(*s)).collect(),
        )
    }

    /// Number of registered consumers.
    pub fn consumer_count(&self) -> usize {
        self.registry.lock().consumers.len()
    }

    /// Name of every registered consumer, in registration order.
    pub fn consumer_names(&self) -> Vec<Option<String>> {
        self.registry
            .lock()
            .consumers
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Sequences producers stay behind: every consumer nothing else depends
    /// on. Downstream consumers never pass their upstreams, so the leaves
    /// bound everyone. Freezes registration on first call.
    pub fn gating_sequences(&self) -> &[Arc<Sequence>] {
        self.gating.get_or_init(|| {
            let mut registry = self.registry.lock();
            registry.frozen = true;
            let leaves: Box<[Arc<Sequence>]> = registry
                .consumers
                .iter()
                .filter(|c| !c.has_dependents)
                .map(|c| Arc::clone(&c.sequence))
                .collect();
            tracing::debug!(
                consumers = registry.consumers.len(),
                gating = leaves.len(),
                "froze gating set"
            );
            leaves
        })
    }

    // ---------------------------------------------------------------------
    // Producer side
    // ---------------------------------------------------------------------

    /// A cloneable send handle over this ring.
    pub fn producer(self: &Arc<Self>) -> Producer<C, W> {
        Producer::new(Arc::clone(self))
    }

    fn check_claim(&self, n: usize) -> Result<i64> {
        if n == 0 {
            return Err(RingError::config("claim must reserve at least one slot"));
        }
        if n > self.capacity() {
            return Err(RingError::CapacityExceeded {
                requested: n,
                capacity: self.capacity(),
            });
        }
        if self.is_shutdown() {
            return Err(RingError::Cancelled);
        }
        Ok(n as i64)
    }

    /// Reserve `n` consecutive slots, blocking while the ring is full.
    pub fn claim(&self, n: usize) -> Result<Claim<'_, C, W>> {
        self.claim_until(n, None)
    }

    /// As `claim`, giving up with `Timeout` after `timeout`.
    pub fn claim_timeout(&self, n: usize, timeout: Duration) -> Result<Claim<'_, C, W>> {
        self.claim_until(n, Some(Instant::now() + timeout))
    }

    fn claim_until(&self, n: usize, deadline: Option<Instant>) -> Result<Claim<'_, C, W>> {
        let n = self.check_claim(n)?;
        let gating = self.gating_sequences();
        let high = self
            .claim
            .next(n, gating, &self.wait, &self.alert, deadline)?;
        Ok(Claim::new(self, SequenceRange::ending_at(high, n)))
    }

    /// Reserve `n` slots only if they are free right now.
    pub fn try_claim(&self, n: usize) -> Result<Option<Claim<'_, C, W>>> {
        let n = self.check_claim(n)?;
        let gating = self.gating_sequences();
        Ok(self
            .claim
            .try_next(n, gating)?
            .map(|high| Claim::new(self, SequenceRange::ending_at(high, n))))
    }

    /// Publish a claim taken from this ring. Same as `Claim::publish`.
    pub fn publish(&self, claim: Claim<'_, C, W>) {
        debug_assert!(claim.belongs_to(self), "claim published on a different ring");
        claim.publish();
    }

    pub(crate) fn publish_range(&self, range: SequenceRange) {
        self.claim.publish(range.low, range.high);
        self.wait.signal_all();
    }

    /// A claim was dropped without publishing. The range can never be
    /// filled in, so consumers would stall on it forever: stop the ring.
    pub(crate) fn abort_range(&self, range: SequenceRange) {
        self.claim.abort(range.low, range.high);
        tracing::error!(
            low = range.low,
            high = range.high,
            "claim dropped without publish; shutting ring down"
        );
        self.shutdown();
    }

    // ---------------------------------------------------------------------
    // Raw access
    // ---------------------------------------------------------------------

    /// Read view of a slot with no gating check.
    ///
    /// # Safety
    /// The caller must know `sequence` is published and that no producer can
    /// reclaim the slot while the view lives.
    #[inline]
    pub unsafe fn slot_unchecked(&self, sequence: i64) -> &[u8] {
        self.store.read(sequence)
    }

    /// Write view of a slot with no claim check.
    ///
    /// # Safety
    /// The caller must own `sequence` exclusively and publish it afterwards.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_unchecked_mut(&self, sequence: i64) -> &mut [u8] {
        self.store.slot_mut(sequence)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Raise the alert: every blocked and future claim or wait fails with
    /// `Cancelled`. Idempotent.
    pub fn shutdown(&self) {
        if !self.alert.swap(true, Release) {
            tracing::info!(cursor = self.cursor(), "ring buffer shut down");
        }
        self.wait.signal_all();
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.alert.load(Acquire)
    }

    /// Flush a mapped store to its file.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Tear the ring down. Succeeds only when `ring` is the last handle;
    /// otherwise returns `InUse` with the number of other handles and leaves
    /// the ring running. Mapped stores are flushed before unmapping.
    pub fn close(ring: Arc<Self>) -> Result<()> {
        match Arc::try_unwrap(ring) {
            Ok(ring) => {
                ring.alert.store(true, Release);
                ring.store.flush()?;
                tracing::info!(
                    cursor = ring.cursor(),
                    mapped = ring.store.is_mapped(),
                    "ring buffer closed"
                );
                Ok(())
            }
            Err(ring) => Err(RingError::InUse(Arc::strong_count(&ring) - 1)),
        }
    }
}
