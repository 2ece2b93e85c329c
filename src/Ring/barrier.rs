use crate::error::{Result, RingError};
use crate::Core::sequence::{min_sequence, Sequence, INITIAL_SEQUENCE};
use crate::Ring::claim::ClaimStrategy;
use crate::Ring::wait::WaitStrategy;
use crate::Ring::Buffer::Buffer::RingBuffer;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tells a consumer how far it may read.
///
/// A sequence is available once the producer has published it and every
/// upstream dependency has advanced past it. On a multi-producer ring the
/// barrier also scans the availability flags so a later publish never
/// exposes an earlier, still-unpublished slot. The scan always starts at the
/// lowest sequence the caller has not yet seen confirmed.
pub struct SequenceBarrier<C: ClaimStrategy, W: WaitStrategy> {
    ring: Arc<RingBuffer<C, W>>,
    dependencies: Box<[Arc<Sequence>]>,
    /// Highest sequence this barrier has reported as available.
    confirmed: Sequence,
}

impl<C: ClaimStrategy, W: WaitStrategy> SequenceBarrier<C, W> {
    pub(crate) fn new(ring: Arc<RingBuffer<C, W>>, dependencies: Vec<Arc<Sequence>>) -> Self {
        Self {
            ring,
            dependencies: dependencies.into_boxed_slice(),
            confirmed: Sequence::default(),
        }
    }

    pub fn ring(&self) -> &Arc<RingBuffer<C, W>> {
        &self.ring
    }

    pub fn dependencies(&self) -> &[Arc<Sequence>] {
        &self.dependencies
    }

    /// `min(producer cursor, dependencies)` without the published-prefix
    /// check.
    #[inline]
    pub fn cursor(&self) -> i64 {
        let cursor = self.ring.claim.cursor().get();
        min_sequence(&self.dependencies, cursor).min(cursor)
    }

    /// Highest sequence `>= from - 1` readable right now.
    #[inline]
    fn probe(&self, from: i64) -> i64 {
        let raw = self.cursor();
        if raw < from {
            return raw;
        }
        self.ring.claim.highest_published(from, raw)
    }

    /// Non-blocking: the highest sequence readable right now, scanning the
    /// published prefix from `from`.
    pub fn available_from(&self, from: i64) -> i64 {
        self.probe(from)
    }

    /// First sequence whose publication this barrier has not confirmed.
    fn scan_start(&self) -> i64 {
        // Dependencies only reach published sequences, and nothing older than
        // one lap behind the cursor can still be pending.
        let floor = if self.dependencies.is_empty() {
            self.ring.claim.cursor().get() - self.ring.capacity() as i64
        } else {
            min_sequence(&self.dependencies, INITIAL_SEQUENCE)
        };
        floor.max(self.confirmed.get()) + 1
    }

    fn confirm(&self, available: i64) {
        let mut current = self.confirmed.get();
        while available > current && !self.confirmed.compare_and_set(current, available) {
            current = self.confirmed.get();
        }
    }

    /// Non-blocking: the highest sequence every reader of this barrier may
    /// consume right now.
    pub fn available(&self) -> i64 {
        let available = self.probe(self.scan_start().max(0));
        self.confirm(available);
        available
    }

    /// Block until `target` is available. Returns the highest available
    /// sequence, which may be past `target`.
    pub fn wait_for(&self, target: i64) -> Result<i64> {
        let available = self.wait_from(self.scan_start().max(0), target, None)?;
        self.confirm(available);
        Ok(available)
    }

    /// As `wait_for`, failing with `Timeout` after `timeout`.
    pub fn wait_for_timeout(&self, target: i64, timeout: Duration) -> Result<i64> {
        let deadline = Some(Instant::now() + timeout);
        let available = self.wait_from(self.scan_start().max(0), target, deadline)?;
        self.confirm(available);
        Ok(available)
    }

    /// Wait until every sequence in `from..=target` is published and past the
    /// dependencies. Everything before `from` must already be known readable.
    pub(crate) fn wait_from(
        &self,
        from: i64,
        target: i64,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        if self.ring.is_shutdown() {
            return Err(RingError::Cancelled);
        }
        let available = self.probe(from);
        if available >= target {
            return Ok(available);
        }
        self.ring
            .wait
            .wait_until(target, || self.probe(from), &self.ring.alert, deadline)
    }

    pub fn is_alerted(&self) -> bool {
        self.ring.is_shutdown()
    }

    /// Shut the whole ring down, waking every waiter.
    pub fn alert(&self) {
        self.ring.shutdown();
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> Clone for SequenceBarrier<C, W> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
            dependencies: self.dependencies.clone(),
            confirmed: Sequence::new(self.confirmed.get()),
        }
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> std::fmt::Debug for SequenceBarrier<C, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBarrier")
            .field("cursor", &self.cursor())
            .field("dependencies", &self.dependencies.len())
            .field("alerted", &self.is_alerted())
            .finish()
    }
}
