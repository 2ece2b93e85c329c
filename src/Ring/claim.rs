//! Claim strategies: how producers reserve sequence ranges.
//!
//! - `SingleProducer` - one producer thread, no CAS, batch publish is one store
//! - `MultiProducer` - CAS-reserved ranges, per-slot availability flags so
//!   out-of-order publishes never expose a gap
//! - `AnyClaim` - one of the two chosen at runtime from a `ProducerKind`

use crate::error::{Result, RingError};
use crate::Core::sequence::{min_sequence, Sequence};
use crate::Ring::wait::WaitStrategy;
use crossbeam_utils::CachePadded;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::atomic::{AtomicBool, AtomicI32};
use std::sync::Arc;
use std::time::Instant;

/// Producer-side sequencing.
///
/// Callers validate `n` (1..=capacity) before calling `next`/`try_next`.
pub trait ClaimStrategy: Send + Sync + 'static {
    /// The sequence consumers gate on. For single-producer rings this is the
    /// highest published sequence; for multi-producer rings it is the highest
    /// claimed one and barriers consult `highest_published` on top of it.
    fn cursor(&self) -> &Sequence;

    /// Highest sequence handed out to a producer so far.
    fn claimed(&self) -> i64;

    /// Reserve `n` sequences, waiting for the slowest gating sequence to make
    /// room. Returns the high end of the range. On error nothing is reserved.
    fn next<W: WaitStrategy>(
        &self,
        n: i64,
        gating: &[Arc<Sequence>],
        wait: &W,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>;

    /// Reserve `n` sequences only if there is room right now.
    fn try_next(&self, n: i64, gating: &[Arc<Sequence>]) -> Result<Option<i64>>;

    /// Make `[low, high]` visible to consumers.
    fn publish(&self, low: i64, high: i64);

    /// Give up on `[low, high]` without publishing it.
    fn abort(&self, low: i64, high: i64);

    /// Highest sequence in `[low, available]` such that every sequence from
    /// `low` up to it is published; `low - 1` if `low` itself is not.
    fn highest_published(&self, low: i64, available: i64) -> i64;

    fn is_available(&self, sequence: i64) -> bool;

    fn kind(&self) -> ProducerKind;
}

/// Producer arity selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerKind {
    #[default]
    Single,
    Multi,
}

/// Claim strategy for exactly one producer thread.
///
/// At most one claim may be in flight: the flag is taken in `next` and
/// released by `publish`/`abort`. A second concurrent claim is rejected
/// instead of silently handing out overlapping slots.
pub struct SingleProducer {
    capacity: i64,
    cursor: Sequence,
    next_value: Sequence,
    cached_gating: Sequence,
    in_flight: CachePadded<AtomicBool>,
}

impl SingleProducer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity as i64,
            cursor: Sequence::default(),
            next_value: Sequence::default(),
            cached_gating: Sequence::default(),
            in_flight: CachePadded::new(AtomicBool::new(false)),
        }
    }

    fn enter(&self) -> Result<()> {
        if self.in_flight.swap(true, Acquire) {
            return Err(RingError::config(
                "single-producer ring already has a claim in flight",
            ));
        }
        Ok(())
    }

    fn leave(&self) {
        self.in_flight.store(false, Release);
    }
}

impl ClaimStrategy for SingleProducer {
    fn cursor(&self) -> &Sequence {
        &self.cursor
    }

    fn claimed(&self) -> i64 {
        self.next_value.get()
    }

    fn next<W: WaitStrategy>(
        &self,
        n: i64,
        gating: &[Arc<Sequence>],
        wait: &W,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        self.enter()?;

        let current = self.next_value.get();
        let high = current + n;
        let wrap_point = high - self.capacity;
        let cached = self.cached_gating.get();

        if wrap_point > cached || cached > current {
            let min = match wait.wait_until(
                wrap_point,
                || min_sequence(gating, current),
                alert,
                deadline,
            ) {
                Ok(min) => min,
                Err(e) => {
                    self.leave();
                    return Err(e);
                }
            };
            self.cached_gating.set(min);
        }

        self.next_value.set(high);
        Ok(high)
    }

    fn try_next(&self, n: i64, gating: &[Arc<Sequence>]) -> Result<Option<i64>> {
        self.enter()?;

        let current = self.next_value.get();
        let high = current + n;
        let wrap_point = high - self.capacity;
        let cached = self.cached_gating.get();

        if wrap_point > cached || cached > current {
            let min = min_sequence(gating, current);
            if wrap_point > min {
                self.leave();
                return Ok(None);
            }
            self.cached_gating.set(min);
        }

        self.next_value.set(high);
        Ok(Some(high))
    }

    fn publish(&self, _low: i64, high: i64) {
        self.cursor.set(high);
        self.leave();
    }

    fn abort(&self, _low: i64, _high: i64) {
        self.leave();
    }

    fn highest_published(&self, _low: i64, available: i64) -> i64 {
        available
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get()
    }

    fn kind(&self) -> ProducerKind {
        ProducerKind::Single
    }
}

/// Claim strategy for any number of concurrent producers.
///
/// `available[i]` holds the lap (`sequence >> log2(capacity)`) of the last
/// sequence published into slot `i`, or -1 if the slot was never published.
pub struct MultiProducer {
    capacity: i64,
    cursor: Sequence,
    cached_gating: Sequence,
    available: Box<[AtomicI32]>,
    mask: usize,
    shift: u32,
}

impl MultiProducer {
    pub fn new(capacity: usize) -> Self {
        let available = (0..capacity)
            .map(|_| AtomicI32::new(-1))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            capacity: capacity as i64,
            cursor: Sequence::default(),
            cached_gating: Sequence::default(),
            available,
            mask: capacity - 1,
            shift: capacity.trailing_zeros(),
        }
    }

    #[inline]
    fn lap(&self, sequence: i64) -> i32 {
        (sequence >> self.shift) as i32
    }

    #[inline]
    fn flag(&self, sequence: i64) -> &AtomicI32 {
        &self.available[(sequence as usize) & self.mask]
    }
}

impl ClaimStrategy for MultiProducer {
    fn cursor(&self) -> &Sequence {
        &self.cursor
    }

    fn claimed(&self) -> i64 {
        self.cursor.get()
    }

    fn next<W: WaitStrategy>(
        &self,
        n: i64,
        gating: &[Arc<Sequence>],
        wait: &W,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        loop {
            let current = self.cursor.get();
            let high = current + n;
            let wrap_point = high - self.capacity;
            let cached = self.cached_gating.get();

            if wrap_point > cached || cached > current {
                let min = min_sequence(gating, current);
                if wrap_point > min {
                    wait.wait_until(
                        wrap_point,
                        || min_sequence(gating, current),
                        alert,
                        deadline,
                    )?;
                    continue;
                }
                self.cached_gating.set(min);
            } else if self.cursor.compare_and_set(current, high) {
                return Ok(high);
            }
        }
    }

    fn try_next(&self, n: i64, gating: &[Arc<Sequence>]) -> Result<Option<i64>> {
        loop {
            let current = self.cursor.get();
            let high = current + n;
            let wrap_point = high - self.capacity;
            let cached = self.cached_gating.get();

            if wrap_point > cached || cached > current {
                let min = min_sequence(gating, current);
                if wrap_point > min {
                    return Ok(None);
                }
                self.cached_gating.set(min);
            } else if self.cursor.compare_and_set(current, high) {
                return Ok(Some(high));
            }
        }
    }

    fn publish(&self, low: i64, high: i64) {
        for sequence in low..=high {
            self.flag(sequence).store(self.lap(sequence), Release);
        }
    }

    fn abort(&self, _low: i64, _high: i64) {}

    fn highest_published(&self, low: i64, available: i64) -> i64 {
        for sequence in low..=available {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
        }
        available
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence >= 0 && self.flag(sequence).load(Acquire) == self.lap(sequence)
    }

    fn kind(&self) -> ProducerKind {
        ProducerKind::Multi
    }
}

/// A claim strategy picked once from a `ProducerKind`.
pub enum AnyClaim {
    Single(SingleProducer),
    Multi(MultiProducer),
}

impl AnyClaim {
    pub fn new(kind: ProducerKind, capacity: usize) -> Self {
        match kind {
            ProducerKind::Single => AnyClaim::Single(SingleProducer::new(capacity)),
            ProducerKind::Multi => AnyClaim::Multi(MultiProducer::new(capacity)),
        }
    }

    pub fn single(capacity: usize) -> Self {
        Self::new(ProducerKind::Single, capacity)
    }

    pub fn multi(capacity: usize) -> Self {
        Self::new(ProducerKind::Multi, capacity)
    }
}

impl ClaimStrategy for AnyClaim {
    fn cursor(&self) -> &Sequence {
        match self {
            AnyClaim::Single(c) => c.cursor(),
            AnyClaim::Multi(c) => c.cursor(),
        }
    }

    fn claimed(&self) -> i64 {
        match self {
            AnyClaim::Single(c) => c.claimed(),
            AnyClaim::Multi(c) => c.claimed(),
        }
    }

    fn next<W: WaitStrategy>(
        &self,
        n: i64,
        gating: &[Arc<Sequence>],
        wait: &W,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        match self {
            AnyClaim::Single(c) => c.next(n, gating, wait, alert, deadline),
            AnyClaim::Multi(c) => c.next(n, gating, wait, alert, deadline),
        }
    }

    fn try_next(&self, n: i64, gating: &[Arc<Sequence>]) -> Result<Option<i64>> {
        match self {
            AnyClaim::Single(c) => c.try_next(n, gating),
            AnyClaim::Multi(c) => c.try_next(n, gating),
        }
    }

    fn publish(&self, low: i64, high: i64) {
        match self {
            AnyClaim::Single(c) => c.publish(low, high),
            AnyClaim::Multi(c) => c.publish(low, high),
        }
    }

    fn abort(&self, low: i64, high: i64) {
        match self {
            AnyClaim::Single(c) => c.abort(low, high),
            AnyClaim::Multi(c) => c.abort(low, high),
        }
    }

    fn highest_published(&self, low: i64, available: i64) -> i64 {
        match self {
            AnyClaim::Single(c) => c.highest_published(low, available),
            AnyClaim::Multi(c) => c.highest_published(low, available),
        }
    }

    fn is_available(&self, sequence: i64) -> bool {
        match self {
            AnyClaim::Single(c) => c.is_available(sequence),
            AnyClaim::Multi(c) => c.is_available(sequence),
        }
    }

    fn kind(&self) -> ProducerKind {
        match self {
            AnyClaim::Single(c) => c.kind(),
            AnyClaim::Multi(c) => c.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ring::wait::BusySpinWait;

    fn no_alert() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_multi_producer_stops_at_first_gap() {
        let claim = MultiProducer::new(8);
        let alert = no_alert();
        let first = claim.next(2, &[], &BusySpinWait, &alert, None).unwrap();
        let second = claim.next(2, &[], &BusySpinWait, &alert, None).unwrap();
        assert_eq!((first, second), (1, 3));

        // second range lands before the first
        claim.publish(2, 3);
        assert_eq!(claim.highest_published(0, claim.claimed()), -1);
        assert!(claim.is_available(2));
        assert!(!claim.is_available(0));

        claim.publish(0, 1);
        assert_eq!(claim.highest_published(0, claim.claimed()), 3);
    }

    #[test]
    fn test_multi_producer_flags_track_laps() {
        let claim = MultiProducer::new(4);
        let alert = no_alert();
        let high = claim.next(4, &[], &BusySpinWait, &alert, None).unwrap();
        claim.publish(0, high);
        assert!(claim.is_available(3));
        // slot 0 holds lap 0, so sequence 4 (lap 1) is not yet published
        assert!(!claim.is_available(4));
    }

    #[test]
    fn test_single_producer_rejects_second_claim_in_flight() {
        let claim = SingleProducer::new(8);
        let alert = no_alert();
        let high = claim.next(1, &[], &BusySpinWait, &alert, None).unwrap();
        assert!(matches!(
            claim.next(1, &[], &BusySpinWait, &alert, None),
            Err(RingError::Configuration(_))
        ));
        claim.publish(high, high);
        assert_eq!(claim.next(1, &[], &BusySpinWait, &alert, None).unwrap(), 1);
    }

    #[test]
    fn test_try_next_reports_full_without_reserving() {
        let gate = Arc::new(Sequence::default());
        let gating = vec![gate.clone()];
        let claim = SingleProducer::new(4);

        let high = claim.try_next(4, &gating).unwrap().unwrap();
        claim.publish(0, high);
        assert_eq!(claim.try_next(1, &gating).unwrap(), None);
        assert_eq!(claim.claimed(), 3);

        gate.set(0);
        assert_eq!(claim.try_next(1, &gating).unwrap(), Some(4));
    }
}
