use crate::error::{Result, RingError};
use crate::Core::sequence::INITIAL_SEQUENCE;
use crate::Ring::claim::ClaimStrategy;
use crate::Ring::wait::WaitStrategy;
use crate::Ring::Buffer::Buffer::RingBuffer;
use crate::Ring::Structs::Buffer_Structs::{RecordHeader, SequenceRange, RECORD_HEADER_LEN};
use std::sync::Arc;
use std::time::Duration;

/// A reserved range of slots, writable only through this guard.
///
/// `publish` consumes the guard and makes the range visible to consumers.
/// Dropping it unpublished (early return, `?`, panic) aborts: the range can
/// never be filled, so the ring is shut down and every waiter sees
/// `Cancelled` rather than stalling on the gap.
#[must_use = "an unpublished claim shuts the ring down when dropped"]
pub struct Claim<'a, C: ClaimStrategy, W: WaitStrategy> {
    ring: &'a RingBuffer<C, W>,
    range: SequenceRange,
    published: bool,
}

impl<'a, C: ClaimStrategy, W: WaitStrategy> Claim<'a, C, W> {
    pub(crate) fn new(ring: &'a RingBuffer<C, W>, range: SequenceRange) -> Self {
        Self {
            ring,
            range,
            published: false,
        }
    }

    pub fn range(&self) -> SequenceRange {
        self.range
    }

    pub fn low(&self) -> i64 {
        self.range.low
    }

    pub fn high(&self) -> i64 {
        self.range.high
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub(crate) fn belongs_to(&self, ring: &RingBuffer<C, W>) -> bool {
        std::ptr::eq(self.ring, ring)
    }

    fn check(&self, sequence: i64) -> Result<()> {
        if !self.range.contains(sequence) {
            return Err(RingError::out_of_range(sequence, "not part of this claim"));
        }
        Ok(())
    }

    /// Write view of the slot for `sequence`.
    pub fn slot_mut(&mut self, sequence: i64) -> Result<&mut [u8]> {
        self.check(sequence)?;
        // A claim never spans more than `capacity` sequences, so each one maps
        // to a distinct slot that no consumer can be reading.
        Ok(unsafe { self.ring.store.slot_mut(sequence) })
    }

    /// Copy `bytes` to the start of the slot for `sequence`.
    pub fn write(&mut self, sequence: i64, bytes: &[u8]) -> Result<()> {
        self.check(sequence)?;
        unsafe { self.ring.store.write(sequence, bytes) }
    }

    /// Frame `payload` with a `RecordHeader` into the slot for `sequence`.
    pub fn write_record(&mut self, sequence: i64, type_id: u32, payload: &[u8]) -> Result<()> {
        let slot = self.slot_mut(sequence)?;
        if RECORD_HEADER_LEN + payload.len() > slot.len() {
            return Err(RingError::out_of_range(
                sequence,
                "record longer than slot size minus header",
            ));
        }
        RecordHeader::new(type_id, payload.len() as u32).encode(&mut slot[..RECORD_HEADER_LEN]);
        slot[RECORD_HEADER_LEN..RECORD_HEADER_LEN + payload.len()].copy_from_slice(payload);
        Ok(())
    }

    /// Make every slot in the range visible to consumers.
    pub fn publish(mut self) {
        self.published = true;
        self.ring.publish_range(self.range);
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> Drop for Claim<'_, C, W> {
    fn drop(&mut self) {
        if !self.published {
            self.ring.abort_range(self.range);
        }
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> std::fmt::Debug for Claim<'_, C, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claim")
            .field("low", &self.range.low)
            .field("high", &self.range.high)
            .finish()
    }
}

/// A cloneable send handle that frames records and publishes them.
///
/// On a single-producer ring clones must not send concurrently; a second
/// claim while one is in flight fails with a configuration error.
pub struct Producer<C: ClaimStrategy, W: WaitStrategy> {
    ring: Arc<RingBuffer<C, W>>,
}

impl<C: ClaimStrategy, W: WaitStrategy> Clone for Producer<C, W> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> Producer<C, W> {
    pub fn new(ring: Arc<RingBuffer<C, W>>) -> Self {
        Self { ring }
    }

    pub fn ring(&self) -> &Arc<RingBuffer<C, W>> {
        &self.ring
    }

    /// Largest payload `send` accepts. Slots smaller than a `RecordHeader`
    /// take no records at all, not even empty ones.
    pub fn max_payload(&self) -> usize {
        self.ring.slot_size().saturating_sub(RECORD_HEADER_LEN)
    }

    fn check_payload(&self, payload: &[u8]) -> Result<()> {
        if RECORD_HEADER_LEN + payload.len() > self.ring.slot_size() {
            // No sequence was reserved for a rejected payload.
            return Err(RingError::out_of_range(
                INITIAL_SEQUENCE,
                "record longer than slot size minus header",
            ));
        }
        Ok(())
    }

    /// Reserve `n` slots for raw writes.
    pub fn claim(&self, n: usize) -> Result<Claim<'_, C, W>> {
        self.ring.claim(n)
    }

    /// Sends one framed record, blocking while the ring is full.
    ///
    /// # Returns
    /// * `Ok(sequence)` the sequence the record was published at
    /// * `Err(OutOfRange)` if the payload does not fit a slot (nothing is claimed)
    /// * `Err(Cancelled)` if the ring was shut down
    pub fn send(&self, type_id: u32, payload: &[u8]) -> Result<i64> {
        self.check_payload(payload)?;
        let claim = self.ring.claim(1)?;
        Self::fill_one(claim, type_id, payload)
    }

    /// As `send`, failing with `Timeout` if no slot frees up within `timeout`.
    pub fn send_timeout(&self, type_id: u32, payload: &[u8], timeout: Duration) -> Result<i64> {
        self.check_payload(payload)?;
        let claim = self.ring.claim_timeout(1, timeout)?;
        Self::fill_one(claim, type_id, payload)
    }

    /// As `send`, but returns `Ok(None)` instead of waiting when full.
    pub fn try_send(&self, type_id: u32, payload: &[u8]) -> Result<Option<i64>> {
        self.check_payload(payload)?;
        match self.ring.try_claim(1)? {
            Some(claim) => Self::fill_one(claim, type_id, payload).map(Some),
            None => Ok(None),
        }
    }

    fn fill_one(mut claim: Claim<'_, C, W>, type_id: u32, payload: &[u8]) -> Result<i64> {
        let sequence = claim.high();
        claim.write_record(sequence, type_id, payload)?;
        claim.publish();
        Ok(sequence)
    }

    /// Sends every record in one claim and one publish. All records become
    /// visible together; nothing is claimed if any payload is too large.
    pub fn send_batch(&self, records: &[(u32, &[u8])]) -> Result<SequenceRange> {
        for (_, payload) in records {
            self.check_payload(payload)?;
        }
        let mut claim = self.ring.claim(records.len())?;
        for (sequence, (type_id, payload)) in claim.range().into_iter().zip(records) {
            claim.write_record(sequence, *type_id, payload)?;
        }
        let range = claim.range();
        claim.publish();
        Ok(range)
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> std::fmt::Debug for Producer<C, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("claimed", &self.ring.claimed())
            .field("max_payload", &self.max_payload())
            .finish()
    }
}
