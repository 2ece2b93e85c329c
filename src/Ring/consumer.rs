use crate::error::{Result, RingError};
use crate::Core::sequence::Sequence;
use crate::Ring::barrier::SequenceBarrier;
use crate::Ring::claim::ClaimStrategy;
use crate::Ring::wait::WaitStrategy;
use crate::Ring::Buffer::Buffer::RingBuffer;
use crate::Ring::Structs::Buffer_Structs::{RecordHeader, SequenceRange, RECORD_HEADER_LEN};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One reader of the ring: its own sequence plus the barrier that bounds it.
///
/// A consumer may read any sequence after its own and up to the highest
/// sequence its barrier has reported. `advance` moves its sequence forward,
/// releasing the slots to producers (and to downstream consumers). Read views
/// borrow the consumer, so none can outlive the next `advance`.
pub struct Consumer<C: ClaimStrategy, W: WaitStrategy> {
    barrier: SequenceBarrier<C, W>,
    sequence: Arc<Sequence>,
    /// Highest sequence the barrier has reported so far.
    available: i64,
    name: Option<String>,
}

impl<C: ClaimStrategy, W: WaitStrategy> Consumer<C, W> {
    pub(crate) fn new(
        barrier: SequenceBarrier<C, W>,
        sequence: Arc<Sequence>,
        name: Option<String>,
    ) -> Self {
        let available = sequence.get();
        Self {
            barrier,
            sequence,
            available,
            name,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// This consumer's sequence; pass it as a dependency of downstream
    /// consumers.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    /// Last sequence this consumer has advanced to.
    #[inline]
    pub fn position(&self) -> i64 {
        self.sequence.get()
    }

    pub fn barrier(&self) -> &SequenceBarrier<C, W> {
        &self.barrier
    }

    pub fn ring(&self) -> &Arc<RingBuffer<C, W>> {
        self.barrier.ring()
    }

    /// Block until `target` is readable. Returns the highest readable
    /// sequence (possibly past `target`). A `target` already consumed returns
    /// at once.
    pub fn wait_for(&mut self, target: i64) -> Result<i64> {
        if target <= self.position() {
            return Ok(self.available.max(self.position()));
        }
        let from = self.position() + 1;
        let available = self.barrier.wait_from(from, target, None)?;
        self.observe(available);
        Ok(available)
    }

    /// As `wait_for`, failing with `Timeout` after `timeout`.
    pub fn wait_for_timeout(&mut self, target: i64, timeout: Duration) -> Result<i64> {
        if target <= self.position() {
            return Ok(self.available.max(self.position()));
        }
        let from = self.position() + 1;
        let deadline = Some(Instant::now() + timeout);
        let available = self.barrier.wait_from(from, target, deadline)?;
        self.observe(available);
        Ok(available)
    }

    /// Block until at least the next sequence is readable and return every
    /// readable sequence after this consumer's position.
    pub fn next_batch(&mut self) -> Result<SequenceRange> {
        let next = self.position() + 1;
        let available = self.wait_for(next)?;
        Ok(SequenceRange::new(next, available))
    }

    /// Non-blocking: refresh and return the highest readable sequence.
    pub fn try_available(&mut self) -> i64 {
        let available = self.barrier.available_from(self.position() + 1);
        self.observe(available);
        self.available
    }

    #[inline]
    fn observe(&mut self, available: i64) {
        if available > self.available {
            self.available = available;
        }
    }

    fn check_readable(&self, sequence: i64) -> Result<()> {
        if sequence <= self.position() {
            return Err(RingError::out_of_range(sequence, "already consumed"));
        }
        if sequence > self.available {
            return Err(RingError::out_of_range(
                sequence,
                "not yet reported available to this consumer",
            ));
        }
        Ok(())
    }

    /// Read view of the slot for `sequence`.
    pub fn read_slot(&self, sequence: i64) -> Result<&[u8]> {
        self.check_readable(sequence)?;
        // Published, and gated: no producer can reclaim it until we advance.
        Ok(unsafe { self.ring().store.read(sequence) })
    }

    /// Decode a framed record written by `Producer::send`.
    ///
    /// # Returns
    /// * `Ok((type_id, payload))` borrowed from the slot
    /// * `Err(OutOfRange)` if the sequence is not readable or the header's
    ///   length does not fit the slot
    pub fn read_record(&self, sequence: i64) -> Result<(u32, &[u8])> {
        let slot = self.read_slot(sequence)?;
        let header = RecordHeader::decode(slot)
            .ok_or_else(|| RingError::out_of_range(sequence, "slot smaller than record header"))?;
        let end = RECORD_HEADER_LEN + header.length as usize;
        if end > slot.len() {
            return Err(RingError::out_of_range(
                sequence,
                "record length exceeds slot size",
            ));
        }
        Ok((header.type_id, &slot[RECORD_HEADER_LEN..end]))
    }

    /// Mark everything up to and including `sequence` as consumed.
    ///
    /// Moving backwards or past what the barrier has reported is rejected.
    pub fn advance(&mut self, sequence: i64) -> Result<()> {
        if sequence < self.position() {
            return Err(RingError::out_of_range(
                sequence,
                "consumer sequence cannot move backwards",
            ));
        }
        if sequence > self.available {
            return Err(RingError::out_of_range(
                sequence,
                "cannot advance past the available sequence",
            ));
        }
        self.sequence.set(sequence);
        self.ring().wait.signal_all();
        Ok(())
    }

    /// Hand up to `limit` readable records to `handler` without blocking.
    ///
    /// The handler gets `(sequence, type_id, payload)` and returns `true` to
    /// consume the record or `false` to stop; a declined record stays
    /// unconsumed and is offered again on the next poll. The consumer
    /// advances once, past the last accepted record.
    ///
    /// # Returns
    /// * `Ok(count)` number of records consumed (0 when nothing is ready)
    /// * `Err(Cancelled)` once the ring has been shut down
    pub fn poll<F>(&mut self, limit: usize, mut handler: F) -> Result<usize>
    where
        F: FnMut(i64, u32, &[u8]) -> bool,
    {
        if self.ring().is_shutdown() {
            return Err(RingError::Cancelled);
        }
        if limit == 0 {
            return Ok(0);
        }

        let next = self.position() + 1;
        let available = self.try_available();
        if available < next {
            return Ok(0);
        }
        let end = available.min(next + limit as i64 - 1);

        let mut consumed = 0usize;
        for sequence in next..=end {
            let (type_id, payload) = self.read_record(sequence)?;
            if !handler(sequence, type_id, payload) {
                break;
            }
            consumed += 1;
        }

        if consumed > 0 {
            self.advance(next + consumed as i64 - 1)?;
        }
        Ok(consumed)
    }

    /// Give up the typed wrapper for the raw sequence and barrier.
    pub fn into_parts(self) -> (Arc<Sequence>, SequenceBarrier<C, W>) {
        (self.sequence, self.barrier)
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> std::fmt::Debug for Consumer<C, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("name", &self.name)
            .field("position", &self.position())
            .field("available", &self.available)
            .finish()
    }
}
