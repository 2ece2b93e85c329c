//! seqring: a fixed-capacity, lock-free ring buffer for passing fixed-size
//! records between threads.
//!
//! Producers claim sequence ranges, write into the claimed slots and
//! publish. Consumers follow their own sequence behind a barrier that waits
//! on the producer cursor and on any upstream consumers, so staged pipelines
//! (journal, replicate, then apply) need no extra queues. Slots live on the
//! heap or in a memory-mapped file.

// Module naming follows project convention (Ring = sequence-coordinated ring buffer)
#[allow(non_snake_case)]
pub mod Ring;

#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod error;

pub use error::{Result, RingError};
pub use Core::sequence::{Sequence, INITIAL_SEQUENCE};
pub use Ring::Structs::{RecordHeader, SequenceRange, RECORD_HEADER_LEN};
pub use Ring::{
    AnyClaim, AnyWait, Backing, BlockingWait, BusySpinWait, Claim, ClaimStrategy, Consumer,
    MultiProducer, Producer, ProducerKind, RingBuffer, RingBufferBuilder, RingConfig, RingParts,
    SequenceBarrier, SingleProducer, TimeoutWait, WaitKind, WaitStrategy, YieldingWait,
};
