mod barrier;
mod builder;
mod consumer;
mod producer;
pub mod claim;
pub mod wait;

pub use barrier::SequenceBarrier;
pub use builder::{Backing, RingBufferBuilder, RingConfig, RingParts, DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE};
pub use claim::{AnyClaim, ClaimStrategy, MultiProducer, ProducerKind, SingleProducer};
pub use consumer::Consumer;
pub use producer::{Claim, Producer};
pub use wait::{AnyWait, BlockingWait, BusySpinWait, TimeoutWait, WaitKind, WaitStrategy, YieldingWait};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::RingBuffer; // re-export for stable path
}

pub mod Structs {
    pub mod Buffer_Structs;
    pub use Buffer_Structs::{RecordHeader, SequenceRange, RECORD_HEADER_LEN}; // re-export for stable path
}

pub use Buffer::RingBuffer;
