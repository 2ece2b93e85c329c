pub mod SharedMemory;
pub mod alloc;
pub mod sequence;

pub use alloc::SlotStore;
pub use sequence::{min_sequence, Sequence, INITIAL_SEQUENCE};
pub use SharedMemory::{
    create_heap, create_mapped, open_mapped, HeapMemory, MemoryBackend, RawHandle,
};
#[cfg(unix)]
pub use SharedMemory::MappedFile;
