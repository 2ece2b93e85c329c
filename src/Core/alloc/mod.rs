use crate::error::{Result, RingError};
use crate::Core::SharedMemory::{self, MemoryBackend};
use crate::Ring::Buffer::layout::{StoreHeader, HEADER_LEN};
use std::path::Path;
use std::ptr::{self, NonNull};
mod debug;
mod getters;

/// Contiguous slot storage: `capacity` slots of `slot_size` bytes after a
/// fixed `StoreHeader`.
///
/// The store has no concurrency logic of its own. Every accessor that hands
/// out a view is `unsafe`; the ring's claim guards and consumers are the safe
/// layer that decides who may touch which slot and when.
pub struct SlotStore {
    memory: Box<dyn MemoryBackend>,
    data: NonNull<u8>,
    capacity: usize,
    slot_size: usize,
    mask: usize,
}

// Raw bytes behind a single owner; access is gated by the sequence protocol.
unsafe impl Send for SlotStore {}
unsafe impl Sync for SlotStore {}

impl SlotStore {
    /// Check construction parameters without allocating anything.
    pub fn validate(capacity: usize, slot_size: usize) -> Result<()> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(RingError::config(format!(
                "capacity must be a power of two greater than zero, got {}",
                capacity
            )));
        }
        if capacity > (1usize << 31) {
            return Err(RingError::config(format!(
                "capacity must not exceed 2^31 slots, got {}",
                capacity
            )));
        }
        if slot_size == 0 {
            return Err(RingError::config("slot size must be greater than zero"));
        }
        if StoreHeader::region_size(capacity, slot_size).is_none() {
            return Err(RingError::config(format!(
                "capacity {} x slot size {} overflows the address space",
                capacity, slot_size
            )));
        }
        Ok(())
    }

    /// Plain heap-backed store.
    pub fn heap(capacity: usize, slot_size: usize) -> Result<Self> {
        Self::validate(capacity, slot_size)?;
        let size = Self::required_size(capacity, slot_size)?;
        let memory = SharedMemory::create_heap(size)?;
        Self::init(memory, capacity, slot_size)
    }

    /// Fresh mapped store at `path`; any existing file is truncated.
    pub fn create_mapped(path: &Path, capacity: usize, slot_size: usize) -> Result<Self> {
        Self::validate(capacity, slot_size)?;
        let size = Self::required_size(capacity, slot_size)?;
        let memory = SharedMemory::create_mapped(path, size)?;
        tracing::debug!(path = %path.display(), capacity, slot_size, "created mapped slot store");
        Self::init(memory, capacity, slot_size)
    }

    /// Reopen a mapped store, taking capacity and slot size from its header.
    ///
    /// Slot contents survive; cursors do not (they live in the ring, not here).
    pub fn open_mapped(path: &Path) -> Result<Self> {
        let memory = SharedMemory::open_mapped(path, HEADER_LEN)?;
        let header = unsafe { ptr::read(memory.as_ptr() as *const StoreHeader) };
        if !header.is_valid() {
            return Err(RingError::config(format!(
                "{} is not a seqring store (magic {:#x}, version {})",
                path.display(),
                header.magic,
                header.version
            )));
        }
        let capacity = header.capacity as usize;
        let slot_size = header.slot_size as usize;
        Self::validate(capacity, slot_size)?;

        let needed = Self::required_size(capacity, slot_size)?;
        if memory.size() < needed {
            return Err(RingError::config(format!(
                "{} is truncated: header needs {} bytes, file has {}",
                path.display(),
                needed,
                memory.size()
            )));
        }
        tracing::debug!(path = %path.display(), capacity, slot_size, "reopened mapped slot store");
        Self::attach(memory, capacity, slot_size)
    }

    /// Open `path` if it holds a store with this exact geometry, otherwise
    /// create it. An existing store with different geometry is an error.
    pub fn mapped(path: &Path, capacity: usize, slot_size: usize) -> Result<Self> {
        Self::validate(capacity, slot_size)?;
        let existing = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if !existing {
            return Self::create_mapped(path, capacity, slot_size);
        }

        let store = Self::open_mapped(path)?;
        if store.capacity != capacity || store.slot_size != slot_size {
            return Err(RingError::config(format!(
                "{} holds a store with capacity {} and slot size {}, requested {} and {}",
                path.display(),
                store.capacity,
                store.slot_size,
                capacity,
                slot_size
            )));
        }
        Ok(store)
    }

    fn required_size(capacity: usize, slot_size: usize) -> Result<usize> {
        StoreHeader::region_size(capacity, slot_size)
            .ok_or_else(|| RingError::config("store size overflows the address space"))
    }

    fn init(memory: Box<dyn MemoryBackend>, capacity: usize, slot_size: usize) -> Result<Self> {
        unsafe {
            ptr::write(
                memory.as_ptr() as *mut StoreHeader,
                StoreHeader::new(capacity, slot_size),
            );
        }
        Self::attach(memory, capacity, slot_size)
    }

    fn attach(memory: Box<dyn MemoryBackend>, capacity: usize, slot_size: usize) -> Result<Self> {
        let data = unsafe { memory.as_ptr().add(HEADER_LEN) };
        let data = NonNull::new(data)
            .ok_or_else(|| RingError::config("backing region returned a null pointer"))?;
        Ok(Self {
            memory,
            data,
            capacity,
            slot_size,
            mask: capacity - 1,
        })
    }

    /// Slot index for a sequence.
    #[inline]
    pub fn index(&self, sequence: i64) -> usize {
        debug_assert!(sequence >= 0, "negative sequence {}", sequence);
        (sequence as usize) & self.mask
    }

    #[inline]
    fn slot_ptr(&self, sequence: i64) -> *mut u8 {
        unsafe { self.data.as_ptr().add(self.index(sequence) * self.slot_size) }
    }

    /// Read view of the slot for `sequence`.
    ///
    /// # Safety
    /// No thread may be writing this slot for the lifetime of the view, i.e.
    /// the caller has been cleared to read `sequence` by a barrier and has not
    /// yet advanced past it.
    #[inline]
    pub unsafe fn read(&self, sequence: i64) -> &[u8] {
        std::slice::from_raw_parts(self.slot_ptr(sequence), self.slot_size)
    }

    /// Write view of the slot for `sequence`.
    ///
    /// # Safety
    /// The caller must hold the claim for `sequence` and no other view of the
    /// same slot may be alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_mut(&self, sequence: i64) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.slot_ptr(sequence), self.slot_size)
    }

    /// Copy `bytes` into the start of the slot for `sequence`.
    ///
    /// # Safety
    /// Same contract as [`SlotStore::slot_mut`].
    pub unsafe fn write(&self, sequence: i64, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.slot_size {
            return Err(RingError::out_of_range(
                sequence,
                "payload longer than slot size",
            ));
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), self.slot_ptr(sequence), bytes.len());
        Ok(())
    }

    /// Flush a mapped store to its file. No-op on the heap.
    pub fn flush(&self) -> Result<()> {
        self.memory.flush()?;
        Ok(())
    }
}
