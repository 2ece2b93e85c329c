use super::*;
use crate::Core::SharedMemory::RawHandle;

/// Getter methods for SlotStore
///
/// These expose geometry and backing details for diagnostics; none of them
/// touch slot contents.
impl SlotStore {
    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of one slot in bytes.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// `capacity - 1`, the mask that maps sequences to slot indices.
    pub fn index_mask(&self) -> usize {
        self.mask
    }

    /// Bytes of slot storage, excluding the header.
    pub fn byte_len(&self) -> usize {
        self.capacity * self.slot_size
    }

    /// Whether the store is backed by a mapped file.
    pub fn is_mapped(&self) -> bool {
        matches!(self.memory.raw_handle(), RawHandle::Fd(_))
    }

    /// Handle of the backing region.
    pub fn raw_handle(&self) -> RawHandle {
        self.memory.raw_handle()
    }

    /// Copy of the header at the start of the region.
    pub fn header(&self) -> StoreHeader {
        // Safety: every constructor writes or validates the header first.
        unsafe { ptr::read(self.memory.as_ptr() as *const StoreHeader) }
    }
}
