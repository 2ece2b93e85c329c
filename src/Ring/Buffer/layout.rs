// On-disk / in-memory layout of a slot store region.
//
//   [ StoreHeader (128 bytes) ][ slot 0 ][ slot 1 ] ... [ slot capacity-1 ]
//
// Sequence counters are process-local and not part of the header:
// a reopened mapped store always starts its cursors at -1.

/// Magic number identifying a seqring store ("SEQRING\0").
pub const STORE_MAGIC: u64 = 0x0047_4E49_5251_4553;

/// Version of the store layout.
pub const STORE_VERSION: u32 = 1;

/// Byte length of the header; also the offset of slot 0.
pub const HEADER_LEN: usize = 128;

/// Fixed header at the start of every store region.
#[repr(C, align(128))]
#[derive(Debug, Clone, Copy)]
pub struct StoreHeader {
    /// Must equal `STORE_MAGIC`.
    pub magic: u64,

    /// Layout version, `STORE_VERSION` for stores written by this crate.
    pub version: u32,

    /// Offset of the first slot from the start of the region.
    pub header_len: u32,

    /// Number of slots (power of two).
    pub capacity: u64,

    /// Size of one slot in bytes.
    pub slot_size: u64,
}

impl StoreHeader {
    pub fn new(capacity: usize, slot_size: usize) -> Self {
        Self {
            magic: STORE_MAGIC,
            version: STORE_VERSION,
            header_len: HEADER_LEN as u32,
            capacity: capacity as u64,
            slot_size: slot_size as u64,
        }
    }

    /// True when magic, version and header length match this build.
    pub fn is_valid(&self) -> bool {
        self.magic == STORE_MAGIC
            && self.version == STORE_VERSION
            && self.header_len as usize == HEADER_LEN
    }

    /// Total region size needed for `capacity` slots of `slot_size` bytes.
    pub fn region_size(capacity: usize, slot_size: usize) -> Option<usize> {
        capacity.checked_mul(slot_size)?.checked_add(HEADER_LEN)
    }
}

const _: () = assert!(std::mem::size_of::<StoreHeader>() == HEADER_LEN);
