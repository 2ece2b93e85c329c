// Plain value types shared by producers and consumers; no atomics here.

/// Optional framing written at the start of a slot by `Producer::send` and
/// read back by `Consumer::read_record`.
/// ABI-stable; all fields are little-endian on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordHeader {
    /// Payload length in bytes, excluding this header.
    pub length: u32,
    /// Application-defined record type.
    pub type_id: u32,
}

/// Size of `RecordHeader` in a slot.
pub const RECORD_HEADER_LEN: usize = std::mem::size_of::<RecordHeader>();

impl RecordHeader {
    pub fn new(type_id: u32, length: u32) -> Self {
        Self { length, type_id }
    }

    /// Panics if `out` is shorter than `RECORD_HEADER_LEN`.
    pub fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.length.to_le_bytes());
        out[4..8].copy_from_slice(&self.type_id.to_le_bytes());
    }

    /// `None` when `bytes` is shorter than a header.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_HEADER_LEN {
            return None;
        }
        let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let type_id = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Some(Self { length, type_id })
    }
}

/// An inclusive range of sequences `[low, high]` reserved by one claim.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceRange {
    pub low: i64,
    pub high: i64,
}

impl SequenceRange {
    pub fn new(low: i64, high: i64) -> Self {
        debug_assert!(low <= high, "empty range {}..={}", low, high);
        Self { low, high }
    }

    /// Range of `n` sequences ending at `high`.
    pub fn ending_at(high: i64, n: i64) -> Self {
        Self::new(high - n + 1, high)
    }

    pub fn len(&self) -> usize {
        (self.high - self.low + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.high < self.low
    }

    pub fn contains(&self, sequence: i64) -> bool {
        self.low <= sequence && sequence <= self.high
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<i64> {
        self.low..=self.high
    }
}

impl IntoIterator for SequenceRange {
    type Item = i64;
    type IntoIter = std::ops::RangeInclusive<i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
