// Layout conformance tests for the store header and record framing.
// Both are read back from mapped files, possibly by another build, so sizes,
// alignments and field offsets must not drift. The observed values are
// printed to aid debugging when a mismatch occurs on a given platform.
use memoffset::offset_of;
use seqring::Ring::Buffer::layout::{StoreHeader, HEADER_LEN, STORE_MAGIC, STORE_VERSION};
use seqring::{RecordHeader, Sequence, RECORD_HEADER_LEN};
use std::mem::{align_of, size_of};

#[test]
fn test_store_header_layout() {
    let size = size_of::<StoreHeader>();
    let align = align_of::<StoreHeader>();
    let off_magic = offset_of!(StoreHeader, magic);
    let off_version = offset_of!(StoreHeader, version);
    let off_header_len = offset_of!(StoreHeader, header_len);
    let off_capacity = offset_of!(StoreHeader, capacity);
    let off_slot_size = offset_of!(StoreHeader, slot_size);

    println!(
        "StoreHeader => size: {size}, align: {align}, offsets: [magic:{off_magic}, version:{off_version}, header_len:{off_header_len}, capacity:{off_capacity}, slot_size:{off_slot_size}]"
    );

    assert_eq!(size, HEADER_LEN);
    assert_eq!(align, 128);
    assert_eq!(off_magic, 0);
    assert_eq!(off_version, 8);
    assert_eq!(off_header_len, 12);
    assert_eq!(off_capacity, 16);
    assert_eq!(off_slot_size, 24);
}

#[test]
fn test_store_header_magic_spells_name() {
    assert_eq!(&STORE_MAGIC.to_le_bytes(), b"SEQRING\0");

    let header = StoreHeader::new(1024, 64);
    assert!(header.is_valid());
    assert_eq!(header.version, STORE_VERSION);

    let mut stale = header;
    stale.version = STORE_VERSION + 1;
    assert!(!stale.is_valid());
}

#[test]
fn test_region_size_overflow() {
    assert_eq!(StoreHeader::region_size(8, 16), Some(HEADER_LEN + 128));
    assert_eq!(StoreHeader::region_size(usize::MAX / 2, 4), None);
}

#[test]
fn test_record_header_layout() {
    let size = size_of::<RecordHeader>();
    let off_length = offset_of!(RecordHeader, length);
    let off_type_id = offset_of!(RecordHeader, type_id);
    println!("RecordHeader => size: {size}, offsets: [length:{off_length}, type_id:{off_type_id}]");

    assert_eq!(size, 8);
    assert_eq!(RECORD_HEADER_LEN, 8);
    assert_eq!(off_length, 0);
    assert_eq!(off_type_id, 4);
}

#[test]
fn test_record_header_wire_format_is_little_endian() {
    let mut bytes = [0u8; 8];
    RecordHeader::new(0x0102_0304, 5).encode(&mut bytes);
    assert_eq!(bytes, [5, 0, 0, 0, 4, 3, 2, 1]);
    assert_eq!(RecordHeader::decode(&bytes[..7]), None);
}

#[test]
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn test_sequence_owns_its_cache_line_pair() {
    // Adjacent-line prefetch pulls cache lines in pairs on these targets.
    let size = size_of::<Sequence>();
    let align = align_of::<Sequence>();
    println!("Sequence => size: {size}, align: {align}");
    assert_eq!(align, 128);
    assert_eq!(size, 128);
}
