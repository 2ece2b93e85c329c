// Backing memory tests: heap regions, mapped files and reopening a mapped
// ring.
// Run with: cargo test --test shared_memory -- --nocapture

use seqring::Core::{create_heap, MemoryBackend, RawHandle, SlotStore};
use seqring::{RingBufferBuilder, RingConfig, RingError};

#[test]
fn test_heap_region_is_zeroed_and_aligned() {
    let region = create_heap(4096).unwrap();
    assert_eq!(region.size(), 4096);
    assert_eq!(region.raw_handle(), RawHandle::Heap);
    assert_eq!(region.as_ptr() as usize % 128, 0);

    unsafe {
        let slice = std::slice::from_raw_parts(region.as_ptr(), region.size());
        assert!(slice.iter().all(|&b| b == 0), "heap region should be zeroed");
    }
    // flush is a no-op on the heap
    region.flush().unwrap();
}

#[test]
fn test_heap_store_geometry() {
    let store = SlotStore::heap(16, 24).unwrap();
    println!("{:?}", store);
    assert_eq!(store.capacity(), 16);
    assert_eq!(store.slot_size(), 24);
    assert_eq!(store.index_mask(), 15);
    assert_eq!(store.byte_len(), 16 * 24);
    assert!(!store.is_mapped());
    assert!(store.header().is_valid());
    assert_eq!(store.index(17), 1);
}

#[cfg(unix)]
mod mapped {
    use super::*;
    use seqring::Core::{create_mapped, open_mapped};

    #[test]
    fn test_mapped_region_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");
        let size = 8192;

        {
            let region = create_mapped(&path, size).unwrap();
            assert!(matches!(region.raw_handle(), RawHandle::Fd(fd) if fd > 0));
            unsafe {
                let slice = std::slice::from_raw_parts_mut(region.as_ptr(), size);
                for (i, byte) in slice.iter_mut().enumerate().take(100) {
                    *byte = (i % 256) as u8;
                }
            }
            region.flush().unwrap();
        }

        let region = open_mapped(&path, size).unwrap();
        assert_eq!(region.size(), size);
        unsafe {
            let slice = std::slice::from_raw_parts(region.as_ptr(), size);
            for (i, byte) in slice.iter().enumerate().take(100) {
                assert_eq!(*byte, (i % 256) as u8);
            }
        }
    }

    #[test]
    fn test_open_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, [0u8; 16]).unwrap();
        let err = open_mapped(&path, 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_reopened_ring_keeps_slots_but_not_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");

        {
            let parts = RingBufferBuilder::new(8, 16)
                .mapped_file(&path)
                .build()
                .unwrap();
            assert!(parts.ring.store().is_mapped());
            let producer = parts.producer();
            producer.send(5, b"persist").unwrap();
            drop(producer);
            seqring::RingBuffer::close(parts.ring).unwrap();
        }

        let mut parts = RingBufferBuilder::new(8, 16)
            .mapped_file(&path)
            .consumer("reader", &[])
            .build()
            .unwrap();
        let ring = parts.ring.clone();
        assert_eq!(ring.cursor(), -1, "cursors are never persisted");

        // The bytes are still there for anyone reading raw.
        let slot = unsafe { ring.slot_unchecked(0) };
        let header = seqring::RecordHeader::decode(slot).unwrap();
        assert_eq!((header.type_id, header.length), (5, 7));
        assert_eq!(&slot[8..15], b"persist");

        // A consumer on the reopened ring only sees new publishes.
        let mut reader = parts.take("reader").unwrap();
        assert_eq!(reader.try_available(), -1);
        parts.producer().send(6, b"fresh").unwrap();
        reader.wait_for(0).unwrap();
        assert_eq!(reader.read_record(0).unwrap(), (6, &b"fresh"[..]));
    }

    #[test]
    fn test_geometry_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        drop(SlotStore::create_mapped(&path, 8, 16).unwrap());

        let wrong = RingConfig::new(16, 16)
            .unwrap()
            .with_mapped_file(&path)
            .builder()
            .build();
        assert!(matches!(wrong, Err(RingError::Configuration(_))));

        let reopened = SlotStore::open_mapped(&path).unwrap();
        assert_eq!((reopened.capacity(), reopened.slot_size()), (8, 16));
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-ring");
        std::fs::write(&path, vec![0xABu8; 4096]).unwrap();

        match SlotStore::open_mapped(&path) {
            Err(RingError::Configuration(msg)) => println!("rejected: {}", msg),
            other => panic!("expected a configuration error, got {:?}", other.map(|s| s.capacity())),
        }
    }
}
