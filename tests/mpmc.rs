// Multi-producer rings: disjoint claims, gap-free visibility and several
// independent consumers.
//
// cargo test --test mpmc -- --nocapture

use seqring::{BlockingWait, MultiProducer, RingBufferBuilder, RingError, YieldingWait};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_claims_partition_the_sequence_space() {
    const PRODUCERS: usize = 4;
    const CLAIMS: usize = 500;

    let parts = RingBufferBuilder::new(1024, 8)
        .multi_producer()
        .wait_strategy(YieldingWait)
        .build()
        .unwrap();
    let ring = parts.ring;
    let start = Arc::new(Barrier::new(PRODUCERS));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let ring = ring.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let mut ranges = Vec::with_capacity(CLAIMS);
                for i in 0..CLAIMS {
                    let n = 1 + (p + i) % 3;
                    let claim = ring.claim(n).unwrap();
                    ranges.push(claim.range());
                    claim.publish();
                }
                ranges
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for range in handle.join().unwrap() {
            for seq in range {
                assert!(seen.insert(seq), "sequence {} claimed twice", seq);
                total += 1;
            }
        }
    }
    println!("{} producers claimed {} sequences", PRODUCERS, total);
    assert_eq!(ring.claimed(), total as i64 - 1);
    assert!((0..total as i64).all(|seq| seen.contains(&seq)));
}

#[test]
fn test_out_of_order_publish_never_exposes_a_gap() {
    let mut parts = RingBufferBuilder::new(8, 8)
        .multi_producer()
        .consumer("reader", &[])
        .build()
        .unwrap();
    let mut reader = parts.take("reader").unwrap();
    let ring = parts.ring;

    let first = ring.claim(2).unwrap();
    let mut second = ring.claim(2).unwrap();
    assert_eq!((first.range().low, second.range().low), (0, 2));

    second.write(2, b"late").unwrap();
    second.publish();

    // Sequences 2 and 3 are published but 0 is not.
    assert_eq!(reader.try_available(), -1);
    assert!(matches!(
        reader.wait_for_timeout(0, Duration::from_millis(20)),
        Err(RingError::Timeout { sequence: 0 })
    ));

    first.publish();
    assert_eq!(reader.wait_for(0).unwrap(), 3);
    assert_eq!(&reader.read_slot(2).unwrap()[..4], b"late");
}

#[test]
fn test_wait_for_past_an_unpublished_claim_does_not_skip_it() {
    let mut parts = RingBufferBuilder::new(8, 8)
        .multi_producer()
        .consumer("reader", &[])
        .build()
        .unwrap();
    let mut reader = parts.take("reader").unwrap();
    let ring = parts.ring;
    let barrier = ring.new_barrier(&[]);

    let mut zero = ring.claim(1).unwrap();
    let held = ring.claim(1).unwrap();
    let mut two = ring.claim(1).unwrap();
    assert_eq!((zero.low(), held.low(), two.low()), (0, 1, 2));
    zero.write(0, b"zero").unwrap();
    zero.publish();
    two.write(2, b"two!").unwrap();
    two.publish();

    // Sequence 2 is published but 1 is still held.
    assert!(matches!(
        reader.wait_for_timeout(2, Duration::from_millis(20)),
        Err(RingError::Timeout { sequence: 2 })
    ));
    assert!(matches!(
        barrier.wait_for_timeout(2, Duration::from_millis(20)),
        Err(RingError::Timeout { sequence: 2 })
    ));
    assert_eq!(barrier.available(), 0);
    assert!(matches!(
        reader.read_slot(1),
        Err(RingError::OutOfRange { sequence: 1, .. })
    ));

    assert_eq!(reader.wait_for(0).unwrap(), 0);
    assert_eq!(&reader.read_slot(0).unwrap()[..4], b"zero");
    assert!(reader.read_slot(1).is_err());

    held.publish();
    assert_eq!(reader.wait_for(2).unwrap(), 2);
    assert_eq!(barrier.wait_for(2).unwrap(), 2);
    assert_eq!(&reader.read_slot(2).unwrap()[..4], b"two!");
}

#[test]
fn test_independent_consumers_each_see_everything_in_order() {
    const CONSUMERS: usize = 3;
    const PRODUCERS: usize = 2;
    const PER_PRODUCER: u32 = 2_000;

    let mut builder = RingBufferBuilder::new(64, 16)
        .multi_producer()
        .wait_strategy(BlockingWait::new());
    for c in 0..CONSUMERS {
        builder = builder.consumer(&format!("c{}", c), &[]);
    }
    let (ring, consumers) = builder.build().unwrap().into_parts();
    assert_eq!(consumers.len(), CONSUMERS);

    let total = PRODUCERS as i64 * PER_PRODUCER as i64;
    let readers: Vec<_> = consumers
        .into_iter()
        .map(|mut consumer| {
            thread::spawn(move || {
                let mut per_producer = vec![Vec::new(); PRODUCERS];
                let mut expected_seq = 0i64;
                while expected_seq < total {
                    let batch = consumer.next_batch().unwrap();
                    for seq in batch {
                        assert_eq!(seq, expected_seq);
                        let (type_id, payload) = consumer.read_record(seq).unwrap();
                        let value = u32::from_le_bytes(payload.try_into().unwrap());
                        per_producer[type_id as usize].push(value);
                        expected_seq += 1;
                    }
                    consumer.advance(batch.high).unwrap();
                }
                per_producer
            })
        })
        .collect();

    let writers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let producer = ring.producer();
            thread::spawn(move || {
                for value in 0..PER_PRODUCER {
                    producer.send(p as u32, &value.to_le_bytes()).unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    for reader in readers {
        let per_producer = reader.join().unwrap();
        // Each producer's records arrive in the order it sent them.
        for values in per_producer {
            assert_eq!(values, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
    assert_eq!(ring.cursor(), total - 1);
}

#[test]
fn test_multi_producer_batch_is_visible_at_once() {
    let mut parts = RingBufferBuilder::new(16, 16)
        .multi_producer()
        .consumer("reader", &[])
        .build()
        .unwrap();
    let mut reader = parts.take("reader").unwrap();
    let producer = parts.producer();

    let records: Vec<(u32, &[u8])> = vec![(1, &b"one"[..]), (2, &b"two"[..]), (3, &b"three"[..])];
    let range = producer.send_batch(&records).unwrap();
    assert_eq!((range.low, range.high), (0, 2));

    assert_eq!(reader.wait_for(0).unwrap(), 2);
    for (seq, (type_id, payload)) in range.into_iter().zip(&records) {
        assert_eq!(reader.read_record(seq).unwrap(), (*type_id, *payload));
    }
}

#[test]
fn test_multi_producer_timeout_leaves_no_reservation() {
    let mut parts = RingBufferBuilder::new(4, 8)
        .multi_producer()
        .consumer("slow", &[])
        .build()
        .unwrap();
    let _slow = parts.take("slow").unwrap();
    let ring: Arc<seqring::RingBuffer<MultiProducer, BlockingWait>> = parts.ring;

    ring.claim(4).unwrap().publish();
    assert!(matches!(
        ring.claim_timeout(1, Duration::from_millis(20)),
        Err(RingError::Timeout { .. })
    ));
    assert_eq!(ring.claimed(), 3);
    assert!(!ring.is_shutdown());
}
