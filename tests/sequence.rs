use seqring::Core::min_sequence;
use seqring::{Sequence, INITIAL_SEQUENCE};
use std::sync::Arc;
use std::thread;

#[test]
fn test_sequence_starts_before_zero() {
    let seq = Sequence::default();
    assert_eq!(seq.get(), INITIAL_SEQUENCE);
    seq.set(41);
    assert_eq!(seq.add_and_get(1), 42);
    assert_eq!(seq.get_and_add(8), 42);
    assert_eq!(seq.get(), 50);
    println!("{:?}", seq);
}

#[test]
fn test_compare_and_set_only_from_expected() {
    let seq = Sequence::new(10);
    assert!(!seq.compare_and_set(9, 20));
    assert_eq!(seq.get(), 10);
    assert!(seq.compare_and_set(10, 20));
    assert_eq!(seq.get(), 20);
}

#[test]
fn test_min_sequence_defaults_when_empty() {
    assert_eq!(min_sequence(&[], 7), 7);
    let seqs: Vec<Arc<Sequence>> = [5, -1, 3].iter().map(|&v| Arc::new(Sequence::new(v))).collect();
    assert_eq!(min_sequence(&seqs, 100), -1);
}

#[test]
fn test_concurrent_increments_are_not_lost() {
    let seq = Arc::new(Sequence::new(0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let seq = seq.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    seq.get_and_add(1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(seq.get(), 40_000);
}
