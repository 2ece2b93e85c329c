// A three-stage pipeline: journal and replicate read every record in
// parallel, apply runs behind both of them.
//
// cargo run --example pipeline -- [records] [single|multi] [spin|yield|block]
// RUST_LOG=seqring=debug for lifecycle logging; Ctrl-C shuts the ring down.

use seqring::{ProducerKind, RingConfig, RingError, WaitKind};
use std::env;
use std::thread;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> seqring::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let records: u64 = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(1_000_000);
    let producer_kind = match args.get(2).map(String::as_str) {
        Some("multi") => ProducerKind::Multi,
        _ => ProducerKind::Single,
    };
    let wait_kind = match args.get(3).map(String::as_str) {
        Some("spin") => WaitKind::BusySpin,
        Some("yield") => WaitKind::Yielding,
        _ => WaitKind::Blocking,
    };

    let mut parts = RingConfig::new(4096, 64)?
        .with_producer(producer_kind)
        .with_wait(wait_kind)
        .builder()
        .consumer("journal", &[])
        .consumer("replicate", &[])
        .consumer("apply", &["journal", "replicate"])
        .build()?;

    let ring = parts.ring.clone();
    ctrlc::set_handler(move || ring.shutdown())
        .map_err(|e| RingError::config(format!("failed to install Ctrl-C handler: {}", e)))?;

    let stages: Vec<_> = ["journal", "replicate", "apply"]
        .into_iter()
        .filter_map(|name| parts.take(name))
        .map(|mut consumer| {
            thread::spawn(move || -> seqring::Result<(String, u64)> {
                let name = consumer.name().unwrap_or("stage").to_string();
                let mut sum = 0u64;
                while consumer.position() < records as i64 - 1 {
                    let batch = consumer.next_batch()?;
                    for seq in batch {
                        let (_, payload) = consumer.read_record(seq)?;
                        let mut value = [0u8; 8];
                        value.copy_from_slice(&payload[..8]);
                        sum = sum.wrapping_add(u64::from_le_bytes(value));
                    }
                    consumer.advance(batch.high)?;
                }
                Ok((name, sum))
            })
        })
        .collect();

    let producer = parts.producer();
    let started = Instant::now();
    for value in 0..records {
        match producer.send(1, &value.to_le_bytes()) {
            Ok(_) => {}
            Err(RingError::Cancelled) => {
                println!("Producer: ring shut down after {} records", value);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    drop(producer);

    for stage in stages {
        match stage.join() {
            Ok(Ok((name, sum))) => println!("{:>10}: checksum {}", name, sum),
            Ok(Err(e)) if e.is_cancelled() => println!("stage cancelled"),
            Ok(Err(e)) => eprintln!("stage failed: {}", e),
            Err(_) => eprintln!("stage panicked"),
        }
    }

    let elapsed = started.elapsed();
    println!(
        "{} records in {:?} ({:.1} M records/s)",
        records,
        elapsed,
        records as f64 / elapsed.as_secs_f64() / 1e6
    );
    Ok(())
}
