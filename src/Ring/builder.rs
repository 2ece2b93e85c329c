use super::claim::{AnyClaim, ClaimStrategy, MultiProducer, ProducerKind, SingleProducer};
use super::wait::{AnyWait, BlockingWait, TimeoutWait, WaitKind, WaitStrategy};
use super::{Consumer, Producer, RingBuffer};
use crate::error::{Result, RingError};
use crate::Core::alloc::SlotStore;
use crate::Core::sequence::Sequence;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;
/// Default slot size in bytes, header included.
pub const DEFAULT_SLOT_SIZE: usize = 64;

/// Where the slots live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Backing {
    #[default]
    Heap,
    /// Memory-mapped file; reopened if it already holds a store of the same
    /// geometry.
    MappedFile(PathBuf),
}

#[derive(Debug, Clone)]
struct Stage {
    name: String,
    dependencies: Vec<String>,
}

/// Typed ring construction. Claim and wait strategies are type parameters,
/// so the resulting ring is fully monomorphized.
///
/// ```no_run
/// use seqring::{RingBufferBuilder, BusySpinWait};
///
/// let mut parts = RingBufferBuilder::new(1024, 64)
///     .multi_producer()
///     .wait_strategy(BusySpinWait)
///     .consumer("journal", &[])
///     .consumer("replicate", &[])
///     .consumer("apply", &["journal", "replicate"])
///     .build()?;
/// let apply = parts.take("apply").unwrap();
/// # Ok::<(), seqring::RingError>(())
/// ```
pub struct RingBufferBuilder<C: ClaimStrategy = SingleProducer, W: WaitStrategy = BlockingWait> {
    capacity: usize,
    slot_size: usize,
    backing: Backing,
    make_claim: fn(usize) -> C,
    wait: W,
    stages: Vec<Stage>,
}

impl RingBufferBuilder {
    /// Single producer, blocking wait, heap backing.
    pub fn new(capacity: usize, slot_size: usize) -> Self {
        Self {
            capacity,
            slot_size,
            backing: Backing::Heap,
            make_claim: SingleProducer::new,
            wait: BlockingWait::new(),
            stages: Vec::new(),
        }
    }
}

impl Default for RingBufferBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE)
    }
}

impl<C: ClaimStrategy, W: WaitStrategy> RingBufferBuilder<C, W> {
    fn with_claim<C2: ClaimStrategy>(self, make_claim: fn(usize) -> C2) -> RingBufferBuilder<C2, W> {
        RingBufferBuilder {
            capacity: self.capacity,
            slot_size: self.slot_size,
            backing: self.backing,
            make_claim,
            wait: self.wait,
            stages: self.stages,
        }
    }

    pub fn single_producer(self) -> RingBufferBuilder<SingleProducer, W> {
        self.with_claim(SingleProducer::new)
    }

    pub fn multi_producer(self) -> RingBufferBuilder<MultiProducer, W> {
        self.with_claim(MultiProducer::new)
    }

    /// Producer arity chosen at runtime.
    pub fn producer_kind(self, kind: ProducerKind) -> RingBufferBuilder<AnyClaim, W> {
        let make_claim: fn(usize) -> AnyClaim = match kind {
            ProducerKind::Single => AnyClaim::single,
            ProducerKind::Multi => AnyClaim::multi,
        };
        self.with_claim(make_claim)
    }

    pub fn wait_strategy<W2: WaitStrategy>(self, wait: W2) -> RingBufferBuilder<C, W2> {
        RingBufferBuilder {
            capacity: self.capacity,
            slot_size: self.slot_size,
            backing: self.backing,
            make_claim: self.make_claim,
            wait,
            stages: self.stages,
        }
    }

    /// Bound every wait (claims and consumer waits) by `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> RingBufferBuilder<C, TimeoutWait<W>> {
        let wait = TimeoutWait::new(self.wait, timeout);
        RingBufferBuilder {
            capacity: self.capacity,
            slot_size: self.slot_size,
            backing: self.backing,
            make_claim: self.make_claim,
            wait,
            stages: self.stages,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_slot_size(mut self, slot_size: usize) -> Self {
        self.slot_size = slot_size;
        self
    }

    pub fn heap(mut self) -> Self {
        self.backing = Backing::Heap;
        self
    }

    pub fn mapped_file(mut self, path: impl AsRef<Path>) -> Self {
        self.backing = Backing::MappedFile(path.as_ref().to_path_buf());
        self
    }

    pub fn backing(mut self, backing: Backing) -> Self {
        self.backing = backing;
        self
    }

    /// Add a named consumer that reads only what every stage in
    /// `dependencies` has already processed. Stages may be declared in any
    /// order; `build` sorts them.
    pub fn consumer(mut self, name: &str, dependencies: &[&str]) -> Self {
        self.stages.push(Stage {
            name: name.to_owned(),
            dependencies: dependencies.iter().map(|d| (*d).to_owned()).collect(),
        });
        self
    }

    /// Add `count` stages named `"{prefix}{i}"`, each depending on the one
    /// before it: a one-to-many pipeline.
    pub fn pipeline(mut self, prefix: &str, count: usize) -> Self {
        for i in 0..count {
            let dependencies = if i == 0 {
                Vec::new()
            } else {
                vec![format!("{}{}", prefix, i - 1)]
            };
            self.stages.push(Stage {
                name: format!("{}{}", prefix, i),
                dependencies,
            });
        }
        self
    }

    /// Validate, allocate the store and register every stage in dependency
    /// order.
    pub fn build(self) -> Result<RingParts<C, W>> {
        SlotStore::validate(self.capacity, self.slot_size)?;
        let order = topological_order(&self.stages)?;

        let store = match &self.backing {
            Backing::Heap => SlotStore::heap(self.capacity, self.slot_size)?,
            Backing::MappedFile(path) => SlotStore::mapped(path, self.capacity, self.slot_size)?,
        };
        let ring = Arc::new(RingBuffer::new(
            store,
            (self.make_claim)(self.capacity),
            self.wait,
        ));

        let mut sequences: HashMap<&str, Arc<Sequence>> = HashMap::with_capacity(order.len());
        let mut consumers = Vec::with_capacity(order.len());
        for index in order {
            let stage = &self.stages[index];
            let dependencies = stage
                .dependencies
                .iter()
                .map(|d| Arc::clone(&sequences[d.as_str()]))
                .collect();
            let consumer = ring.register(Some(&stage.name), dependencies)?;
            sequences.insert(stage.name.as_str(), Arc::clone(consumer.sequence()));
            consumers.push(consumer);
        }

        tracing::info!(
            capacity = self.capacity,
            slot_size = self.slot_size,
            producer = ?ring.claim.kind(),
            wait = ring.wait.name(),
            backing = ?self.backing,
            consumers = consumers.len(),
            "ring buffer built"
        );

        Ok(RingParts { ring, consumers })
    }
}

/// Kahn's algorithm over the declared stages. Returns stage indices with
/// every stage after all of its dependencies.
fn topological_order(stages: &[Stage]) -> Result<Vec<usize>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(stages.len());
    for (i, stage) in stages.iter().enumerate() {
        if index.insert(stage.name.as_str(), i).is_some() {
            return Err(RingError::config(format!(
                "consumer stage '{}' declared twice",
                stage.name
            )));
        }
    }

    let mut in_degree = vec![0usize; stages.len()];
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    for (i, stage) in stages.iter().enumerate() {
        for dep in &stage.dependencies {
            let &upstream = index.get(dep.as_str()).ok_or_else(|| {
                RingError::config(format!(
                    "consumer stage '{}' depends on unknown stage '{}'",
                    stage.name, dep
                ))
            })?;
            if upstream == i {
                return Err(RingError::config(format!(
                    "consumer stage '{}' depends on itself",
                    stage.name
                )));
            }
            in_degree[i] += 1;
            downstream[upstream].push(i);
        }
    }

    let mut ready: VecDeque<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &next in &downstream[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() != stages.len() {
        let cycle: Vec<&str> = (0..stages.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| stages[i].name.as_str())
            .collect();
        return Err(RingError::config(format!(
            "consumer stages form a cycle: {}",
            cycle.join(", ")
        )));
    }
    Ok(order)
}

/// A built ring and its registered consumers, in dependency order.
pub struct RingParts<C: ClaimStrategy, W: WaitStrategy> {
    pub ring: Arc<RingBuffer<C, W>>,
    consumers: Vec<Consumer<C, W>>,
}

impl<C: ClaimStrategy, W: WaitStrategy> RingParts<C, W> {
    /// Remove and return the consumer registered under `name`.
    pub fn take(&mut self, name: &str) -> Option<Consumer<C, W>> {
        let at = self.consumers.iter().position(|c| c.name() == Some(name))?;
        Some(self.consumers.remove(at))
    }

    pub fn producer(&self) -> Producer<C, W> {
        self.ring.producer()
    }

    /// Names of the consumers not yet taken.
    pub fn consumer_names(&self) -> Vec<&str> {
        self.consumers.iter().filter_map(|c| c.name()).collect()
    }

    pub fn into_consumers(self) -> Vec<Consumer<C, W>> {
        self.consumers
    }

    pub fn into_parts(self) -> (Arc<RingBuffer<C, W>>, Vec<Consumer<C, W>>) {
        (self.ring, self.consumers)
    }
}

/// Runtime ring configuration, for when producer arity and wait strategy
/// come from a config file or command line rather than types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    pub capacity: usize,
    pub slot_size: usize,
    pub producer: ProducerKind,
    pub wait: WaitKind,
    pub wait_timeout: Option<Duration>,
    pub backing: Backing,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            slot_size: DEFAULT_SLOT_SIZE,
            producer: ProducerKind::default(),
            wait: WaitKind::default(),
            wait_timeout: None,
            backing: Backing::Heap,
        }
    }
}

impl RingConfig {
    /// Validated configuration with default strategies.
    pub fn new(capacity: usize, slot_size: usize) -> Result<Self> {
        SlotStore::validate(capacity, slot_size)?;
        Ok(Self {
            capacity,
            slot_size,
            ..Self::default()
        })
    }

    pub fn with_producer(mut self, producer: ProducerKind) -> Self {
        self.producer = producer;
        self
    }

    pub fn with_wait(mut self, wait: WaitKind) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn with_mapped_file(mut self, path: impl AsRef<Path>) -> Self {
        self.backing = Backing::MappedFile(path.as_ref().to_path_buf());
        self
    }

    /// A builder for this configuration; add consumer stages, then `build`.
    pub fn builder(&self) -> RingBufferBuilder<AnyClaim, AnyWait> {
        RingBufferBuilder::new(self.capacity, self.slot_size)
            .producer_kind(self.producer)
            .wait_strategy(AnyWait::new(self.wait, self.wait_timeout))
            .backing(self.backing.clone())
    }
}
