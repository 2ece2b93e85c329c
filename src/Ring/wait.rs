//! Wait strategies: how a thread blocks until a sequence becomes available.
//!
//! - `BusySpinWait` - tight re-check loop, lowest latency, burns a core
//! - `YieldingWait` - spins briefly then yields the processor between checks
//! - `BlockingWait` - parks on a condition variable, woken on publish/advance
//! - `TimeoutWait<W>` - any of the above with a deadline
//! - `AnyWait` - one of the above chosen at runtime from a `WaitKind`
//!
//! The strategy is fixed when the ring is built and the ring is generic over
//! it, so the hot path never pays for dynamic dispatch.

use crate::error::{Result, RingError};
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::Ordering::{Acquire, SeqCst};
use std::sync::atomic::{fence, AtomicBool, AtomicUsize};
use std::time::{Duration, Instant};

/// Policy for blocking a thread until a gating condition holds.
pub trait WaitStrategy: Send + Sync + 'static {
    /// Block until `probe()` returns a value `>= target` and return that value.
    ///
    /// `probe` is re-evaluated after every wakeup; a wakeup on its own never
    /// counts as success. Fails with `Cancelled` once `alert` is raised and
    /// with `Timeout` once `deadline` has passed.
    fn wait_until<F>(
        &self,
        target: i64,
        probe: F,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>
    where
        F: FnMut() -> i64;

    /// Wake every thread blocked in `wait_until`. Called after each publish,
    /// each consumer advance and on shutdown.
    fn signal_all(&self);

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

#[inline]
fn check_interrupts(alert: &AtomicBool, deadline: Option<Instant>, target: i64) -> Result<()> {
    if alert.load(Acquire) {
        return Err(RingError::Cancelled);
    }
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(RingError::Timeout { sequence: target });
        }
    }
    Ok(())
}

/// Re-check in a tight loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWait;

impl BusySpinWait {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWait {
    fn wait_until<F>(
        &self,
        target: i64,
        mut probe: F,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>
    where
        F: FnMut() -> i64,
    {
        loop {
            check_interrupts(alert, deadline, target)?;
            let available = probe();
            if available >= target {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all(&self) {}

    fn name(&self) -> &'static str {
        "busy-spin"
    }
}

/// Spin with exponential backoff, then yield between checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldingWait;

impl YieldingWait {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for YieldingWait {
    fn wait_until<F>(
        &self,
        target: i64,
        mut probe: F,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>
    where
        F: FnMut() -> i64,
    {
        let backoff = Backoff::new();
        loop {
            check_interrupts(alert, deadline, target)?;
            let available = probe();
            if available >= target {
                return Ok(available);
            }
            backoff.snooze();
        }
    }

    fn signal_all(&self) {}

    fn name(&self) -> &'static str {
        "yielding"
    }
}

/// Park on a condition variable until signalled.
///
/// A waiter registers itself in `waiters` while holding the lock, then
/// re-checks the condition after a SeqCst fence. A signaller fences after its
/// release store and only takes the lock when it sees a registered waiter.
/// Either the waiter sees the new value or the signaller sees the waiter, and
/// in the latter case the notify cannot run before the waiter is parked
/// because the waiter holds the lock until `Condvar::wait` releases it.
#[derive(Debug, Default)]
pub struct BlockingWait {
    lock: Mutex<()>,
    cond: Condvar,
    waiters: AtomicUsize,
}

impl BlockingWait {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWait {
    fn wait_until<F>(
        &self,
        target: i64,
        mut probe: F,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>
    where
        F: FnMut() -> i64,
    {
        loop {
            check_interrupts(alert, deadline, target)?;
            let available = probe();
            if available >= target {
                return Ok(available);
            }

            let mut guard = self.lock.lock();
            self.waiters.fetch_add(1, SeqCst);
            fence(SeqCst);
            let ready = alert.load(SeqCst) || probe() >= target;
            if !ready {
                match deadline {
                    Some(deadline) => {
                        self.cond.wait_until(&mut guard, deadline);
                    }
                    None => self.cond.wait(&mut guard),
                }
            }
            self.waiters.fetch_sub(1, SeqCst);
            drop(guard);
        }
    }

    fn signal_all(&self) {
        fence(SeqCst);
        if self.waiters.load(SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.cond.notify_all();
        }
    }

    fn name(&self) -> &'static str {
        "blocking"
    }
}

/// Bounds every wait of the wrapped strategy by `timeout`.
#[derive(Debug)]
pub struct TimeoutWait<W: WaitStrategy> {
    inner: W,
    timeout: Duration,
}

impl<W: WaitStrategy> TimeoutWait<W> {
    pub fn new(inner: W, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

impl<W: WaitStrategy> WaitStrategy for TimeoutWait<W> {
    fn wait_until<F>(
        &self,
        target: i64,
        probe: F,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>
    where
        F: FnMut() -> i64,
    {
        let own = Instant::now() + self.timeout;
        let deadline = deadline.map_or(own, |d| d.min(own));
        self.inner.wait_until(target, probe, alert, Some(deadline))
    }

    fn signal_all(&self) {
        self.inner.signal_all()
    }

    fn name(&self) -> &'static str {
        "timeout"
    }
}

/// Wait strategies selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitKind {
    BusySpin,
    Yielding,
    #[default]
    Blocking,
}

#[derive(Debug)]
enum Strategy {
    BusySpin(BusySpinWait),
    Yielding(YieldingWait),
    Blocking(BlockingWait),
}

/// A wait strategy picked once from a `WaitKind`, with an optional timeout.
///
/// Dispatch is a `match` on a value that never changes, so the branch is
/// perfectly predicted after the first wait.
#[derive(Debug)]
pub struct AnyWait {
    strategy: Strategy,
    timeout: Option<Duration>,
}

impl AnyWait {
    pub fn new(kind: WaitKind, timeout: Option<Duration>) -> Self {
        let strategy = match kind {
            WaitKind::BusySpin => Strategy::BusySpin(BusySpinWait),
            WaitKind::Yielding => Strategy::Yielding(YieldingWait),
            WaitKind::Blocking => Strategy::Blocking(BlockingWait::new()),
        };
        Self { strategy, timeout }
    }

    pub fn kind(&self) -> WaitKind {
        match self.strategy {
            Strategy::BusySpin(_) => WaitKind::BusySpin,
            Strategy::Yielding(_) => WaitKind::Yielding,
            Strategy::Blocking(_) => WaitKind::Blocking,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for AnyWait {
    fn default() -> Self {
        Self::new(WaitKind::default(), None)
    }
}

impl From<WaitKind> for AnyWait {
    fn from(kind: WaitKind) -> Self {
        Self::new(kind, None)
    }
}

impl WaitStrategy for AnyWait {
    fn wait_until<F>(
        &self,
        target: i64,
        probe: F,
        alert: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<i64>
    where
        F: FnMut() -> i64,
    {
        let deadline = match self.timeout {
            Some(timeout) => {
                let own = Instant::now() + timeout;
                Some(deadline.map_or(own, |d| d.min(own)))
            }
            None => deadline,
        };
        match &self.strategy {
            Strategy::BusySpin(w) => w.wait_until(target, probe, alert, deadline),
            Strategy::Yielding(w) => w.wait_until(target, probe, alert, deadline),
            Strategy::Blocking(w) => w.wait_until(target, probe, alert, deadline),
        }
    }

    fn signal_all(&self) {
        if let Strategy::Blocking(w) = &self.strategy {
            w.signal_all();
        }
    }

    fn name(&self) -> &'static str {
        match &self.strategy {
            Strategy::BusySpin(w) => w.name(),
            Strategy::Yielding(w) => w.name(),
            Strategy::Blocking(w) => w.name(),
        }
    }
}
