//! Execution contexts that run callbacks immediately or after a delay.
//!
//! The [`Scheduler`] trait is the only thing the racing and timeout layer
//! knows about time. Two implementations are provided:
//!
//! - [`TestScheduler`] owns an explicit virtual clock. Nothing runs until
//!   the test advances the clock, every advance drains due callbacks in a
//!   deterministic order, and the queue of still-pending callbacks can be
//!   inspected to prove that no work leaked after a race was decided or
//!   canceled.
//! - [`ThreadPoolScheduler`] is backed by a `futures` thread pool and real
//!   time, for running the same task descriptions outside of tests.

use std::{
    collections::BTreeMap,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use futures::executor::{ThreadPool, ThreadPoolBuilder};

use crate::cancelable::Cancelable;

/// A callback handed to a scheduler for later execution.
pub type Callback = Box<dyn FnOnce() + Send>;

/// Shared handle to a scheduler, threaded through every task run.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// An execution context for the task runtime.
///
/// Implementations must run each submitted callback at most once and must
/// honor cancellation of delayed callbacks: a canceled callback either never
/// runs or was already past the point of no return when canceled, but it is
/// never left pending forever.
pub trait Scheduler: Send + Sync {
    /// Enqueues `callback` to run as soon as possible.
    fn execute(&self, callback: Callback);

    /// Enqueues `callback` to run once `delay` has elapsed on this
    /// scheduler's clock. The returned [`Cancelable`] removes the pending
    /// callback; canceling after it ran is a no-op.
    fn schedule_once(&self, delay: Duration, callback: Callback) -> Cancelable;

    /// Time elapsed on this scheduler's clock since it was created.
    fn now(&self) -> Duration;
}

/// Identity and due time of a callback still sitting in a
/// [`TestScheduler`]'s queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCallback {
    /// Monotonically increasing id, assigned in scheduling order.
    pub id: u64,
    /// Virtual time at which the callback becomes due.
    pub due: Duration,
}

struct VirtualClock {
    now: Duration,
    next_id: u64,
    // Keyed by (due, id): iteration order is due-time order with FIFO ties.
    queue: BTreeMap<(Duration, u64), Callback>,
}

/// A deterministic scheduler driven by an explicit virtual clock.
///
/// The clock is state owned by this instance — two `TestScheduler`s never
/// share time. Callbacks only run inside [`advance`] (or its zero-length
/// alias [`tick`]), on the caller's thread, which makes concurrent,
/// time-dependent behavior reproducible: a test schedules work, advances
/// the clock, and observes exactly which callbacks fired and what is still
/// pending.
///
/// Cloning shares the same clock and queue.
///
/// [`advance`]: TestScheduler::advance
/// [`tick`]: TestScheduler::tick
#[derive(Clone)]
pub struct TestScheduler {
    clock: Arc<Mutex<VirtualClock>>,
}

impl TestScheduler {
    #[must_use]
    pub fn new() -> Self {
        TestScheduler {
            clock: Arc::new(Mutex::new(VirtualClock {
                now: Duration::ZERO,
                next_id: 0,
                queue: BTreeMap::new(),
            })),
        }
    }

    /// Returns this scheduler as a [`SchedulerRef`] for running tasks.
    #[must_use]
    pub fn handle(&self) -> SchedulerRef {
        Arc::new(self.clone())
    }

    /// Moves the virtual clock forward by `duration`, executing every
    /// callback that becomes due on the way, in increasing due-time order
    /// with ties broken by scheduling order.
    ///
    /// The drain is iterative: a callback that schedules further callbacks
    /// at the same or a later virtual time extends the same drain instead
    /// of recursing, so arbitrarily long reschedule chains are safe. While
    /// a callback runs, `now()` reports that callback's due time.
    pub fn advance(&self, duration: Duration) {
        let target = {
            let clock = self.clock.lock().unwrap();
            clock.now + duration
        };
        loop {
            let next = {
                let mut clock = self.clock.lock().unwrap();
                match clock.queue.first_key_value() {
                    Some((&(due, id), _)) if due <= target => {
                        let callback = clock.queue.remove(&(due, id));
                        // Callbacks observe their own due time as "now".
                        clock.now = due;
                        callback
                    }
                    _ => {
                        clock.now = target;
                        None
                    }
                }
            };
            // Run outside the lock: callbacks schedule and cancel freely.
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// Executes everything already due without moving the clock.
    pub fn tick(&self) {
        self.advance(Duration::ZERO);
    }

    /// Number of callbacks still scheduled and not yet run or canceled.
    /// After a race or timeout reaches a terminal state this must be zero
    /// for the construct's branches — the "no leaked work" check.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.clock.lock().unwrap().queue.len()
    }

    /// Snapshot of every still-pending callback, in due order.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingCallback> {
        self.clock
            .lock()
            .unwrap()
            .queue
            .keys()
            .map(|&(due, id)| PendingCallback { id, due })
            .collect()
    }
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TestScheduler {
    fn execute(&self, callback: Callback) {
        self.schedule_once(Duration::ZERO, callback);
    }

    fn schedule_once(&self, delay: Duration, callback: Callback) -> Cancelable {
        let key = {
            let mut clock = self.clock.lock().unwrap();
            let key = (clock.now + delay, clock.next_id);
            clock.next_id += 1;
            clock.queue.insert(key, callback);
            key
        };
        let clock = Arc::clone(&self.clock);
        Cancelable::new(move || {
            clock.lock().unwrap().queue.remove(&key);
        })
    }

    fn now(&self) -> Duration {
        self.clock.lock().unwrap().now
    }
}

/// A real-time scheduler backed by a `futures` thread pool.
///
/// Delayed callbacks park a pool thread until they are due, then run unless
/// canceled in the meantime. Cancellation here is a flag checked at the
/// wake-up point: best effort, observed no later than the due time.
pub struct ThreadPoolScheduler {
    pool: ThreadPool,
    epoch: Instant,
}

impl ThreadPoolScheduler {
    /// Creates a scheduler with the default pool size.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(ThreadPoolScheduler {
            pool: ThreadPool::new()?,
            epoch: Instant::now(),
        })
    }

    /// Creates a scheduler whose pool has exactly `pool_size` threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be created.
    pub fn with_pool_size(pool_size: usize) -> io::Result<Self> {
        Ok(ThreadPoolScheduler {
            pool: ThreadPoolBuilder::new().pool_size(pool_size).create()?,
            epoch: Instant::now(),
        })
    }

    /// Returns this scheduler as a [`SchedulerRef`] for running tasks.
    #[must_use]
    pub fn handle(self) -> SchedulerRef {
        Arc::new(self)
    }
}

impl Scheduler for ThreadPoolScheduler {
    fn execute(&self, callback: Callback) {
        self.pool.spawn_ok(async move { callback() });
    }

    fn schedule_once(&self, delay: Duration, callback: Callback) -> Cancelable {
        let due = Instant::now() + delay;
        let canceled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&canceled);
        self.pool.spawn_ok(async move {
            let remaining = due.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
            if !flag.load(Ordering::Acquire) {
                callback();
            }
        });
        Cancelable::new(move || canceled.store(true, Ordering::Release))
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}
