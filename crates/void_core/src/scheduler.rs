//! Repeating timers driven by the game tick
//!
//! The [`Scheduler`] trait is the contract gameplay code schedules against.
//! [`TickScheduler`] is the in-process implementation: the host calls
//! [`TickScheduler::tick`] once per game tick and due callbacks run inline.
//!
//! Callbacks may schedule new timers or cancel any timer (including their
//! own) while running. The task lock is never held across a callback.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Boxed timer callback
pub type TimerCallback = Box<dyn FnMut() + Send>;

/// Handle to a scheduled repeating timer
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Get the raw value
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerHandle({})", self.0)
    }
}

/// Game-tick scheduler contract
pub trait Scheduler: Send + Sync {
    /// Run `callback` every `period_ticks`, first after `delay_ticks`
    ///
    /// A delay or period of zero is treated as one tick.
    fn run_repeating(&self, delay_ticks: u64, period_ticks: u64, callback: TimerCallback) -> TimerHandle;

    /// Cancel a timer
    ///
    /// Returns false if the handle is unknown, already cancelled or already
    /// finished; cancelling twice is harmless.
    fn cancel(&self, handle: TimerHandle) -> bool;
}

struct Task {
    next_due: u64,
    period: u64,
    /// Taken out while the callback runs
    callback: Option<TimerCallback>,
}

/// Manually ticked scheduler
pub struct TickScheduler {
    tasks: Mutex<BTreeMap<TimerHandle, Task>>,
    next_handle: AtomicU64,
    current_tick: AtomicU64,
}

impl TickScheduler {
    /// Create an empty scheduler at tick 0
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            next_handle: AtomicU64::new(1),
            current_tick: AtomicU64::new(0),
        }
    }

    /// Current tick number
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// Number of live timers
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check if a timer is still scheduled
    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.tasks.lock().contains_key(&handle)
    }

    /// Advance one tick and run every due callback in handle order
    pub fn tick(&self) {
        let now = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;

        let due: Vec<(TimerHandle, TimerCallback)> = {
            let mut tasks = self.tasks.lock();
            tasks
                .iter_mut()
                .filter(|(_, task)| task.next_due <= now)
                .filter_map(|(handle, task)| {
                    task.next_due = now + task.period;
                    task.callback.take().map(|cb| (*handle, cb))
                })
                .collect()
        };

        for (handle, mut callback) in due {
            // An earlier callback in this tick may have cancelled this one
            if !self.is_scheduled(handle) {
                continue;
            }

            callback();

            if let Some(task) = self.tasks.lock().get_mut(&handle) {
                task.callback = Some(callback);
            }
        }
    }

    /// Advance several ticks
    pub fn advance(&self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Drop every timer
    pub fn clear(&self) {
        self.tasks.lock().clear();
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TickScheduler {
    fn run_repeating(&self, delay_ticks: u64, period_ticks: u64, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let task = Task {
            next_due: self.current_tick() + delay_ticks.max(1),
            period: period_ticks.max(1),
            callback: Some(callback),
        };
        self.tasks.lock().insert(handle, task);
        log::debug!("Scheduled timer {:?} (delay {}, period {})", handle, delay_ticks, period_ticks);
        handle
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let removed = self.tasks.lock().remove(&handle).is_some();
        if removed {
            log::debug!("Cancelled timer {:?}", handle);
        }
        removed
    }
}
