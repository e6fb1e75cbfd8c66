//! Time sources for debounce windows and periodic timers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cuts a single [`Clock::wait`] short. Each periodic timer owns one, so
/// stopping a timer never disturbs other waiters on the same clock.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    raised: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the signal and release its waiter.
    pub fn raise(&self) {
        *self.inner.raised.lock() = true;
        self.inner.cvar.notify_all();
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.inner.raised.lock()
    }

    /// Re-check the waiter's deadline without raising.
    fn notify(&self) {
        let _raised = self.inner.raised.lock();
        self.inner.cvar.notify_all();
    }

    fn same(&self, other: &StopSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

pub trait Clock: Send + Sync + 'static {
    /// Elapsed time since the clock was created.
    fn now(&self) -> Duration;

    /// Block for `delta`, or until `stop` is raised. Returns `true` only when
    /// the full delta elapsed.
    fn wait(&self, delta: Duration, stop: &StopSignal) -> bool;
}

#[derive(Debug, Clone)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wait(&self, delta: Duration, stop: &StopSignal) -> bool {
        let deadline = Instant::now().checked_add(delta);
        let mut raised = stop.inner.raised.lock();
        while !*raised {
            match deadline {
                Some(deadline) => {
                    if stop.inner.cvar.wait_until(&mut raised, deadline).timed_out() {
                        return !*raised;
                    }
                }
                None => stop.inner.cvar.wait(&mut raised),
            }
        }
        false
    }
}

/// Clock that only moves when told to. Waiters are released by
/// [`advance`](Self::advance)/[`set_time`](Self::set_time) or their own
/// [`StopSignal`].
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    waits: u64,
    waiters: Vec<StopSignal>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) -> Duration {
        let (now, waiters) = {
            let mut state = self.state.lock();
            state.now = state.now.saturating_add(delta);
            (state.now, state.waiters.clone())
        };
        for waiter in &waiters {
            waiter.notify();
        }
        now
    }

    pub fn set_time(&self, time: Duration) {
        let waiters = {
            let mut state = self.state.lock();
            state.now = time;
            state.waiters.clone()
        };
        for waiter in &waiters {
            waiter.notify();
        }
    }

    /// Number of `wait` calls started so far. Tests use it to know a timer
    /// thread is parked before moving time.
    #[must_use]
    pub fn wait_calls(&self) -> u64 {
        self.state.lock().waits
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn wait(&self, delta: Duration, stop: &StopSignal) -> bool {
        let deadline = {
            let mut state = self.state.lock();
            state.waits += 1;
            state.waiters.push(stop.clone());
            state.now.saturating_add(delta)
        };
        // Lock order: signal, then clock state. `advance` releases the state
        // lock before touching any signal.
        let mut raised = stop.inner.raised.lock();
        let elapsed = loop {
            if *raised {
                break false;
            }
            if self.now() >= deadline {
                break true;
            }
            stop.inner.cvar.wait(&mut raised);
        };
        drop(raised);
        self.state.lock().waiters.retain(|waiter| !waiter.same(stop));
        elapsed
    }
}
