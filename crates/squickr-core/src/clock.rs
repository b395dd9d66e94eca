use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

/// Source of the current wall-clock instant.
///
/// Handlers stamp events through this trait so tests can pin time exactly.
pub trait Clock: Send + Sync {
    /// Current instant in UTC, truncated to millisecond precision.
    fn now(&self) -> OffsetDateTime;
}

/// Shared handle to a clock implementation.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        truncate_to_millis(OffsetDateTime::now_utc())
    }
}

/// Drop sub-millisecond precision, the canonical event timestamp resolution.
#[must_use]
pub fn truncate_to_millis(ts: OffsetDateTime) -> OffsetDateTime {
    let nanos = ts.nanosecond() % 1_000_000;
    ts - Duration::nanoseconds(i64::from(nanos))
}

/// Manually driven clock for tests.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(truncate_to_millis(start))),
        }
    }

    /// Jump the clock to `to`.
    pub fn set(&self, to: OffsetDateTime) {
        *self.lock() = truncate_to_millis(to);
    }

    /// Advance the clock by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OffsetDateTime> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.lock()
    }
}
