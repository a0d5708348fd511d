//! Time sources for expiry and quota arithmetic.
//!
//! Two readings are exposed: wall-clock UTC (calendar-day quota windows, file
//! deadlines) and a monotonic elapsed reading (cache TTL). Components take an
//! `Arc<dyn Clock>` so tests can drive time with [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveTime, Utc};

/// Monotonic-plus-wall time source.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time elapsed since the clock was created. Never decreases.
    fn elapsed(&self) -> Duration;
}

/// Clock backed by the operating system.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Wall and monotonic readings move together; the offset only grows.
#[derive(Debug)]
pub struct ManualClock {
    wall_origin: DateTime<Utc>,
    offset_ms: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            wall_origin: start,
            offset_ms: AtomicI64::new(0),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to `to`. Targets earlier than the current reading are ignored.
    pub fn set(&self, to: DateTime<Utc>) {
        let target = (to - self.wall_origin).num_milliseconds();
        self.offset_ms.fetch_max(target, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.wall_origin + chrono::Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }

    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.offset_ms.load(Ordering::SeqCst).max(0) as u64)
    }
}

/// Half-open UTC calendar day `[start, end)`.
///
/// Quota enforcement and usage reporting both derive their boundaries from
/// this type so they always agree on which events belong to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The UTC day containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let start = instant.date_naive().and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + chrono::Duration::days(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}
