use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use parking_lot::RwLock;

/// Observatory-local wall-clock time.
///
/// The offset is the fixed UTC offset of the observing site.
pub type LocalTime = DateTime<FixedOffset>;

/// Attach a fixed offset to a naive local wall-clock time.
pub fn local_from_naive(naive: NaiveDateTime, offset: FixedOffset) -> LocalTime {
    let utc = naive - Duration::seconds(offset.local_minus_utc() as i64);
    DateTime::from_naive_utc_and_offset(utc, offset)
}

/// Instant at which a computation is evaluated.
///
/// `Now` is resolved against the context clock; UTC-tagged and local
/// instants are both converted to the observatory offset before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum When {
    #[default]
    Now,
    Utc(DateTime<Utc>),
    Local(LocalTime),
}

impl From<DateTime<Utc>> for When {
    fn from(value: DateTime<Utc>) -> Self {
        When::Utc(value)
    }
}

impl From<LocalTime> for When {
    fn from(value: LocalTime) -> Self {
        When::Local(value)
    }
}

impl From<Option<LocalTime>> for When {
    fn from(value: Option<LocalTime>) -> Self {
        value.map(When::Local).unwrap_or(When::Now)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock, for simulations and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write();
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
