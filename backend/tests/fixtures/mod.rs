//! Site, clock and context fixtures shared by the scheduling tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tsi_scheduler::api::{GeographicLocation, SchedulerContext};
use tsi_scheduler::config::SchedulerOptions;
use tsi_scheduler::models::{FixedClock, LocalTime};

/// Mid-latitude test site on the Greenwich meridian, UTC wall clock.
pub fn site() -> GeographicLocation {
    GeographicLocation::new(40.0, 0.0, None).unwrap()
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

#[allow(dead_code)]
pub fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> LocalTime {
    utc(year, month, day, hour, minute).fixed_offset()
}

/// Winter night used by most scenarios: 2024-01-15 00:00 UTC.
pub fn winter_night() -> DateTime<Utc> {
    utc(2024, 1, 15, 0, 0)
}

/// Context for `location` frozen at `now`.
pub fn context_for(
    location: GeographicLocation,
    now: DateTime<Utc>,
    options: SchedulerOptions,
) -> Arc<SchedulerContext> {
    Arc::new(
        SchedulerContext::new(location, options).with_clock(Arc::new(FixedClock::new(now))),
    )
}

pub fn context_at(now: DateTime<Utc>) -> Arc<SchedulerContext> {
    context_for(site(), now, SchedulerOptions::default())
}
