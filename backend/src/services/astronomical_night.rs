//! Astronomical night computation service.
//!
//! Answers "is this instant inside astronomical night" (Sun altitude < -18°)
//! for an observer location, with two memo layers shared by every job of a
//! scheduler:
//!
//! - almanac results keyed by local midnight and site, flushed when more than
//!   [`MAX_ALMANAC_ENTRIES`] are held
//! - the latest night-time answer, reused for later instants until the next
//!   early dawn or dusk, whichever comes first
//!
//! Both live behind one mutex held across check-then-update.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use parking_lot::Mutex;

use crate::api::GeographicLocation;
use crate::astro::{Almanac, TwilightEvents};
use crate::config::TwilightOptions;
use crate::models::{local_from_naive, LocalTime};

/// Almanac entries kept before the whole table is flushed.
pub const MAX_ALMANAC_ENTRIES: usize = 5;

/// Days searched for a dawn/dusk pair before giving up.
const MAX_DAWN_DUSK_DAYS: usize = 32;

/// Next astronomical dawn and dusk after a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DawnDusk {
    pub dawn: LocalTime,
    pub dusk: LocalTime,
}

/// Night-time answer with a hint of when night may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightCheck {
    pub is_night: bool,
    /// Next dusk when `is_night` is false.
    pub next_success: Option<LocalTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SiteKey {
    latitude: u64,
    longitude: u64,
    utc_offset: i32,
}

impl SiteKey {
    fn new(location: &GeographicLocation) -> Self {
        Self {
            latitude: location.latitude.to_bits(),
            longitude: location.longitude.to_bits(),
            utc_offset: location.offset().local_minus_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemoKey {
    site: SiteKey,
    pre_dawn: u64,
    dawn_offset: u64,
    dusk_offset: u64,
}

impl MemoKey {
    fn new(location: &GeographicLocation, twilight: &TwilightOptions) -> Self {
        Self {
            site: SiteKey::new(location),
            pre_dawn: twilight.pre_dawn_minutes.to_bits(),
            dawn_offset: twilight.dawn_offset_hours.to_bits(),
            dusk_offset: twilight.dusk_offset_hours.to_bits(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NightMemo {
    key: MemoKey,
    query_time: LocalTime,
    valid_until: LocalTime,
    answer: NightCheck,
}

#[derive(Debug, Default)]
struct NightState {
    memo: Option<NightMemo>,
    almanac: HashMap<(i64, SiteKey), TwilightEvents>,
}

/// Process-wide twilight and night-time memo.
pub struct NightTimeCache {
    almanac: Arc<dyn Almanac>,
    state: Mutex<NightState>,
}

fn hours(value: f64) -> Duration {
    Duration::milliseconds((value * 3_600_000.0).round() as i64)
}

fn minutes(value: f64) -> Duration {
    Duration::milliseconds((value * 60_000.0).round() as i64)
}

impl NightTimeCache {
    pub fn new(almanac: Arc<dyn Almanac>) -> Self {
        Self {
            almanac,
            state: Mutex::new(NightState::default()),
        }
    }

    /// Compute the next astronomical dawn and dusk strictly after `reference`.
    ///
    /// # Arguments
    ///
    /// * `reference` - Instant after which both events must occur
    /// * `location` - Observer site
    /// * `twilight` - Dawn and dusk offsets
    ///
    /// # Returns
    ///
    /// Dawn and dusk in site-local time. Dawn before dusk means `reference`
    /// is inside the night.
    pub fn dawn_dusk(
        &self,
        reference: LocalTime,
        location: &GeographicLocation,
        twilight: &TwilightOptions,
    ) -> DawnDusk {
        let mut state = self.state.lock();
        self.dawn_dusk_locked(&mut state, reference, location, twilight)
    }

    /// Whether `time` lies in astronomical night, ending `pre_dawn_minutes`
    /// before dawn.
    pub fn is_night_time(
        &self,
        time: LocalTime,
        location: &GeographicLocation,
        twilight: &TwilightOptions,
    ) -> NightCheck {
        let key = MemoKey::new(location, twilight);
        let mut state = self.state.lock();

        if let Some(memo) = state.memo {
            if memo.key == key && time >= memo.query_time && time < memo.valid_until {
                return memo.answer;
            }
        }

        let events = self.dawn_dusk_locked(&mut state, time, location, twilight);
        let early_dawn = events.dawn - minutes(twilight.pre_dawn_minutes.abs());
        let is_night = events.dawn < events.dusk && time <= early_dawn;
        let answer = NightCheck {
            is_night,
            next_success: if is_night { None } else { Some(events.dusk) },
        };

        state.memo = Some(NightMemo {
            key,
            query_time: time,
            valid_until: early_dawn.min(events.dusk),
            answer,
        });
        answer
    }

    /// Astronomical night periods overlapping `[from, to)`.
    ///
    /// # Returns
    ///
    /// `(start, end)` pairs clipped to the requested period.
    pub fn astronomical_nights(
        &self,
        from: LocalTime,
        to: LocalTime,
        location: &GeographicLocation,
        twilight: &TwilightOptions,
    ) -> Vec<(LocalTime, LocalTime)> {
        let mut state = self.state.lock();
        let mut nights = Vec::new();
        let mut cursor = from;

        while cursor < to {
            let events = self.dawn_dusk_locked(&mut state, cursor, location, twilight);
            let next = if events.dawn < events.dusk {
                nights.push((cursor, events.dawn.min(to)));
                events.dawn
            } else {
                events.dusk
            };
            if next <= cursor {
                break;
            }
            cursor = next;
        }
        nights
    }

    /// Drop every memoized answer.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.memo = None;
        state.almanac.clear();
    }

    pub fn almanac_entries(&self) -> usize {
        self.state.lock().almanac.len()
    }

    fn dawn_dusk_locked(
        &self,
        state: &mut NightState,
        reference: LocalTime,
        location: &GeographicLocation,
        twilight: &TwilightOptions,
    ) -> DawnDusk {
        let offset = location.offset();
        let reference = reference.with_timezone(&offset);
        // Exact midnight is avoided, as the almanac does
        let mut midnight = local_from_naive(
            reference.date_naive().and_time(NaiveTime::default()) + Duration::minutes(1),
            offset,
        );

        let mut dawn = reference;
        let mut dusk = reference;
        let mut days = 0;
        while dawn <= reference || dusk <= reference {
            if days == MAX_DAWN_DUSK_DAYS {
                log::warn!(
                    "No dawn/dusk pair found within {} days after {}",
                    MAX_DAWN_DUSK_DAYS,
                    reference
                );
                break;
            }

            let events = self.twilight_events(state, midnight, location);
            if dawn <= reference {
                dawn = midnight + hours(events.dawn * 24.0 + twilight.dawn_offset_hours);
            }
            if dusk <= reference {
                dusk = midnight + hours(events.dusk * 24.0 + twilight.dusk_offset_hours);
            }

            midnight += Duration::days(1);
            days += 1;
        }

        DawnDusk { dawn, dusk }
    }

    fn twilight_events(
        &self,
        state: &mut NightState,
        midnight: LocalTime,
        location: &GeographicLocation,
    ) -> TwilightEvents {
        let key = (midnight.timestamp().div_euclid(60), SiteKey::new(location));
        if let Some(events) = state.almanac.get(&key) {
            return *events;
        }

        if state.almanac.len() > MAX_ALMANAC_ENTRIES {
            log::trace!("Flushing {} almanac entries", state.almanac.len());
            state.almanac.clear();
        }

        let events = self
            .almanac
            .twilight(midnight.with_timezone(&Utc), location);
        log::trace!(
            "Almanac for {}: dawn {:.4} dusk {:.4}",
            midnight,
            events.dawn,
            events.dusk
        );
        state.almanac.insert(key, events);
        events
    }
}
