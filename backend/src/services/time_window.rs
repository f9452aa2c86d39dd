//! Time-window search.
//!
//! Steps forward from an instant, minute by minute, looking for the first
//! time the constraints of a job become satisfied (start search) or stop
//! being satisfied (end search). Searches look at most one day ahead and
//! poll the scheduler cancellation flag between steps.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::astro::resolve;
use crate::models::{CompletionCondition, LocalTime, SchedulerJob, StartupCondition, When};

use super::constraints::{satisfies_altitude_constraint, ConstraintViolation};
use super::scoring;
use super::start_time_cache::CacheLookup;

/// Longest search span.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// How late a job may still start after its declared startup time.
pub const MISSED_START_TOLERANCE_SECS: i64 = 500;

/// Span searched for the next upper transit.
const TRANSIT_SEARCH_HOURS: i64 = 49;

/// A transit this close before the search start still counts.
const TRANSIT_SLACK_MINUTES: i64 = 1;

/// Result of a constraint search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Instant found, `None` when nothing was found in the window.
    pub time: Option<LocalTime>,
    /// Violated constraint at `time`, for end searches.
    pub reason: Option<ConstraintViolation>,
}

impl SearchOutcome {
    fn at(time: LocalTime) -> Self {
        Self {
            time: Some(time),
            reason: None,
        }
    }

    fn violated(time: Option<LocalTime>, reason: ConstraintViolation) -> Self {
        Self {
            time,
            reason: Some(reason),
        }
    }
}

/// What a search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    /// First instant at which every constraint holds.
    Satisfied,
    /// First instant at which some constraint fails.
    Violated,
}

fn minutes(value: f64) -> Duration {
    Duration::milliseconds((value * 60_000.0).round() as i64)
}

/// Step through `[from, from + 1 day)` looking for a constraint transition.
///
/// # Arguments
///
/// * `job` - Job whose constraints are evaluated
/// * `from` - First instant examined
/// * `step_minutes` - Step between examined instants
/// * `running_job` - Running jobs ignore `until` and the setting cutoff
/// * `until` - Upper bound of the search, further capped to one day
/// * `target` - Whether to look for satisfied or violated constraints
///
/// # Returns
///
/// The instant found and, when looking for a violation, its reason.
pub fn next_constraint_transition(
    job: &SchedulerJob,
    from: LocalTime,
    step_minutes: u32,
    running_job: bool,
    until: Option<LocalTime>,
    target: SearchTarget,
) -> SearchOutcome {
    let context = job.context();
    let step = i64::from(step_minutes.max(1));
    let seeking = target == SearchTarget::Satisfied;
    let cutoff = context.options().scheduling.setting_altitude_cutoff;

    let max_minute = match until {
        Some(until) if !running_job => (until - from).num_minutes().min(MINUTES_PER_DAY),
        _ => MINUTES_PER_DAY,
    };

    let mut minute = 0;
    while minute < max_minute {
        if context.is_cancelled() {
            log::debug!("Job '{}' search cancelled at minute {}", job.name(), minute);
            return SearchOutcome::default();
        }

        let time = from + Duration::minutes(minute);

        if job.constraints().enforce_twilight {
            let night = context.is_night_time(time);
            if !night.is_night {
                if !seeking {
                    return SearchOutcome::violated(Some(time), ConstraintViolation::Twilight);
                }
                if let Some(next) = night.next_success {
                    let skip = (next - time).num_seconds() / 60 - step;
                    if skip > 0 {
                        minute += skip;
                    }
                }
                minute += step;
                continue;
            }
        }

        let position = resolve(job.target(), time, context.location(), context.ephemeris());
        let (azimuth, altitude) = (position.azimuth(), position.altitude());

        match satisfies_altitude_constraint(job, azimuth, altitude) {
            Ok(()) => {
                let moon_blocked = job.constraints().min_moon_separation_degrees().is_some()
                    && scoring::moon_separation_score(job, When::Local(time)) < 0;

                if moon_blocked {
                    if !seeking {
                        return SearchOutcome::violated(
                            Some(time),
                            ConstraintViolation::MoonSeparation,
                        );
                    }
                } else if seeking {
                    let setting_blocked = !running_job
                        && position.is_setting()
                        && satisfies_altitude_constraint(job, azimuth, altitude - cutoff).is_err();
                    if !setting_blocked {
                        return SearchOutcome::at(time);
                    }
                }
            }
            Err(violation) => {
                if !seeking {
                    return SearchOutcome::violated(Some(time), violation);
                }
            }
        }

        minute += step;
    }

    SearchOutcome::default()
}

/// Startup time aligned on the upper transit of the job target.
///
/// Looks for the first transit `T` with `T + offset + lead >= when`, where
/// `offset` is the job culmination offset and `lead` the configured lead
/// time, and returns `T + offset`. A result fed back as `when` yields itself.
///
/// # Returns
///
/// `None` when the ephemeris finds no transit within two days.
pub fn culmination_time(job: &SchedulerJob, when: When) -> Option<LocalTime> {
    let context = job.context();
    let when = context.local_time(when);
    let lead = minutes(context.options().scheduling.lead_time_minutes);
    let offset = Duration::minutes(i64::from(job.culmination_offset()));
    let from = (when - offset - lead).with_timezone(&Utc)
        - Duration::minutes(TRANSIT_SLACK_MINUTES);
    let span = Duration::hours(TRANSIT_SEARCH_HOURS);

    let Some(transit) = context
        .ephemeris()
        .next_transit(job.target(), from, span, context.location())
    else {
        log::warn!(
            "Job '{}' has no culmination within {} hours of {}",
            job.name(),
            TRANSIT_SEARCH_HOURS,
            when
        );
        return None;
    };

    let observation = context.location().to_local(transit) + offset;
    log::debug!(
        "Job '{}' transits at {}, startup at {}",
        job.name(),
        context.location().to_local(transit),
        observation
    );
    Some(observation)
}

/// Earliest instant at or after `when` at which the job may start.
///
/// Honors the declared startup time and a fixed completion time. Results of
/// idle-job searches are memoized in the job start-time cache; cancelled
/// searches are not.
pub fn next_possible_start_time(
    job: &mut SchedulerJob,
    when: When,
    step_minutes: u32,
    running_job: bool,
    until: Option<LocalTime>,
) -> Option<LocalTime> {
    let context = Arc::clone(job.context());
    let mut from = context.local_time(when);

    if job.file_startup_condition() == StartupCondition::At {
        if let Some(file_start) = job.file_startup_time() {
            let seconds = (file_start - from).num_seconds();
            if seconds < -MISSED_START_TOLERANCE_SECS {
                log::debug!("Job '{}' missed its startup time {}", job.name(), file_start);
                return None;
            }
            if seconds > 0 {
                from = context.location().to_local(file_start);
            }
        }
    }

    if job.completion_condition() == CompletionCondition::At {
        if let Some(completion) = job.completion_time() {
            if completion < from {
                return None;
            }
        }
    }

    if running_job {
        return next_constraint_transition(
            job,
            from,
            step_minutes,
            true,
            until,
            SearchTarget::Satisfied,
        )
        .time;
    }

    match job.start_time_cache().lookup(from, until) {
        CacheLookup::Hit(result) => return result,
        CacheLookup::Resume(next) => from = next,
        CacheLookup::Miss => {}
    }

    let outcome =
        next_constraint_transition(job, from, step_minutes, false, until, SearchTarget::Satisfied);
    if context.is_cancelled() {
        return outcome.time;
    }

    job.start_time_cache_mut().store(from, until, outcome.time);
    log::debug!(
        "Job '{}' next possible start from {}: {:?}",
        job.name(),
        from,
        outcome.time
    );
    outcome.time
}

/// First instant at or after `start` at which the job must stop.
///
/// A fixed completion time bounds the result and is reported with
/// [`ConstraintViolation::EndAt`].
pub fn next_end_time(
    job: &SchedulerJob,
    start: When,
    step_minutes: u32,
    until: Option<LocalTime>,
) -> SearchOutcome {
    let context = job.context();
    let from = context.local_time(start);

    if job.file_startup_condition() == StartupCondition::At {
        if let Some(file_start) = job.file_startup_time() {
            if (from - file_start).num_seconds() < 60 {
                return SearchOutcome::violated(None, ConstraintViolation::BeforeStartAt);
            }
        }
    }

    if job.completion_condition() == CompletionCondition::At {
        if let Some(completion) = job.completion_time() {
            if completion < from {
                return SearchOutcome::violated(None, ConstraintViolation::EndAt);
            }

            let outcome = next_constraint_transition(
                job,
                from,
                step_minutes,
                false,
                until,
                SearchTarget::Violated,
            );
            return match outcome.time {
                Some(time) if time <= completion => outcome,
                _ => SearchOutcome::violated(Some(completion), ConstraintViolation::EndAt),
            };
        }
    }

    next_constraint_transition(job, from, step_minutes, false, until, SearchTarget::Violated)
}
