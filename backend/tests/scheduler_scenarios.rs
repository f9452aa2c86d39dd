//! End-to-end scheduling scenarios on a fixed winter night at 40°N.

mod fixtures;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fixtures::{context_at, context_for, local, site, utc, winter_night};
use qtty::Hours;
use tsi_scheduler::api::{
    CompletionCondition, ConstraintViolation, Equatorial, GeographicLocation, Horizontal,
    JobDefinition, JobStatus, MoonState, SchedulerContext, SchedulerJob, StartupCondition,
};
use tsi_scheduler::astro::{Ephemeris, SiderustEphemeris};
use tsi_scheduler::config::SchedulerOptions;
use tsi_scheduler::models::{FixedClock, When};
use tsi_scheduler::services::ordering::decreasing_score;
use tsi_scheduler::services::BAD_SCORE;

/// Ephemeris with a Moon parked next to a target until a given instant,
/// then on the far side of the sky.
struct ScriptedMoon {
    inner: SiderustEphemeris,
    near: Equatorial,
    far: Equatorial,
    near_until: DateTime<Utc>,
    illumination: f64,
}

impl ScriptedMoon {
    fn new(target: Equatorial, near_until: DateTime<Utc>, illumination: f64) -> Self {
        let dec = target.dec_degrees();
        Self {
            inner: SiderustEphemeris::new(),
            near: Equatorial::new(target.ra_hours(), (dec + 3.0).min(89.0)),
            far: Equatorial::new((target.ra_hours() + 12.0) % 24.0, -dec),
            near_until,
            illumination,
        }
    }
}

impl Ephemeris for ScriptedMoon {
    fn apparent_position(&self, catalog: &Equatorial, instant: DateTime<Utc>) -> Equatorial {
        self.inner.apparent_position(catalog, instant)
    }

    fn to_horizontal(
        &self,
        apparent: &Equatorial,
        instant: DateTime<Utc>,
        location: &GeographicLocation,
    ) -> Horizontal {
        self.inner.to_horizontal(apparent, instant, location)
    }

    fn local_sidereal_time(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Hours {
        self.inner.local_sidereal_time(instant, location)
    }

    fn next_transit(
        &self,
        catalog: &Equatorial,
        from: DateTime<Utc>,
        span: Duration,
        location: &GeographicLocation,
    ) -> Option<DateTime<Utc>> {
        self.inner.next_transit(catalog, from, span, location)
    }

    fn moon(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Option<MoonState> {
        let position = if instant < self.near_until {
            self.near
        } else {
            self.far
        };
        Some(MoonState {
            position,
            horizontal: self.inner.to_horizontal(&position, instant, location),
            illumination: self.illumination,
        })
    }
}

fn definition(json: &str) -> JobDefinition {
    serde_json::from_str(json).unwrap()
}

fn high_target() -> Equatorial {
    Equatorial::new(10.0, 45.0)
}

#[test]
fn test_visible_target_starts_now() {
    let context = context_at(winter_night());
    let now = context.now();
    let mut job = SchedulerJob::new("high", high_target(), context);
    job.set_min_altitude(Some(30.0));

    assert!(job.runs_during_astronomical_night(When::Now));
    let start = job.next_possible_start_time(When::Now, 1, false, None);
    assert_eq!(start, Some(now));

    let (altitude, _) = job.find_altitude(now);
    assert!(altitude >= 30.0);
    let (score, _) = job.altitude_score(now);
    assert!(score > 0);
}

#[test]
fn test_close_moon_delays_start() {
    let from = winter_night();
    let moon_leaves = from + Duration::hours(2);
    let context = Arc::new(
        SchedulerContext::new(site(), SchedulerOptions::default())
            .with_clock(Arc::new(FixedClock::new(from)))
            .with_ephemeris(Arc::new(ScriptedMoon::new(high_target(), moon_leaves, 0.8))),
    );
    let mut job = SchedulerJob::new("moonlit", high_target(), context);
    job.set_min_altitude(Some(30.0));
    job.set_min_moon_separation(Some(30.0));

    assert_eq!(job.moon_separation_score(When::Now), BAD_SCORE);
    assert!(job.current_moon_separation() < 5.0);

    let start = job.next_possible_start_time(When::Now, 1, false, None).unwrap();
    let leaves = moon_leaves.fixed_offset();
    assert!(start >= leaves, "start {} before {}", start, leaves);
    assert!(start <= leaves + Duration::minutes(2));
    assert!(job.moon_separation_score(start) >= 0);
}

#[test]
fn test_moon_separation_ends_running_window() {
    let from = winter_night();
    let moon_arrives = from + Duration::hours(30);
    let context = Arc::new(
        SchedulerContext::new(site(), SchedulerOptions::default())
            .with_clock(Arc::new(FixedClock::new(from)))
            .with_ephemeris(Arc::new(ScriptedMoon::new(high_target(), moon_arrives, 0.8))),
    );
    let mut job = SchedulerJob::new("moonlit", high_target(), context);
    job.set_min_moon_separation(Some(30.0));

    // The Moon sits next to the target for the whole search window
    let outcome = job.next_end_time(When::Now, 1, None);
    assert_eq!(outcome.time, Some(from.fixed_offset()));
    assert_eq!(outcome.reason, Some(ConstraintViolation::MoonSeparation));
}

#[test]
fn test_finished_job_cannot_start() {
    let context = context_at(winter_night());
    let now = context.now();
    let mut job = SchedulerJob::new("late", high_target(), context);
    job.set_completion_time(Some(now - Duration::hours(2)));

    assert_eq!(job.completion_condition(), CompletionCondition::At);
    assert_eq!(job.next_possible_start_time(When::Now, 1, false, None), None);
}

#[test]
fn test_minimum_altitude_end_reason() {
    let context = context_at(winter_night());
    let mut job = SchedulerJob::new("setting", Equatorial::new(5.0, 20.0), context);
    job.set_min_altitude(Some(30.0));
    job.set_enforce_twilight(false);

    let outcome = job.next_end_time(When::Now, 1, None);
    let end = outcome.time.unwrap();
    match outcome.reason {
        Some(ConstraintViolation::BelowMinAltitude { altitude, minimum }) => {
            assert_eq!(minimum, 30.0);
            assert!(altitude < 30.0 && altitude > 29.0);
        }
        other => panic!("unexpected reason {:?}", other),
    }
    assert!(end > local(2024, 1, 15, 0, 0));
    assert!(end < local(2024, 1, 15, 6, 0));
}

#[test]
fn test_setting_cutoff_delays_idle_start_only() {
    let context = context_at(winter_night());
    // Setting target, currently around 31° and losing altitude
    let mut job = SchedulerJob::new("low", Equatorial::new(3.2, 20.0), context);
    job.set_enforce_twilight(false);
    let (altitude, setting) = job.find_altitude(When::Now);
    assert!(setting);
    job.set_min_altitude(Some(altitude - 1.0));

    assert!(job.satisfies_altitude_constraint(0.0, altitude).is_ok());
    let (score, _) = job.altitude_score(When::Now);
    assert_eq!(score, BAD_SCORE / 2);

    let now = job.context().now();
    assert_eq!(job.next_possible_start_time(When::Now, 1, true, None), Some(now));
    assert_ne!(job.next_possible_start_time(When::Now, 1, false, None), Some(now));
}

#[test]
fn test_repeat_definition_switches_completion() {
    let context = context_at(winter_night());
    let job = SchedulerJob::from_definition(
        &definition(
            r#"{
                "name": "repeat",
                "target_ra_hours": 10.0,
                "target_dec_degrees": 45.0,
                "completion": { "condition": "repeat", "count": 3 }
            }"#,
        ),
        context,
    )
    .unwrap();

    assert_eq!(job.completion_condition(), CompletionCondition::Repeat);
    assert_eq!(job.repeats_required(), 3);
    assert_eq!(job.repeats_remaining(), 3);
    assert!(job.completion_time().is_some());
}

#[test]
fn test_fixed_window_definition() {
    let context = context_at(winter_night());
    let job = SchedulerJob::from_definition(
        &definition(
            r#"{
                "name": "window",
                "target_ra_hours": 10.0,
                "target_dec_degrees": 45.0,
                "startup": { "condition": "at", "time": "2024-01-15T01:00:00+00:00" },
                "completion": { "condition": "at", "time": "2024-01-15T03:30:00+00:00" },
                "estimated_duration_secs": 60
            }"#,
        ),
        context,
    )
    .unwrap();

    assert_eq!(job.startup_condition(), StartupCondition::At);
    assert_eq!(job.completion_condition(), CompletionCondition::At);
    assert_eq!(job.repeats_required(), 0);
    assert_eq!(job.estimated_time(), Some(9000));
}

#[test]
fn test_declared_startup_missed() {
    let context = context_at(winter_night());
    let mut job = SchedulerJob::from_definition(
        &definition(
            r#"{
                "name": "missed",
                "target_ra_hours": 10.0,
                "target_dec_degrees": 45.0,
                "startup": { "condition": "at", "time": "2024-01-14T23:50:00+00:00" }
            }"#,
        ),
        context,
    )
    .unwrap();
    assert_eq!(job.next_possible_start_time(When::Now, 1, false, None), None);

    let end = job.next_end_time(When::Now, 1, None);
    assert!(end.time.is_some());
}

#[test]
fn test_invalid_definitions_rejected() {
    let context = context_at(winter_night());
    for json in [
        r#"{ "name": "ra", "target_ra_hours": 24.5, "target_dec_degrees": 0.0 }"#,
        r#"{ "name": "dec", "target_ra_hours": 1.0, "target_dec_degrees": 95.0 }"#,
        r#"{ "name": "rep", "target_ra_hours": 1.0, "target_dec_degrees": 0.0,
             "completion": { "condition": "repeat", "count": 0 } }"#,
    ] {
        assert!(SchedulerJob::from_definition(&definition(json), Arc::clone(&context)).is_err());
    }
}

#[test]
fn test_start_time_cache_is_consistent() {
    let context = context_at(utc(2024, 1, 15, 12, 0));
    let mut job = SchedulerJob::new("cached", high_target(), context);
    job.set_min_altitude(Some(30.0));

    let until = Some(local(2024, 1, 16, 6, 0));
    let first = job.next_possible_start_time(When::Now, 1, false, until);
    assert_eq!(job.start_time_cache().len(), 1);
    let second = job.next_possible_start_time(When::Now, 1, false, until);
    assert_eq!(first, second);
    assert_eq!(job.start_time_cache().len(), 1);

    // A later query inside the same window reuses the answer
    let later = job.next_possible_start_time(local(2024, 1, 15, 14, 0), 1, false, until);
    assert_eq!(later, first);
    assert_eq!(job.start_time_cache().len(), 1);

    job.set_min_altitude(Some(35.0));
    assert!(job.start_time_cache().is_empty());
}

#[test]
fn test_polar_summer_never_dark() {
    let location = GeographicLocation::new(88.0, 0.0, None).unwrap();
    let context = context_for(location, utc(2024, 6, 21, 0, 0), SchedulerOptions::default());
    let mut job = SchedulerJob::new("polar", Equatorial::new(18.0, 80.0), context);

    assert!(!job.runs_during_astronomical_night(When::Now));
    assert_eq!(job.next_possible_start_time(When::Now, 10, false, None), None);
}

#[test]
fn test_polar_winter_is_dark_at_midnight() {
    let location = GeographicLocation::new(88.0, 0.0, None).unwrap();
    let context = context_for(location, utc(2024, 1, 15, 0, 0), SchedulerOptions::default());
    let job = SchedulerJob::new("polar", Equatorial::new(6.0, 80.0), context);
    assert!(job.runs_during_astronomical_night(When::Now));
}

#[test]
fn test_score_ordering_of_evaluated_jobs() {
    let context = context_at(winter_night());
    let mut jobs: Vec<SchedulerJob> = [
        ("south", Equatorial::new(6.0, -80.0)),
        ("high", high_target()),
        ("east", Equatorial::new(13.0, 10.0)),
    ]
    .into_iter()
    .map(|(name, target)| {
        let mut job = SchedulerJob::new(name, target, Arc::clone(&context));
        let (altitude_score, _) = job.altitude_score(When::Now);
        let moon_score = job.moon_separation_score(When::Now);
        job.set_score(i32::from(altitude_score) + i32::from(moon_score));
        job
    })
    .collect();

    jobs.sort_by(decreasing_score);
    assert_eq!(jobs[0].name(), "high");
    assert_eq!(jobs[2].name(), "south");
    assert!(jobs[2].score() < 0);
}

#[test]
fn test_culmination_startup_round_trip() {
    let context = context_at(winter_night());
    let mut job = SchedulerJob::from_definition(
        &definition(
            r#"{
                "name": "culminating",
                "target_ra_hours": 10.0,
                "target_dec_degrees": 45.0,
                "startup": { "condition": "culmination" },
                "culmination_offset_minutes": -60
            }"#,
        ),
        context,
    )
    .unwrap();
    assert_eq!(job.startup_condition(), StartupCondition::Culmination);

    let culmination = job.culmination_time(When::Now).unwrap();
    job.set_startup_time(Some(culmination));
    assert_eq!(job.startup_time(), Some(culmination));
    assert_eq!(job.startup_condition(), StartupCondition::At);

    job.set_startup_time(None);
    assert_eq!(job.startup_condition(), StartupCondition::Culmination);
    assert_eq!(job.startup_time(), None);
}

#[test]
fn test_culmination_job_ending_at_fixed_time_keeps_its_window() {
    let context = context_at(winter_night());
    let mut job = SchedulerJob::from_definition(
        &definition(
            r#"{
                "name": "window",
                "target_ra_hours": 10.0,
                "target_dec_degrees": 45.0,
                "startup": { "condition": "culmination" },
                "completion": { "condition": "at", "time": "2024-01-15T05:00:00+00:00" }
            }"#,
        ),
        context,
    )
    .unwrap();
    assert_eq!(job.completion_condition(), CompletionCondition::At);

    let culmination = job.culmination_time(When::Now).unwrap();
    assert!(culmination < local(2024, 1, 15, 5, 0));
    job.set_startup_time(Some(culmination));
    let window = (local(2024, 1, 15, 5, 0) - culmination).num_seconds();
    assert_eq!(job.estimated_time(), Some(window));

    // An aborted job is back on its declared culmination startup
    job.set_state(JobStatus::Aborted);
    assert_eq!(job.startup_condition(), StartupCondition::Culmination);
    job.set_estimated_time(Some(60));
    assert_eq!(job.estimated_time(), Some(window));
    assert_eq!(job.completion_time(), Some(local(2024, 1, 15, 5, 0)));
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let context = context_at(winter_night());
    let mut job = SchedulerJob::new("snap", high_target(), context);
    job.set_min_altitude(Some(30.0));
    job.set_position_angle(Some(12.5));

    let value = serde_json::to_value(job.snapshot()).unwrap();
    assert_eq!(value["name"], "snap");
    assert_eq!(value["pa"], 12.5);
    assert_eq!(value["targetRA"], 10.0);
    assert_eq!(value["minAltitude"], 30.0);
    assert_eq!(value["completionCondition"], serde_json::json!(job.completion_condition()));
}

#[test]
fn test_definition_end_at_completion() {
    let context = context_at(winter_night());
    let job = SchedulerJob::from_definition(
        &definition(
            r#"{
                "name": "until",
                "target_ra_hours": 10.0,
                "target_dec_degrees": 45.0,
                "completion": { "condition": "at", "time": "2024-01-15T02:00:00+00:00" }
            }"#,
        ),
        context,
    )
    .unwrap();

    let outcome = job.next_end_time(When::Now, 1, None);
    assert_eq!(outcome.time, Some(local(2024, 1, 15, 2, 0)));
    assert_eq!(outcome.reason, Some(ConstraintViolation::EndAt));
    assert_eq!(
        job.next_end_time(local(2024, 1, 15, 3, 0), 1, None).reason,
        Some(ConstraintViolation::EndAt)
    );
}
