//! Altitude and Moon separation scores.
//!
//! Scores are small integers where [`BAD_SCORE`] marks a hard rejection.
//! The pure scoring functions take plain numbers so they can be checked
//! without an ephemeris; the job-level functions resolve positions first.

use crate::astro::{angular_separation, resolve};
use crate::models::{SchedulerJob, When};

use super::constraints::{has_altitude_constraint, satisfies_altitude_constraint};

/// Score of a rejected candidate.
pub const BAD_SCORE: i16 = -1000;

/// Minimum altitude in degrees for unconstrained jobs before the score drops.
pub const MIN_ALTITUDE: f64 = 15.0;

/// Outcome of the altitude constraint check fed to [`score_for_altitude`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeCheck {
    /// The job has no altitude constraint.
    Unconstrained,
    Satisfied,
    Violated,
    /// Satisfied now, but a setting target fails within the setting cutoff.
    SettingBelowCutoff,
}

/// Altitude score for a target at `altitude` degrees.
pub fn score_for_altitude(altitude: f64, check: AltitudeCheck) -> i16 {
    if altitude < 0.0 {
        return BAD_SCORE;
    }

    match check {
        AltitudeCheck::Violated => BAD_SCORE,
        AltitudeCheck::SettingBelowCutoff => BAD_SCORE / 2,
        AltitudeCheck::Unconstrained if altitude < MIN_ALTITUDE => (altitude / 10.0) as i16,
        _ => (1.5 * 1.06f64.powf(altitude) - 1.5).round() as i16,
    }
}

/// Moon separation score from plain values.
///
/// # Arguments
///
/// * `separation` - Target to Moon distance in degrees
/// * `moon_altitude` - Moon altitude in degrees
/// * `target_altitude` - Target altitude in degrees
/// * `illumination_percent` - Moon illumination in `[0, 100]`
/// * `min_separation` - Required separation, if any
pub fn score_for_moon_separation(
    separation: f64,
    moon_altitude: f64,
    target_altitude: f64,
    illumination_percent: f64,
    min_separation: Option<f64>,
) -> i16 {
    let z_moon = 90.0 - moon_altitude;
    let z_target = 90.0 - target_altitude;

    let score = if z_moon == z_target || illumination_percent == 0.0 || z_moon >= 90.0 {
        100
    } else {
        let effect = separation.powf(1.7) * z_moon.sqrt()
            / (z_target.powf(1.1) * illumination_percent.sqrt());
        match min_separation {
            Some(minimum) if separation < minimum => BAD_SCORE * 5,
            _ => effect.clamp(0.0, 100.0) as i16,
        }
    };

    score / 5
}

/// Altitude in degrees and setting flag of the job target at `when`.
pub fn find_altitude(job: &SchedulerJob, when: When) -> (f64, bool) {
    let context = job.context();
    let time = context.local_time(when);
    let position = resolve(job.target(), time, context.location(), context.ephemeris());
    (position.altitude(), position.is_setting())
}

/// Altitude score and altitude of the job target at `when`.
pub fn altitude_score(job: &SchedulerJob, when: When) -> (i16, f64) {
    let context = job.context();
    let time = context.local_time(when);
    let position = resolve(job.target(), time, context.location(), context.ephemeris());
    let (azimuth, altitude) = (position.azimuth(), position.altitude());

    let check = if !has_altitude_constraint(job) {
        AltitudeCheck::Unconstrained
    } else if satisfies_altitude_constraint(job, azimuth, altitude).is_err() {
        AltitudeCheck::Violated
    } else {
        let cutoff = context.options().scheduling.setting_altitude_cutoff;
        if position.is_setting()
            && satisfies_altitude_constraint(job, azimuth, altitude - cutoff).is_err()
        {
            AltitudeCheck::SettingBelowCutoff
        } else {
            AltitudeCheck::Satisfied
        }
    };

    let score = score_for_altitude(altitude, check);
    log::trace!(
        "Job '{}' altitude {:.1} at {} scores {} ({:?})",
        job.name(),
        altitude,
        time,
        score,
        check
    );
    (score, altitude)
}

/// Moon separation score of the job target at `when`.
///
/// Without a lunar model every instant scores 100.
pub fn moon_separation_score(job: &SchedulerJob, when: When) -> i16 {
    let context = job.context();
    let time = context.local_time(when);
    let position = resolve(job.target(), time, context.location(), context.ephemeris());

    let Some(moon) = context.ephemeris().moon(position.instant, context.location()) else {
        return 100;
    };

    let separation = angular_separation(&moon.position, &position.apparent).value();
    let score = score_for_moon_separation(
        separation,
        moon.horizontal.altitude.value(),
        position.altitude(),
        moon.illumination * 100.0,
        job.constraints().min_moon_separation_degrees(),
    );
    log::trace!(
        "Job '{}' moon separation {:.1} at {} scores {}",
        job.name(),
        separation,
        time,
        score
    );
    score
}

/// Current angular distance to the Moon; 180 without a lunar model.
pub fn current_moon_separation(job: &SchedulerJob) -> f64 {
    let context = job.context();
    let position = resolve(job.target(), context.now(), context.location(), context.ephemeris());

    context
        .ephemeris()
        .moon(position.instant, context.location())
        .map_or(180.0, |moon| angular_separation(&moon.position, &position.apparent).value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GeographicLocation;
    use crate::astro::Equatorial;
    use crate::config::SchedulerOptions;
    use crate::context::SchedulerContext;
    use crate::models::FixedClock;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_below_horizon_is_rejected() {
        assert_eq!(score_for_altitude(-0.5, AltitudeCheck::Unconstrained), BAD_SCORE);
        assert_eq!(score_for_altitude(-10.0, AltitudeCheck::Satisfied), BAD_SCORE);
    }

    #[test]
    fn test_altitude_score_values() {
        assert_eq!(score_for_altitude(10.0, AltitudeCheck::Unconstrained), 1);
        assert_eq!(score_for_altitude(14.9, AltitudeCheck::Unconstrained), 1);
        assert_eq!(score_for_altitude(45.0, AltitudeCheck::Unconstrained), 19);
        assert_eq!(score_for_altitude(45.0, AltitudeCheck::Satisfied), 19);
        assert_eq!(score_for_altitude(45.0, AltitudeCheck::Violated), BAD_SCORE);
        assert_eq!(score_for_altitude(45.0, AltitudeCheck::SettingBelowCutoff), BAD_SCORE / 2);
    }

    #[test]
    fn test_moon_score_degenerate_cases() {
        // Moon below the horizon
        assert_eq!(score_for_moon_separation(10.0, -5.0, 40.0, 80.0, Some(30.0)), 20);
        // New moon
        assert_eq!(score_for_moon_separation(10.0, 40.0, 30.0, 0.0, Some(30.0)), 20);
        // Same zenith distance
        assert_eq!(score_for_moon_separation(10.0, 40.0, 40.0, 80.0, Some(30.0)), 20);
    }

    #[test]
    fn test_moon_score_penalizes_close_moon() {
        assert_eq!(score_for_moon_separation(5.0, 40.0, 30.0, 80.0, Some(30.0)), BAD_SCORE);
        assert!(score_for_moon_separation(5.0, 40.0, 30.0, 80.0, None) >= 0);
    }

    #[test]
    fn test_moon_score_value() {
        // 90^1.7 * 60^0.5 / (60^1.1 * 50^0.5) is about 25.5
        let score = score_for_moon_separation(90.0, 30.0, 30.0 + 1e-9, 50.0, None);
        assert_eq!(score, 5);
        let far = score_for_moon_separation(120.0, 30.0, 60.0, 10.0, Some(30.0));
        assert_eq!(far, 20);
    }

    #[test]
    fn test_job_altitude_score_at_night() {
        let location = GeographicLocation::new(40.0, 0.0, None).unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()));
        let context = Arc::new(
            SchedulerContext::new(location, SchedulerOptions::default()).with_clock(clock),
        );
        let mut job = SchedulerJob::new("target", Equatorial::new(10.0, 45.0), context);

        let (altitude, setting) = job.find_altitude(When::Now);
        assert!(altitude > 55.0 && altitude < 70.0, "altitude {}", altitude);
        assert!(!setting);

        let (score, scored_altitude) = job.altitude_score(When::Now);
        assert_eq!(scored_altitude, altitude);
        assert!(score > 30);

        job.set_min_altitude(Some(75.0));
        assert_eq!(job.altitude_score(When::Now).0, BAD_SCORE);
    }

    proptest! {
        #[test]
        fn test_altitude_score_monotonic_above_horizon(
            low in 0.0f64..90.0,
            delta in 0.0f64..30.0,
        ) {
            let high = (low + delta).min(90.0);
            for check in [AltitudeCheck::Unconstrained, AltitudeCheck::Satisfied] {
                prop_assert!(score_for_altitude(low, check) <= score_for_altitude(high, check));
            }
        }
    }
}
