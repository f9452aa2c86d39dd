//! Altitude constraint evaluation.

use std::fmt;

use qtty::Degrees;

use crate::astro::ArtificialHorizon;
use crate::config::AltitudeLimits;
use crate::models::SchedulerJob;

/// Why a constraint blocks a job at some instant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintViolation {
    BelowMountLimit { altitude: f64, limit: f64 },
    AboveMountLimit { altitude: f64, limit: f64 },
    BelowMinAltitude { altitude: f64, minimum: f64 },
    Horizon(String),
    Twilight,
    MoonSeparation,
    BeforeStartAt,
    EndAt,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMountLimit { altitude, limit } => {
                write!(f, "altitude {:.1} < mount altitude limit {:.1}", altitude, limit)
            }
            Self::AboveMountLimit { altitude, limit } => {
                write!(f, "altitude {:.1} > mount altitude limit {:.1}", altitude, limit)
            }
            Self::BelowMinAltitude { altitude, minimum } => {
                write!(f, "altitude {:.1} < minAltitude {:.1}", altitude, minimum)
            }
            Self::Horizon(reason) => f.write_str(reason),
            Self::Twilight => f.write_str("twilight"),
            Self::MoonSeparation => f.write_str("moon separation"),
            Self::BeforeStartAt => f.write_str("before start-at time"),
            Self::EndAt => f.write_str("end-at time"),
        }
    }
}

/// Whether any altitude constraint applies to `job`.
///
/// True when the job has a minimum altitude, when it enforces an artificial
/// horizon that has constrained regions, or when mount limits are enabled
/// and narrower than `[0, 90]`.
pub fn has_altitude_constraint(job: &SchedulerJob) -> bool {
    let context = job.context();
    let limits = &context.options().limits;
    let constraints = job.constraints();

    constraints.min_altitude.is_some()
        || (constraints.enforce_artificial_horizon
            && context.horizon().is_some_and(|h| h.has_constraints()))
        || (limits.enabled && (limits.min_altitude > 0.0 || limits.max_altitude < 90.0))
}

/// Check a horizontal position against the altitude constraints of `job`.
///
/// # Arguments
/// * `job` - The job whose constraints apply
/// * `azimuth` - Azimuth in degrees
/// * `altitude` - Altitude in degrees
///
/// # Returns
/// * `Ok(())` if the position is acceptable
/// * `Err(ConstraintViolation)` naming the first failing constraint
pub fn satisfies_altitude_constraint(
    job: &SchedulerJob,
    azimuth: f64,
    altitude: f64,
) -> Result<(), ConstraintViolation> {
    let context = job.context();
    let horizon = if job.constraints().enforce_artificial_horizon {
        context.horizon()
    } else {
        None
    };
    check_altitude(
        azimuth,
        altitude,
        job.constraints().min_altitude_degrees(),
        &context.options().limits,
        horizon,
    )
}

/// Constraint check on plain values: mount limits, then the job minimum,
/// then the horizon mask.
pub fn check_altitude(
    azimuth: f64,
    altitude: f64,
    min_altitude: Option<f64>,
    limits: &AltitudeLimits,
    horizon: Option<&dyn ArtificialHorizon>,
) -> Result<(), ConstraintViolation> {
    if limits.enabled {
        if altitude < limits.min_altitude {
            return Err(ConstraintViolation::BelowMountLimit {
                altitude,
                limit: limits.min_altitude,
            });
        }
        if altitude > limits.max_altitude {
            return Err(ConstraintViolation::AboveMountLimit {
                altitude,
                limit: limits.max_altitude,
            });
        }
    }

    if let Some(minimum) = min_altitude {
        if altitude < minimum {
            return Err(ConstraintViolation::BelowMinAltitude { altitude, minimum });
        }
    }

    if let Some(horizon) = horizon {
        horizon
            .is_altitude_ok(Degrees::new(azimuth), Degrees::new(altitude))
            .map_err(ConstraintViolation::Horizon)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{HorizonMask, HorizonRegion};
    use proptest::prelude::*;

    fn enabled_limits(min: f64, max: f64) -> AltitudeLimits {
        AltitudeLimits {
            enabled: true,
            min_altitude: min,
            max_altitude: max,
        }
    }

    #[test]
    fn test_mount_limits_come_first() {
        let err = check_altitude(0.0, 10.0, Some(30.0), &enabled_limits(15.0, 80.0), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "altitude 10.0 < mount altitude limit 15.0");

        let err = check_altitude(0.0, 85.0, None, &enabled_limits(15.0, 80.0), None).unwrap_err();
        assert_eq!(err.to_string(), "altitude 85.0 > mount altitude limit 80.0");
    }

    #[test]
    fn test_disabled_limits_are_ignored() {
        let limits = AltitudeLimits {
            enabled: false,
            ..enabled_limits(15.0, 80.0)
        };
        assert!(check_altitude(0.0, 85.0, None, &limits, None).is_ok());
    }

    #[test]
    fn test_min_altitude_reason() {
        let err = check_altitude(0.0, 25.04, Some(30.0), &AltitudeLimits::default(), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "altitude 25.0 < minAltitude 30.0");
    }

    #[test]
    fn test_horizon_checked_last() {
        let mask = HorizonMask::new(vec![HorizonRegion::new(
            "wall",
            vec![(0.0, 40.0), (90.0, 40.0)],
        )]);
        let horizon: Option<&dyn ArtificialHorizon> = Some(&mask);
        let err = check_altitude(45.0, 35.0, Some(30.0), &AltitudeLimits::default(), horizon)
            .unwrap_err();
        assert!(matches!(err, ConstraintViolation::Horizon(_)));
        assert!(check_altitude(180.0, 35.0, Some(30.0), &AltitudeLimits::default(), horizon).is_ok());
    }

    proptest! {
        #[test]
        fn test_raising_min_altitude_never_admits_more(
            altitude in -90.0f64..90.0,
            low in -10.0f64..60.0,
            delta in 0.0f64..30.0,
        ) {
            let limits = AltitudeLimits::default();
            let strict = check_altitude(0.0, altitude, Some(low + delta), &limits, None).is_ok();
            let lax = check_altitude(0.0, altitude, Some(low), &limits, None).is_ok();
            prop_assert!(!strict || lax);
        }
    }
}
