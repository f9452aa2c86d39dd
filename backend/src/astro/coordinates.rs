//! Coordinate resolution: catalog position + local time + site -> altitude/azimuth.

use chrono::{DateTime, Utc};
use qtty::{Degrees, Hours};
use siderust::coordinates::spherical::direction;

use super::{Ephemeris, Equatorial, Horizontal};
use crate::api::GeographicLocation;
use crate::models::LocalTime;

/// Apparent and horizontal place of a target at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPosition {
    pub apparent: Equatorial,
    pub horizontal: Horizontal,
    pub local_sidereal_time: Hours,
    pub instant: DateTime<Utc>,
}

impl ResolvedPosition {
    pub fn altitude(&self) -> f64 {
        self.horizontal.altitude.value()
    }

    pub fn azimuth(&self) -> f64 {
        self.horizontal.azimuth.value()
    }

    /// Hours since the last meridian crossing, in `[0, 24)`.
    pub fn hour_offset(&self) -> f64 {
        hour_offset(self.local_sidereal_time, self.apparent.ra)
    }

    /// A target is setting during the twelve hours after its meridian crossing.
    pub fn is_setting(&self) -> bool {
        self.hour_offset() < 12.0
    }
}

/// `(lst - ra)` reduced to `[0, 24)` hours; 0 is the meridian.
pub fn hour_offset(lst: Hours, ra: Hours) -> f64 {
    let offset = (lst.value() - ra.value()).rem_euclid(24.0);
    if offset >= 24.0 {
        offset - 24.0
    } else {
        offset
    }
}

/// Great-circle distance between two equatorial positions.
pub fn angular_separation(a: &Equatorial, b: &Equatorial) -> Degrees {
    let to_direction = |p: &Equatorial| {
        direction::EquatorialTrueOfDate::new(
            siderust::qtty::Degrees::new(p.ra_hours() * 15.0),
            siderust::qtty::Degrees::new(p.dec_degrees()),
        )
    };
    let separation = to_direction(a).angular_separation(&to_direction(b));
    Degrees::new(separation.value())
}

/// Resolve a J2000 catalog position at a local instant for a site.
///
/// # Arguments
///
/// * `catalog` - J2000 right ascension and declination
/// * `when` - Local time of evaluation
/// * `location` - Observer site
/// * `ephemeris` - Source of the apparent and horizontal place
///
/// # Returns
///
/// Apparent place, altitude/azimuth and local sidereal time.
pub fn resolve(
    catalog: &Equatorial,
    when: LocalTime,
    location: &GeographicLocation,
    ephemeris: &dyn Ephemeris,
) -> ResolvedPosition {
    let instant = when.with_timezone(&Utc);
    let apparent = ephemeris.apparent_position(catalog, instant);

    ResolvedPosition {
        apparent,
        horizontal: ephemeris.to_horizontal(&apparent, instant, location),
        local_sidereal_time: ephemeris.local_sidereal_time(instant, location),
        instant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::SiderustEphemeris;
    use chrono::TimeZone;

    #[test]
    fn test_hour_offset_wraps() {
        assert!((hour_offset(Hours::new(1.0), Hours::new(23.0)) - 2.0).abs() < 1e-12);
        assert!((hour_offset(Hours::new(23.0), Hours::new(1.0)) - 22.0).abs() < 1e-12);
        assert_eq!(hour_offset(Hours::new(5.0), Hours::new(5.0)), 0.0);
    }

    #[test]
    fn test_resolve_orientation() {
        let site = GeographicLocation::new(40.0, 0.0, Some(650.0)).unwrap();
        let when = Utc.with_ymd_and_hms(2024, 1, 15, 22, 0, 0).unwrap();
        let lst = SiderustEphemeris.local_sidereal_time(when, &site);

        // On the meridian south of the zenith
        let south = resolve(
            &Equatorial::new(lst.value(), 0.0),
            site.to_local(when),
            &site,
            &SiderustEphemeris,
        );
        let azimuth = south.azimuth();
        assert!((azimuth - 180.0).abs() < 1.0, "azimuth {}", azimuth);
        assert!((south.altitude() - 50.0).abs() < 0.5);

        // Rising targets are east of the meridian
        let rising = resolve(
            &Equatorial::new((lst.value() + 3.0).rem_euclid(24.0), 0.0),
            site.to_local(when),
            &site,
            &SiderustEphemeris,
        );
        assert!(rising.azimuth() > 0.0 && rising.azimuth() < 180.0);
        assert!(!rising.is_setting());
    }

    #[test]
    fn test_angular_separation() {
        let a = Equatorial::new(0.0, 0.0);
        assert!((angular_separation(&a, &Equatorial::new(0.0, 90.0)).value() - 90.0).abs() < 1e-6);
        assert!((angular_separation(&a, &Equatorial::new(12.0, 0.0)).value() - 180.0).abs() < 1e-6);
        assert!(angular_separation(&a, &a).value().abs() < 1e-6);
        assert!(
            (angular_separation(&Equatorial::new(10.0, 45.0), &Equatorial::new(10.0, 50.0))
                .value()
                - 5.0)
                .abs()
                < 1e-6
        );
    }
}
