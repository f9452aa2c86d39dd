//! Astronomy capabilities consumed by the scheduler core.
//!
//! The core never computes planetary theory itself. It asks an [`Ephemeris`]
//! for apparent positions, transits and the Moon, an [`Almanac`] for
//! astronomical twilight, and an optional [`ArtificialHorizon`] for the
//! obstruction mask of the site. [`SiderustEphemeris`] and [`HorizonMask`]
//! are the default implementations.

pub mod coordinates;
pub mod ephemeris;
pub mod horizon;

pub use coordinates::{angular_separation, hour_offset, resolve, ResolvedPosition};
pub use ephemeris::SiderustEphemeris;
pub use horizon::{HorizonMask, HorizonRegion};

use chrono::{DateTime, Duration, Utc};
use qtty::{Degrees, Hours};

use crate::api::GeographicLocation;

/// Equatorial coordinates: right ascension in hours, declination in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    pub ra: Hours,
    pub dec: Degrees,
}

impl Equatorial {
    pub fn new(ra_hours: f64, dec_degrees: f64) -> Self {
        Self {
            ra: Hours::new(ra_hours),
            dec: Degrees::new(dec_degrees),
        }
    }

    pub fn ra_hours(&self) -> f64 {
        self.ra.value()
    }

    pub fn dec_degrees(&self) -> f64 {
        self.dec.value()
    }
}

/// Horizontal coordinates. Azimuth is measured from north through east.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizontal {
    pub altitude: Degrees,
    pub azimuth: Degrees,
}

/// Moon position and phase at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonState {
    pub position: Equatorial,
    pub horizontal: Horizontal,
    /// Illuminated fraction in `[0, 1]`.
    pub illumination: f64,
}

/// Astronomical dawn and dusk as fractions of a day after the reference instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwilightEvents {
    pub dawn: f64,
    pub dusk: f64,
}

/// Positional astronomy used by scores and searches.
pub trait Ephemeris: Send + Sync {
    /// Apparent place of a J2000 catalog position at an instant.
    fn apparent_position(&self, catalog: &Equatorial, instant: DateTime<Utc>) -> Equatorial;

    /// Altitude and azimuth of an apparent place seen from the site.
    fn to_horizontal(
        &self,
        apparent: &Equatorial,
        instant: DateTime<Utc>,
        location: &GeographicLocation,
    ) -> Horizontal;

    fn local_sidereal_time(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Hours;

    /// First upper transit in `[from, from + span]`.
    fn next_transit(
        &self,
        catalog: &Equatorial,
        from: DateTime<Utc>,
        span: Duration,
        location: &GeographicLocation,
    ) -> Option<DateTime<Utc>>;

    /// Moon state, or `None` when no lunar model is available.
    fn moon(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Option<MoonState>;
}

/// Twilight almanac.
pub trait Almanac: Send + Sync {
    /// Next astronomical dawn and dusk within the day following `reference`.
    fn twilight(&self, reference: DateTime<Utc>, location: &GeographicLocation)
        -> TwilightEvents;
}

/// Obstruction mask of the observing site.
pub trait ArtificialHorizon: Send + Sync {
    /// `Err` carries the reason the position is obstructed.
    fn is_altitude_ok(&self, azimuth: Degrees, altitude: Degrees) -> Result<(), String>;

    /// Whether any region actually constrains altitude.
    fn has_constraints(&self) -> bool;
}
