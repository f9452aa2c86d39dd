//! Ephemeris and twilight almanac backed by siderust.
//!
//! Catalog positions are rotated from ICRS to the true equator and equinox
//! of date, then to the local horizon. Transits are upper culminations found
//! by the siderust altitude search; astronomical twilight is the Sun crossing
//! `twilight::ASTRONOMICAL`.

use chrono::{DateTime, Duration, Utc};
use qtty::{Degrees, Hours};
use siderust::astro::earth_rotation::gmst_from_tt;
use siderust::bodies::solar_system::Moon;
use siderust::bodies::Sun;
use siderust::coordinates::centers::Geodetic;
use siderust::coordinates::frames::{EquatorialTrueOfDate, ECEF};
use siderust::coordinates::spherical::direction;
use siderust::coordinates::transform::SphericalDirectionAstroExt;
use siderust::event::altitude::{
    crossings, culminations, AltitudeProvider, CrossingDirection, CulminationKind, SearchOpts,
};
use siderust::qtty::{Days, Degree, Kilometer, Meter, Quantity};
use siderust::time::{Interval, JulianDate, ModifiedJulianDate as SiderustMJD};
use siderust::twilight;

use super::{Almanac, Ephemeris, Equatorial, Horizontal, MoonState, TwilightEvents};
use crate::api::GeographicLocation;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Positional astronomy and twilight through siderust.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiderustEphemeris;

impl SiderustEphemeris {
    pub fn new() -> Self {
        Self
    }

    /// Sun altitude seen from `location`, `None` outside the supported time range.
    pub fn sun_altitude(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Option<f64> {
        let mjd = to_mjd(instant)?;
        let altitude = Sun.altitude_at(&observer_site(location), mjd);
        Some(altitude.to::<Degree>().value())
    }

    fn sun_culmination(
        &self,
        window: Interval<SiderustMJD>,
        site: &Geodetic<ECEF>,
        kind: CulminationKind,
    ) -> Option<SiderustMJD> {
        culminations(&Sun, site, window, SearchOpts::default())
            .into_iter()
            .find(|event| event.kind == kind)
            .map(|event| event.mjd)
    }
}

/// Observer site from a geographic location.
fn observer_site(location: &GeographicLocation) -> Geodetic<ECEF> {
    Geodetic::<ECEF>::new(
        siderust::qtty::Degrees::new(location.longitude),
        siderust::qtty::Degrees::new(location.latitude),
        Quantity::<Meter>::new(location.elevation_m.unwrap_or(0.0)),
    )
}

fn to_mjd(instant: DateTime<Utc>) -> Option<SiderustMJD> {
    SiderustMJD::try_from_chrono(instant).ok()
}

fn to_jd(instant: DateTime<Utc>) -> Option<JulianDate> {
    JulianDate::try_from_chrono(instant).ok()
}

fn true_of_date(position: &Equatorial) -> direction::EquatorialTrueOfDate {
    direction::EquatorialTrueOfDate::new(
        siderust::qtty::Degrees::new(position.ra_hours() * 15.0),
        siderust::qtty::Degrees::new(position.dec_degrees()),
    )
}

fn from_degrees(ra: siderust::qtty::Degrees, dec: siderust::qtty::Degrees) -> Equatorial {
    Equatorial::new(ra.value().rem_euclid(360.0) / 15.0, dec.value())
}

fn day_fraction(reference: DateTime<Utc>, event: SiderustMJD) -> Option<f64> {
    let at = event.to_chrono()?;
    Some((at - reference).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY)
}

impl Ephemeris for SiderustEphemeris {
    fn apparent_position(&self, catalog: &Equatorial, instant: DateTime<Utc>) -> Equatorial {
        let Some(jd) = to_jd(instant) else {
            return *catalog;
        };
        let icrs = direction::ICRS::new(
            siderust::qtty::Degrees::new(catalog.ra_hours() * 15.0),
            siderust::qtty::Degrees::new(catalog.dec_degrees()),
        );
        let apparent: direction::EquatorialTrueOfDate = icrs.to_frame::<EquatorialTrueOfDate>(&jd);
        from_degrees(apparent.ra(), apparent.dec())
    }

    fn to_horizontal(
        &self,
        apparent: &Equatorial,
        instant: DateTime<Utc>,
        location: &GeographicLocation,
    ) -> Horizontal {
        let Some(jd) = to_jd(instant) else {
            return Horizontal {
                altitude: Degrees::new(-90.0),
                azimuth: Degrees::new(0.0),
            };
        };
        let horizontal = true_of_date(apparent).to_horizontal(&jd, &observer_site(location));
        Horizontal {
            altitude: Degrees::new(horizontal.alt().value()),
            azimuth: Degrees::new(horizontal.az().value().rem_euclid(360.0)),
        }
    }

    fn local_sidereal_time(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Hours {
        let gmst = to_jd(instant).map_or(0.0, |jd| gmst_from_tt(jd).to::<Degree>().value());
        Hours::new(((gmst + location.longitude) / 15.0).rem_euclid(24.0))
    }

    fn next_transit(
        &self,
        catalog: &Equatorial,
        from: DateTime<Utc>,
        span: Duration,
        location: &GeographicLocation,
    ) -> Option<DateTime<Utc>> {
        let start = to_mjd(from)?;
        let end = to_mjd(from + span)?;
        let target = direction::ICRS::new(
            siderust::qtty::Degrees::new(catalog.ra_hours() * 15.0),
            siderust::qtty::Degrees::new(catalog.dec_degrees()),
        );

        culminations(
            &target,
            &observer_site(location),
            Interval::new(start, end),
            SearchOpts::default(),
        )
        .into_iter()
        .find(|event| event.kind == CulminationKind::Max)
        .and_then(|event| event.mjd.to_chrono())
    }

    fn moon(&self, instant: DateTime<Utc>, location: &GeographicLocation) -> Option<MoonState> {
        let jd = to_jd(instant)?;
        let site = observer_site(location);

        let topocentric = Moon::get_apparent_topocentric_equ::<Kilometer>(jd, site);
        let position = from_degrees(topocentric.ra(), topocentric.dec());
        let horizontal = Moon::get_horizontal::<Kilometer>(jd, site);
        let illumination = Moon::phase_topocentric(jd, site).illuminated_fraction.value();

        Some(MoonState {
            position,
            horizontal: Horizontal {
                altitude: Degrees::new(horizontal.alt().value()),
                azimuth: Degrees::new(horizontal.az().value().rem_euclid(360.0)),
            },
            illumination: illumination.clamp(0.0, 1.0),
        })
    }
}

impl Almanac for SiderustEphemeris {
    fn twilight(&self, reference: DateTime<Utc>, location: &GeographicLocation) -> TwilightEvents {
        let site = observer_site(location);
        let Some(start) = to_mjd(reference) else {
            log::warn!("No twilight data for {}", reference);
            return TwilightEvents { dawn: 0.0, dusk: 0.0 };
        };
        let window = Interval::new(start, start + Days::new(1.0));

        let events = crossings(&Sun, &site, window, twilight::ASTRONOMICAL, SearchOpts::default());
        let first = |direction: CrossingDirection| {
            events
                .iter()
                .find(|event| event.direction == direction)
                .and_then(|event| day_fraction(reference, event.mjd))
        };
        let dawn = first(CrossingDirection::Rising);
        let dusk = first(CrossingDirection::Setting);

        match (dawn, dusk) {
            (Some(dawn), Some(dusk)) => TwilightEvents { dawn, dusk },
            (None, None) => {
                let light = Sun.altitude_at(&site, start).to::<Degree>() >= twilight::ASTRONOMICAL;
                if light {
                    // No night at all: dawn never precedes dusk
                    let lowest = self
                        .sun_culmination(window, &site, CulminationKind::Min)
                        .and_then(|mjd| day_fraction(reference, mjd))
                        .unwrap_or(0.0);
                    log::trace!("Sun stays above twilight altitude at {:?}", location);
                    TwilightEvents {
                        dawn: lowest,
                        dusk: lowest,
                    }
                } else {
                    // Polar night: a one-second day at the highest Sun
                    let highest = self
                        .sun_culmination(window, &site, CulminationKind::Max)
                        .and_then(|mjd| day_fraction(reference, mjd))
                        .unwrap_or(0.0);
                    log::trace!("Sun stays below twilight altitude at {:?}", location);
                    TwilightEvents {
                        dawn: highest,
                        dusk: highest + 1.0 / SECONDS_PER_DAY,
                    }
                }
            }
            (dawn, dusk) => TwilightEvents {
                dawn: dawn.unwrap_or(1.0),
                dusk: dusk.unwrap_or(1.0),
            },
        }
    }
}
