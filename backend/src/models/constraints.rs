use qtty::Degrees;

/// Per-job observing constraints.
///
/// Weather enforcement is carried for the outer scheduler and never
/// evaluated here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JobConstraints {
    pub min_altitude: Option<Degrees>,
    pub min_moon_separation: Option<Degrees>,
    pub enforce_twilight: bool,
    pub enforce_artificial_horizon: bool,
    pub enforce_weather: bool,
}

impl JobConstraints {
    pub fn min_altitude_degrees(&self) -> Option<f64> {
        self.min_altitude.map(|v| v.value())
    }

    /// Minimum Moon separation, when set to a positive value.
    pub fn min_moon_separation_degrees(&self) -> Option<f64> {
        self.min_moon_separation
            .map(|v| v.value())
            .filter(|v| *v > 0.0)
    }
}
