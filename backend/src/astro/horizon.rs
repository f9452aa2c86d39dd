//! Artificial horizon made of azimuth/altitude polylines.

use qtty::Degrees;
use serde::{Deserialize, Serialize};

use super::ArtificialHorizon;

/// One obstruction outline, e.g. a building or a tree line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonRegion {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// `(azimuth, altitude)` vertices in degrees, ordered by azimuth.
    pub points: Vec<(f64, f64)>,
}

fn default_enabled() -> bool {
    true
}

impl HorizonRegion {
    pub fn new(name: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            points,
        }
    }

    fn constrains(&self) -> bool {
        self.enabled && self.points.len() >= 2
    }

    /// Interpolated minimum altitude at `azimuth`, if the region spans it.
    fn floor_at(&self, azimuth: f64) -> Option<f64> {
        self.points.windows(2).find_map(|segment| {
            let ((az0, alt0), (az1, alt1)) = (segment[0], segment[1]);
            if azimuth < az0 || azimuth > az1 {
                return None;
            }
            if (az1 - az0).abs() < f64::EPSILON {
                return Some(alt0.max(alt1));
            }
            Some(alt0 + (alt1 - alt0) * (azimuth - az0) / (az1 - az0))
        })
    }
}

/// Site obstruction mask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonMask {
    regions: Vec<HorizonRegion>,
}

impl HorizonMask {
    pub fn new(regions: Vec<HorizonRegion>) -> Self {
        let mut mask = Self::default();
        for region in regions {
            mask.add_region(region);
        }
        mask
    }

    pub fn add_region(&mut self, mut region: HorizonRegion) {
        region.points.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.regions.push(region);
    }

    pub fn regions(&self) -> &[HorizonRegion] {
        &self.regions
    }
}

impl ArtificialHorizon for HorizonMask {
    fn is_altitude_ok(&self, azimuth: Degrees, altitude: Degrees) -> Result<(), String> {
        let (az, alt) = (azimuth.value().rem_euclid(360.0), altitude.value());
        for region in self.regions.iter().filter(|r| r.constrains()) {
            if let Some(floor) = region.floor_at(az) {
                if alt < floor {
                    return Err(format!(
                        "altitude {:.1} < horizon {:.1} ({})",
                        alt, floor, region.name
                    ));
                }
            }
        }
        Ok(())
    }

    fn has_constraints(&self) -> bool {
        self.regions.iter().any(HorizonRegion::constrains)
    }
}
