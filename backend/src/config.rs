//! Scheduler configuration file support.
//!
//! Global scheduling options live in a TOML file with `[location]`,
//! `[limits]`, `[twilight]` and `[scheduling]` sections plus optional
//! `[[horizon]]` regions. Selected options can be overridden from the
//! environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::GeographicLocation;
use crate::astro::{HorizonMask, HorizonRegion};
use crate::error::{SchedulerError, SchedulerResult};

/// Mount altitude limits, applied to every job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeLimits {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min_altitude: f64,
    #[serde(default = "default_max_altitude")]
    pub max_altitude: f64,
}

/// Twilight window adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwilightOptions {
    /// Margin before astronomical dawn at which night is considered over.
    #[serde(default = "default_pre_dawn_minutes")]
    pub pre_dawn_minutes: f64,
    /// Shift applied to almanac dawn, in hours.
    #[serde(default)]
    pub dawn_offset_hours: f64,
    /// Shift applied to almanac dusk, in hours.
    #[serde(default)]
    pub dusk_offset_hours: f64,
}

/// Search tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingOptions {
    /// Slack added to culmination times, in minutes.
    #[serde(default = "default_lead_time_minutes")]
    pub lead_time_minutes: f64,
    /// Altitude margin that setting targets must keep above their constraint.
    #[serde(default = "default_setting_altitude_cutoff")]
    pub setting_altitude_cutoff: f64,
}

fn default_max_altitude() -> f64 {
    90.0
}

fn default_pre_dawn_minutes() -> f64 {
    5.0
}

fn default_lead_time_minutes() -> f64 {
    5.0
}

fn default_setting_altitude_cutoff() -> f64 {
    3.0
}

impl Default for AltitudeLimits {
    fn default() -> Self {
        Self {
            enabled: false,
            min_altitude: 0.0,
            max_altitude: default_max_altitude(),
        }
    }
}

impl Default for TwilightOptions {
    fn default() -> Self {
        Self {
            pre_dawn_minutes: default_pre_dawn_minutes(),
            dawn_offset_hours: 0.0,
            dusk_offset_hours: 0.0,
        }
    }
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self {
            lead_time_minutes: default_lead_time_minutes(),
            setting_altitude_cutoff: default_setting_altitude_cutoff(),
        }
    }
}

/// Global options read by every job of a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerOptions {
    #[serde(default)]
    pub limits: AltitudeLimits,
    #[serde(default)]
    pub twilight: TwilightOptions,
    #[serde(default)]
    pub scheduling: SchedulingOptions,
}

impl SchedulerOptions {
    /// Apply environment overrides.
    ///
    /// # Environment Variables
    /// - `TSI_ENABLE_ALT_LIMITS`: `true`/`false`
    /// - `TSI_MIN_ALT_LIMIT`, `TSI_MAX_ALT_LIMIT`: degrees
    /// - `TSI_PRE_DAWN_MINUTES`: minutes
    /// - `TSI_LEAD_TIME_MINUTES`: minutes
    /// - `TSI_SETTING_CUTOFF`: degrees
    ///
    /// # Errors
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn with_env_overrides(mut self) -> SchedulerResult<Self> {
        if let Some(v) = env_value::<bool>("TSI_ENABLE_ALT_LIMITS")? {
            self.limits.enabled = v;
        }
        if let Some(v) = env_value::<f64>("TSI_MIN_ALT_LIMIT")? {
            self.limits.min_altitude = v;
        }
        if let Some(v) = env_value::<f64>("TSI_MAX_ALT_LIMIT")? {
            self.limits.max_altitude = v;
        }
        if let Some(v) = env_value::<f64>("TSI_PRE_DAWN_MINUTES")? {
            self.twilight.pre_dawn_minutes = v;
        }
        if let Some(v) = env_value::<f64>("TSI_LEAD_TIME_MINUTES")? {
            self.scheduling.lead_time_minutes = v;
        }
        if let Some(v) = env_value::<f64>("TSI_SETTING_CUTOFF")? {
            self.scheduling.setting_altitude_cutoff = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check option ranges.
    pub fn validate(&self) -> SchedulerResult<()> {
        let limits = &self.limits;
        if limits.enabled && limits.min_altitude > limits.max_altitude {
            return Err(SchedulerError::ConfigurationError(format!(
                "limits.min_altitude {} exceeds limits.max_altitude {}",
                limits.min_altitude, limits.max_altitude
            )));
        }
        if self.scheduling.lead_time_minutes < 0.0 {
            return Err(SchedulerError::ConfigurationError(
                "scheduling.lead_time_minutes must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> SchedulerResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            SchedulerError::ConfigurationError(format!("Invalid value for {}: {:?}", key, raw))
        }),
        Err(_) => Ok(None),
    }
}

/// Complete scheduler configuration from file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub location: GeographicLocation,
    #[serde(default)]
    pub limits: AltitudeLimits,
    #[serde(default)]
    pub twilight: TwilightOptions,
    #[serde(default)]
    pub scheduling: SchedulingOptions,
    #[serde(default)]
    pub horizon: Vec<HorizonRegion>,
}

impl SchedulerConfig {
    /// Load scheduler configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(SchedulerConfig)` if successful
    /// * `Err(SchedulerError)` if file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            SchedulerError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> SchedulerResult<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load scheduler configuration from the default location.
    ///
    /// Searches for `scheduler.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> SchedulerResult<Self> {
        let search_paths = [
            PathBuf::from("scheduler.toml"),
            PathBuf::from("backend/scheduler.toml"),
            PathBuf::from("../scheduler.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                log::debug!("Loading scheduler configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Err(SchedulerError::ConfigurationError(
            "No scheduler.toml found in standard locations".to_string(),
        ))
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        GeographicLocation::new(
            self.location.latitude,
            self.location.longitude,
            self.location.elevation_m,
        )
        .and_then(|loc| loc.with_utc_offset(self.location.utc_offset_hours))
        .map_err(SchedulerError::InvalidLocation)?;
        self.options().validate()
    }

    /// Global options carried by this configuration.
    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            limits: self.limits.clone(),
            twilight: self.twilight.clone(),
            scheduling: self.scheduling.clone(),
        }
    }

    /// Artificial horizon built from the `[[horizon]]` regions, if any.
    pub fn horizon_mask(&self) -> Option<HorizonMask> {
        if self.horizon.is_empty() {
            None
        } else {
            Some(HorizonMask::new(self.horizon.clone()))
        }
    }
}
