//! Public API surface of the scheduler core.
//!
//! This file consolidates the data transfer types exchanged with the outer
//! scheduler: the observing site, the declarative job definition and the
//! job snapshot. All types derive Serialize/Deserialize.

pub use crate::astro::{Equatorial, Horizontal, MoonState};
pub use crate::config::{SchedulerConfig, SchedulerOptions};
pub use crate::context::SchedulerContext;
pub use crate::error::{SchedulerError, SchedulerResult};
pub use crate::models::{
    CompletionCondition, JobChange, JobConstraints, JobId, JobStage, JobStatus, LocalTime,
    SchedulerJob, StartupCondition, StepPipeline, When,
};
pub use crate::services::constraints::ConstraintViolation;
pub use crate::services::time_window::SearchOutcome;

use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Geographic location of the observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicLocation {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees, east positive (-180 to 180)
    pub longitude: f64,
    /// Elevation in meters above sea level (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
    /// Offset of local civil time from UTC, in hours
    #[serde(default)]
    pub utc_offset_hours: f64,
}

impl GeographicLocation {
    pub fn new(latitude: f64, longitude: f64, elevation_m: Option<f64>) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err("Latitude must be between -90 and 90 degrees".to_string());
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err("Longitude must be between -180 and 180 degrees".to_string());
        }
        Ok(Self {
            latitude,
            longitude,
            elevation_m,
            utc_offset_hours: 0.0,
        })
    }

    pub fn with_utc_offset(mut self, hours: f64) -> Result<Self, String> {
        if !(-14.0..=14.0).contains(&hours) {
            return Err("UTC offset must be between -14 and 14 hours".to_string());
        }
        self.utc_offset_hours = hours;
        Ok(self)
    }

    /// Fixed offset of local civil time.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt((self.utc_offset_hours * 3600.0).round() as i32)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Express an instant in local civil time.
    pub fn to_local<Tz: TimeZone>(&self, instant: DateTime<Tz>) -> LocalTime {
        instant.with_timezone(&self.offset())
    }
}

/// Declared startup of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum StartupDefinition {
    #[default]
    Asap,
    Culmination,
    At { time: DateTime<FixedOffset> },
}

/// Declared completion of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum CompletionDefinition {
    #[default]
    Sequence,
    Repeat { count: u32 },
    Loop,
    At { time: DateTime<FixedOffset> },
}

/// Declarative description of a job, as read from a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    /// J2000 right ascension in hours
    pub target_ra_hours: f64,
    /// J2000 declination in degrees
    pub target_dec_degrees: f64,
    #[serde(default)]
    pub position_angle: Option<f64>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub min_altitude: Option<f64>,
    #[serde(default)]
    pub min_moon_separation: Option<f64>,
    #[serde(default = "default_true")]
    pub enforce_twilight: bool,
    #[serde(default)]
    pub enforce_artificial_horizon: bool,
    #[serde(default)]
    pub enforce_weather: bool,
    #[serde(default)]
    pub startup: StartupDefinition,
    #[serde(default)]
    pub completion: CompletionDefinition,
    #[serde(default)]
    pub estimated_duration_secs: Option<i64>,
    #[serde(default)]
    pub culmination_offset_minutes: i32,
    #[serde(default)]
    pub steps: StepPipeline,
    #[serde(default)]
    pub in_sequence_focus: bool,
    #[serde(default)]
    pub sequence_count: u32,
}

impl JobDefinition {
    /// Read a JSON job file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn default_priority() -> u8 {
    10
}

fn default_true() -> bool {
    true
}

/// Point-in-time export of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    #[serde(rename = "pa")]
    pub position_angle: Option<f64>,
    #[serde(rename = "targetRA")]
    pub target_ra: f64,
    #[serde(rename = "targetDEC")]
    pub target_dec: f64,
    pub state: JobStatus,
    pub stage: JobStage,
    pub sequence_count: u32,
    pub completed_count: u32,
    pub min_altitude: Option<f64>,
    pub min_moon_separation: Option<f64>,
    pub estimated_time: Option<i64>,
    pub culmination_offset: i32,
    pub priority: u8,
    pub lead_time: i64,
    pub repeats_required: u32,
    pub repeats_remaining: u32,
    pub in_sequence_focus: bool,
    pub score: i32,
    pub startup_condition: StartupCondition,
    pub completion_condition: CompletionCondition,
    pub startup_time: Option<LocalTime>,
    pub completion_time: Option<LocalTime>,
}
