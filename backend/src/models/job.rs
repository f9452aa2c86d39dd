//! Scheduler job record.
//!
//! A [`SchedulerJob`] holds one observation task: its target, constraints,
//! startup/completion conditions and the timing derived from them. Setters
//! keep the record consistent after every mutation:
//!
//! - completion time is set for `Sequence`, `Repeat` and `At`, unset for `Loop`
//! - `Loop` and `At` require no repeats, `Sequence` one, `Repeat` at least one
//! - with both startup and completion fixed, the estimate is their difference
//!
//! Every setter records a [`JobChange`]; presentation layers drain them with
//! [`SchedulerJob::take_changes`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use qtty::Degrees;
use serde::{Deserialize, Serialize};

use super::{JobConstraints, LocalTime, When};
use crate::api::{CompletionDefinition, JobDefinition, JobSnapshot, StartupDefinition};
use crate::astro::Equatorial;
use crate::context::SchedulerContext;
use crate::error::{SchedulerError, SchedulerResult};
use crate::services::constraints::{self as constraint_service, ConstraintViolation};
use crate::services::scoring;
use crate::services::start_time_cache::StartTimeCache;
use crate::services::time_window::{self, SearchOutcome};

crate::define_id_type!(u64, JobId, "job");

/// Lifecycle state of a job, driven by the outer scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Evaluation,
    Scheduled,
    Busy,
    Error,
    Aborted,
    Invalid,
    Complete,
}

/// Progress of a running job through its observation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Idle,
    Slewing,
    SlewComplete,
    Focusing,
    FocusComplete,
    Aligning,
    AlignComplete,
    Reslewing,
    ReslewingComplete,
    PostAlignFocusing,
    PostAlignFocusingComplete,
    Guiding,
    GuidingComplete,
    Capturing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupCondition {
    #[default]
    Asap,
    Culmination,
    At,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCondition {
    #[default]
    Sequence,
    Repeat,
    Loop,
    At,
}

/// Preparation steps run before capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepPipeline {
    #[serde(default)]
    pub track: bool,
    #[serde(default)]
    pub focus: bool,
    #[serde(default)]
    pub align: bool,
    #[serde(default)]
    pub guide: bool,
}

/// Kind of field touched by a setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobChange {
    Name,
    Target,
    Constraints,
    Status,
    Stage,
    Startup,
    Completion,
    Estimate,
    Repeats,
    Score,
    LeadTime,
    Counts,
    /// The job entered the error state.
    Failed,
}

/// One schedulable observation task.
#[derive(Debug, Clone)]
pub struct SchedulerJob {
    context: Arc<SchedulerContext>,
    id: JobId,
    name: String,

    target: Equatorial,
    apparent_target: Equatorial,
    position_angle: Option<f64>,
    constraints: JobConstraints,
    pipeline: StepPipeline,
    in_sequence_focus: bool,
    light_frames_required: bool,

    file_startup_condition: StartupCondition,
    file_startup_time: Option<LocalTime>,
    startup_condition: StartupCondition,
    startup_time: Option<LocalTime>,
    completion_condition: CompletionCondition,
    completion_time: Option<LocalTime>,
    greedy_completion_time: Option<LocalTime>,
    estimated_time: Option<i64>,
    anchor: LocalTime,

    altitude_at_startup: f64,
    is_setting_at_startup: bool,
    altitude_at_completion: f64,
    is_setting_at_completion: bool,
    next_dawn: Option<LocalTime>,
    next_dusk: Option<LocalTime>,

    repeats_required: u32,
    repeats_remaining: u32,
    sequence_count: u32,
    completed_count: u32,
    priority: u8,
    culmination_offset: i32,
    lead_time: i64,
    score: i32,

    state: JobStatus,
    stage: JobStage,
    state_time: LocalTime,
    last_abort_time: Option<LocalTime>,
    last_error_time: Option<LocalTime>,
    stop_reason: Option<String>,

    start_time_cache: StartTimeCache,
    changes: Vec<JobChange>,
}

impl SchedulerJob {
    /// Create an idle ASAP/Sequence job for a J2000 target.
    pub fn new(name: impl Into<String>, target: Equatorial, context: Arc<SchedulerContext>) -> Self {
        let now = context.now();
        let mut job = Self {
            id: context.next_job_id(),
            name: name.into(),
            target,
            apparent_target: target,
            position_angle: None,
            constraints: JobConstraints::default(),
            pipeline: StepPipeline::default(),
            in_sequence_focus: false,
            light_frames_required: false,
            file_startup_condition: StartupCondition::Asap,
            file_startup_time: None,
            startup_condition: StartupCondition::Asap,
            startup_time: None,
            completion_condition: CompletionCondition::Sequence,
            completion_time: Some(now),
            greedy_completion_time: None,
            estimated_time: None,
            anchor: now,
            altitude_at_startup: 0.0,
            is_setting_at_startup: false,
            altitude_at_completion: 0.0,
            is_setting_at_completion: false,
            next_dawn: None,
            next_dusk: None,
            repeats_required: 1,
            repeats_remaining: 1,
            sequence_count: 0,
            completed_count: 0,
            priority: 10,
            culmination_offset: 0,
            lead_time: 0,
            score: 0,
            state: JobStatus::Idle,
            stage: JobStage::Idle,
            state_time: now,
            last_abort_time: None,
            last_error_time: None,
            stop_reason: None,
            start_time_cache: StartTimeCache::new(),
            changes: Vec::new(),
            context,
        };
        job.refresh_apparent_target();
        job.refresh_startup_altitude();
        job.set_estimated_time(None);
        job.refresh_dawn_dusk();
        job.changes.clear();
        job
    }

    /// Build a job from its declarative definition.
    ///
    /// Conditions are applied through the setters, so the resulting job
    /// satisfies the same invariants as one edited interactively.
    pub fn from_definition(
        definition: &JobDefinition,
        context: Arc<SchedulerContext>,
    ) -> SchedulerResult<Self> {
        if !(0.0..24.0).contains(&definition.target_ra_hours) {
            return Err(SchedulerError::InvalidJob(format!(
                "right ascension {} out of range [0, 24)",
                definition.target_ra_hours
            )));
        }
        if !(-90.0..=90.0).contains(&definition.target_dec_degrees) {
            return Err(SchedulerError::InvalidJob(format!(
                "declination {} out of range [-90, 90]",
                definition.target_dec_degrees
            )));
        }
        if definition.completion == (CompletionDefinition::Repeat { count: 0 }) {
            return Err(SchedulerError::InvalidJob(
                "repeat completion requires at least one repeat".to_string(),
            ));
        }

        let target = Equatorial::new(definition.target_ra_hours, definition.target_dec_degrees);
        let mut job = SchedulerJob::new(definition.name.clone(), target, context);
        let offset = job.context.location().offset();

        job.position_angle = definition.position_angle;
        job.priority = definition.priority;
        job.culmination_offset = definition.culmination_offset_minutes;
        job.pipeline = definition.steps;
        job.in_sequence_focus = definition.in_sequence_focus;
        job.sequence_count = definition.sequence_count;
        job.constraints = JobConstraints {
            min_altitude: definition.min_altitude.map(Degrees::new),
            min_moon_separation: definition.min_moon_separation.map(Degrees::new),
            enforce_twilight: definition.enforce_twilight,
            enforce_artificial_horizon: definition.enforce_artificial_horizon,
            enforce_weather: definition.enforce_weather,
        };

        match &definition.startup {
            StartupDefinition::Asap => job.set_file_startup_condition(StartupCondition::Asap),
            StartupDefinition::Culmination => {
                job.set_file_startup_condition(StartupCondition::Culmination)
            }
            StartupDefinition::At { time } => {
                job.set_file_startup_time(Some(time.with_timezone(&offset)));
                job.set_file_startup_condition(StartupCondition::At);
            }
        }
        job.set_startup_condition(job.file_startup_condition);
        job.set_startup_time(job.file_startup_time);

        match &definition.completion {
            CompletionDefinition::Sequence => job.set_completion_condition(CompletionCondition::Sequence),
            CompletionDefinition::Repeat { count } => job.set_repeats_required(*count),
            CompletionDefinition::Loop => job.set_completion_condition(CompletionCondition::Loop),
            CompletionDefinition::At { time } => {
                job.set_completion_time(Some(time.with_timezone(&offset)))
            }
        }
        job.repeats_remaining = job.repeats_required;
        job.set_estimated_time(definition.estimated_duration_secs);

        job.changes.clear();
        Ok(job)
    }

    // ----- accessors -----

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Arc<SchedulerContext> {
        &self.context
    }

    pub fn target(&self) -> &Equatorial {
        &self.target
    }

    /// Apparent place computed when the target was last set.
    pub fn apparent_target(&self) -> &Equatorial {
        &self.apparent_target
    }

    pub fn position_angle(&self) -> Option<f64> {
        self.position_angle
    }

    pub fn constraints(&self) -> &JobConstraints {
        &self.constraints
    }

    pub fn step_pipeline(&self) -> StepPipeline {
        self.pipeline
    }

    pub fn in_sequence_focus(&self) -> bool {
        self.in_sequence_focus
    }

    pub fn light_frames_required(&self) -> bool {
        self.light_frames_required
    }

    pub fn file_startup_condition(&self) -> StartupCondition {
        self.file_startup_condition
    }

    pub fn file_startup_time(&self) -> Option<LocalTime> {
        self.file_startup_time
    }

    pub fn startup_condition(&self) -> StartupCondition {
        self.startup_condition
    }

    pub fn startup_time(&self) -> Option<LocalTime> {
        self.startup_time
    }

    pub fn completion_condition(&self) -> CompletionCondition {
        self.completion_condition
    }

    pub fn completion_time(&self) -> Option<LocalTime> {
        self.completion_time
    }

    pub fn greedy_completion_time(&self) -> Option<LocalTime> {
        self.greedy_completion_time
    }

    /// Estimated duration in seconds, `None` when not estimated yet.
    pub fn estimated_time(&self) -> Option<i64> {
        self.estimated_time
    }

    pub fn altitude_at_startup(&self) -> f64 {
        self.altitude_at_startup
    }

    pub fn is_setting_at_startup(&self) -> bool {
        self.is_setting_at_startup
    }

    pub fn altitude_at_completion(&self) -> f64 {
        self.altitude_at_completion
    }

    pub fn is_setting_at_completion(&self) -> bool {
        self.is_setting_at_completion
    }

    pub fn next_dawn(&self) -> Option<LocalTime> {
        self.next_dawn
    }

    pub fn next_dusk(&self) -> Option<LocalTime> {
        self.next_dusk
    }

    pub fn repeats_required(&self) -> u32 {
        self.repeats_required
    }

    pub fn repeats_remaining(&self) -> u32 {
        self.repeats_remaining
    }

    pub fn sequence_count(&self) -> u32 {
        self.sequence_count
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Culmination offset in minutes.
    pub fn culmination_offset(&self) -> i32 {
        self.culmination_offset
    }

    /// Lead time in seconds.
    pub fn lead_time(&self) -> i64 {
        self.lead_time
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn state(&self) -> JobStatus {
        self.state
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn state_time(&self) -> LocalTime {
        self.state_time
    }

    pub fn last_abort_time(&self) -> Option<LocalTime> {
        self.last_abort_time
    }

    pub fn last_error_time(&self) -> Option<LocalTime> {
        self.last_error_time
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub(crate) fn start_time_cache_mut(&mut self) -> &mut StartTimeCache {
        &mut self.start_time_cache
    }

    pub fn start_time_cache(&self) -> &StartTimeCache {
        &self.start_time_cache
    }

    // ----- plain setters -----

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.notify(JobChange::Name);
    }

    /// Replace the target and recompute everything derived from it.
    pub fn set_target(&mut self, target: Equatorial) {
        self.target = target;
        self.refresh_apparent_target();
        self.start_time_cache.clear();
        self.refresh_startup_altitude();
        self.refresh_completion_altitude();
        self.notify(JobChange::Target);
    }

    pub fn set_position_angle(&mut self, value: Option<f64>) {
        self.position_angle = value;
        self.notify(JobChange::Target);
    }

    pub fn set_min_altitude(&mut self, value: Option<f64>) {
        self.constraints.min_altitude = value.map(Degrees::new);
        self.constraints_changed();
    }

    pub fn set_min_moon_separation(&mut self, value: Option<f64>) {
        self.constraints.min_moon_separation = value.map(Degrees::new);
        self.constraints_changed();
    }

    pub fn set_enforce_twilight(&mut self, value: bool) {
        self.constraints.enforce_twilight = value;
        self.constraints_changed();
    }

    pub fn set_enforce_artificial_horizon(&mut self, value: bool) {
        self.constraints.enforce_artificial_horizon = value;
        self.constraints_changed();
    }

    pub fn set_enforce_weather(&mut self, value: bool) {
        self.constraints.enforce_weather = value;
        self.notify(JobChange::Constraints);
    }

    pub fn set_step_pipeline(&mut self, value: StepPipeline) {
        self.pipeline = value;
    }

    pub fn set_in_sequence_focus(&mut self, value: bool) {
        self.in_sequence_focus = value;
    }

    pub fn set_light_frames_required(&mut self, value: bool) {
        self.light_frames_required = value;
    }

    pub fn set_priority(&mut self, value: u8) {
        self.priority = value;
    }

    /// Offset from culmination in minutes.
    pub fn set_culmination_offset(&mut self, minutes: i32) {
        self.culmination_offset = minutes;
    }

    /// Lead time in seconds.
    pub fn set_lead_time(&mut self, seconds: i64) {
        self.lead_time = seconds;
        self.notify(JobChange::LeadTime);
    }

    pub fn set_score(&mut self, value: i32) {
        self.score = value;
        self.notify(JobChange::Score);
    }

    pub fn set_sequence_count(&mut self, count: u32) {
        self.sequence_count = count;
        self.notify(JobChange::Counts);
    }

    pub fn set_completed_count(&mut self, count: u32) {
        self.completed_count = count;
        self.notify(JobChange::Counts);
    }

    pub fn set_repeats_remaining(&mut self, value: u32) {
        self.repeats_remaining = value;
        self.notify(JobChange::Repeats);
    }

    pub fn set_stage(&mut self, value: JobStage) {
        self.stage = value;
        self.notify(JobChange::Stage);
    }

    pub fn set_stop_reason(&mut self, reason: Option<String>) {
        self.stop_reason = reason;
    }

    pub fn set_greedy_completion_time(&mut self, value: Option<LocalTime>) {
        self.greedy_completion_time = value;
    }

    pub fn set_file_startup_condition(&mut self, value: StartupCondition) {
        self.file_startup_condition = value;
    }

    pub fn set_file_startup_time(&mut self, value: Option<LocalTime>) {
        self.file_startup_time = value;
    }

    // ----- invariant-maintaining setters -----

    /// Change the lifecycle state.
    ///
    /// Entering `Invalid` or `Idle` restores the declared startup and drops
    /// the estimate. Entering `Aborted` restores the declared startup
    /// condition only. Entering `Error` records the error time.
    pub fn set_state(&mut self, value: JobStatus) {
        let now = self.context.now();
        self.state = value;
        self.state_time = now;

        match value {
            JobStatus::Error => {
                self.last_error_time = Some(now);
                self.notify(JobChange::Failed);
                log::warn!("Job '{}' failed", self.name);
            }
            JobStatus::Invalid | JobStatus::Idle => {
                self.set_startup_condition(self.file_startup_condition);
                self.set_startup_time(self.file_startup_time);
                self.set_estimated_time(None);
            }
            JobStatus::Aborted => {
                self.last_abort_time = Some(now);
                self.set_startup_condition(self.file_startup_condition);
            }
            _ => {}
        }

        self.notify(JobChange::Status);
        self.debug_assert_invariants();
    }

    pub fn set_startup_condition(&mut self, value: StartupCondition) {
        self.startup_condition = value;
        match value {
            StartupCondition::Asap => self.startup_time = None,
            StartupCondition::At if self.startup_time.is_none() => {
                self.startup_time = self.file_startup_time
            }
            _ => {}
        }

        self.set_estimated_time(self.estimated_time);
        self.refresh_dawn_dusk();
        self.notify(JobChange::Startup);
        self.debug_assert_invariants();
    }

    /// Set a fixed startup time, or fall back to the declared startup.
    pub fn set_startup_time(&mut self, value: Option<LocalTime>) {
        match value {
            Some(time) => {
                self.startup_time = Some(time);
                self.startup_condition = StartupCondition::At;
            }
            None => {
                self.startup_condition = self.file_startup_condition;
                self.startup_time = match self.file_startup_condition {
                    StartupCondition::At => self.file_startup_time,
                    _ => None,
                };
            }
        }

        self.refresh_startup_altitude();
        self.set_estimated_time(self.estimated_time);
        self.refresh_dawn_dusk();
        self.notify(JobChange::Startup);
        self.debug_assert_invariants();
    }

    /// Set a fixed completion time, switching the job to `At`.
    ///
    /// `None` keeps a looping job open-ended and derives the completion of
    /// other jobs from startup and estimate.
    pub fn set_completion_time(&mut self, value: Option<LocalTime>) {
        self.greedy_completion_time = None;

        match value {
            Some(time) => {
                self.completion_condition = CompletionCondition::At;
                self.set_required_repeats_quiet(0);
                self.completion_time = Some(time);
                self.refresh_completion_altitude();
                self.set_estimated_time(None);
            }
            None if self.completion_condition == CompletionCondition::Loop => {
                self.completion_time = None;
                self.set_estimated_time(None);
            }
            None => {
                self.completion_time = Some(self.derived_completion_time());
                self.refresh_completion_altitude();
                self.set_estimated_time(self.estimated_time);
            }
        }

        self.notify(JobChange::Completion);
        self.debug_assert_invariants();
    }

    pub fn set_completion_condition(&mut self, value: CompletionCondition) {
        self.apply_completion_condition(value);
        match value {
            CompletionCondition::Loop | CompletionCondition::At => self.set_required_repeats_quiet(0),
            CompletionCondition::Sequence => self.set_required_repeats_quiet(1),
            CompletionCondition::Repeat if self.repeats_required == 0 => {
                self.set_required_repeats_quiet(1)
            }
            CompletionCondition::Repeat => {}
        }
        self.debug_assert_invariants();
    }

    /// Set the number of sequence repeats; the completion condition follows.
    ///
    /// Zero repeats on a job ending at a fixed time keeps it fixed.
    pub fn set_repeats_required(&mut self, value: u32) {
        self.set_required_repeats_quiet(value);
        let condition = match value {
            0 if self.completion_condition == CompletionCondition::At => CompletionCondition::At,
            0 => CompletionCondition::Loop,
            1 => CompletionCondition::Sequence,
            _ => CompletionCondition::Repeat,
        };
        if condition != self.completion_condition {
            self.apply_completion_condition(condition);
        }
        self.debug_assert_invariants();
    }

    /// Set the estimated duration in seconds.
    ///
    /// Ignored when the declared startup is not ASAP and completion is fixed;
    /// otherwise moves the completion of `Sequence` and `Repeat` jobs.
    pub fn set_estimated_time(&mut self, value: Option<i64>) {
        let value = value.filter(|v| *v >= 0);
        let fixed_start = self.file_startup_condition != StartupCondition::Asap;

        match (self.startup_time, self.completion_condition, self.completion_time) {
            (Some(start), CompletionCondition::At, Some(end)) if fixed_start => {
                self.estimated_time = Some((end - start).num_seconds());
            }
            (_, CompletionCondition::Sequence | CompletionCondition::Repeat, _) => {
                self.estimated_time = value;
                self.completion_time = Some(self.derived_completion_time());
                self.refresh_completion_altitude();
            }
            _ => self.estimated_time = value,
        }

        self.notify(JobChange::Estimate);
    }

    /// Return the job to a freshly loaded state.
    pub fn reset(&mut self) {
        let now = self.context.now();
        self.state = JobStatus::Idle;
        self.stage = JobStage::Idle;
        self.state_time = now;
        self.anchor = now;
        self.last_abort_time = None;
        self.last_error_time = None;
        self.lead_time = 0;
        self.startup_condition = self.file_startup_condition;
        self.startup_time = match self.file_startup_condition {
            StartupCondition::At => self.file_startup_time,
            _ => None,
        };
        self.greedy_completion_time = None;
        self.stop_reason = None;
        self.repeats_remaining = self.repeats_required;

        self.refresh_startup_altitude();
        self.set_estimated_time(None);
        self.refresh_dawn_dusk();
        self.start_time_cache.clear();

        for change in [
            JobChange::Status,
            JobChange::Stage,
            JobChange::Startup,
            JobChange::Repeats,
            JobChange::LeadTime,
        ] {
            self.notify(change);
        }
        self.debug_assert_invariants();
    }

    /// Drain pending change notifications.
    pub fn take_changes(&mut self) -> Vec<JobChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            name: self.name.clone(),
            position_angle: self.position_angle,
            target_ra: self.target.ra_hours(),
            target_dec: self.target.dec_degrees(),
            state: self.state,
            stage: self.stage,
            sequence_count: self.sequence_count,
            completed_count: self.completed_count,
            min_altitude: self.constraints.min_altitude_degrees(),
            min_moon_separation: self.constraints.min_moon_separation_degrees(),
            estimated_time: self.estimated_time,
            culmination_offset: self.culmination_offset,
            priority: self.priority,
            lead_time: self.lead_time,
            repeats_required: self.repeats_required,
            repeats_remaining: self.repeats_remaining,
            in_sequence_focus: self.in_sequence_focus,
            score: self.score,
            startup_condition: self.startup_condition,
            completion_condition: self.completion_condition,
            startup_time: self.startup_time,
            completion_time: self.completion_time,
        }
    }

    // ----- computations -----

    /// Altitude in degrees and setting flag at `when`.
    pub fn find_altitude(&self, when: impl Into<When>) -> (f64, bool) {
        scoring::find_altitude(self, when.into())
    }

    /// Altitude score and altitude at `when`.
    pub fn altitude_score(&self, when: impl Into<When>) -> (i16, f64) {
        scoring::altitude_score(self, when.into())
    }

    pub fn moon_separation_score(&self, when: impl Into<When>) -> i16 {
        scoring::moon_separation_score(self, when.into())
    }

    /// Current angular distance to the Moon in degrees.
    pub fn current_moon_separation(&self) -> f64 {
        scoring::current_moon_separation(self)
    }

    pub fn has_altitude_constraint(&self) -> bool {
        constraint_service::has_altitude_constraint(self)
    }

    pub fn satisfies_altitude_constraint(
        &self,
        azimuth: f64,
        altitude: f64,
    ) -> Result<(), ConstraintViolation> {
        constraint_service::satisfies_altitude_constraint(self, azimuth, altitude)
    }

    /// Whether `when` falls inside astronomical night.
    pub fn runs_during_astronomical_night(&self, when: impl Into<When>) -> bool {
        let time = self.context.local_time(when.into());
        self.context.is_night_time(time).is_night
    }

    pub fn culmination_time(&self, when: impl Into<When>) -> Option<LocalTime> {
        time_window::culmination_time(self, when.into())
    }

    pub fn next_possible_start_time(
        &mut self,
        when: impl Into<When>,
        step_minutes: u32,
        running_job: bool,
        until: Option<LocalTime>,
    ) -> Option<LocalTime> {
        time_window::next_possible_start_time(self, when.into(), step_minutes, running_job, until)
    }

    pub fn next_end_time(
        &self,
        start: impl Into<When>,
        step_minutes: u32,
        until: Option<LocalTime>,
    ) -> SearchOutcome {
        time_window::next_end_time(self, start.into(), step_minutes, until)
    }

    // ----- internals -----

    fn notify(&mut self, change: JobChange) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    fn constraints_changed(&mut self) {
        self.start_time_cache.clear();
        self.notify(JobChange::Constraints);
    }

    fn set_required_repeats_quiet(&mut self, value: u32) {
        if self.repeats_required != value {
            self.repeats_required = value;
            self.repeats_remaining = self.repeats_remaining.min(value);
            self.notify(JobChange::Repeats);
        }
    }

    /// Switch completion condition without touching repeats.
    fn apply_completion_condition(&mut self, value: CompletionCondition) {
        self.completion_condition = value;
        match value {
            CompletionCondition::Loop => {
                self.greedy_completion_time = None;
                self.completion_time = None;
                self.set_estimated_time(None);
            }
            CompletionCondition::At => {
                if self.completion_time.is_none() {
                    self.completion_time = Some(self.derived_completion_time());
                    self.refresh_completion_altitude();
                }
                self.set_estimated_time(self.estimated_time);
            }
            CompletionCondition::Sequence | CompletionCondition::Repeat => {
                self.set_estimated_time(self.estimated_time);
            }
        }
        self.notify(JobChange::Completion);
    }

    fn derived_completion_time(&self) -> LocalTime {
        self.startup_time.unwrap_or(self.anchor)
            + Duration::seconds(self.estimated_time.unwrap_or(0).max(0))
    }

    fn refresh_apparent_target(&mut self) {
        let now = self.context.now();
        self.apparent_target = self
            .context
            .ephemeris()
            .apparent_position(&self.target, now.with_timezone(&Utc));
    }

    fn refresh_startup_altitude(&mut self) {
        let (altitude, setting) = self.find_altitude(self.startup_time);
        self.altitude_at_startup = altitude;
        self.is_setting_at_startup = setting;
    }

    fn refresh_completion_altitude(&mut self) {
        if let Some(completion) = self.completion_time {
            let (altitude, setting) = self.find_altitude(completion);
            self.altitude_at_completion = altitude;
            self.is_setting_at_completion = setting;
        }
    }

    fn refresh_dawn_dusk(&mut self) {
        let reference = self.startup_time.unwrap_or_else(|| self.context.now());
        let events = self.context.dawn_dusk(reference);
        self.next_dawn = Some(events.dawn);
        self.next_dusk = Some(events.dusk);
    }

    fn debug_assert_invariants(&self) {
        debug_assert_eq!(
            self.completion_time.is_some(),
            self.completion_condition != CompletionCondition::Loop,
            "completion time is set exactly when the job does not loop"
        );
        debug_assert!(
            match self.completion_condition {
                CompletionCondition::Loop | CompletionCondition::At => self.repeats_required == 0,
                CompletionCondition::Sequence => self.repeats_required == 1,
                CompletionCondition::Repeat => self.repeats_required >= 1,
            },
            "repeats {} inconsistent with {:?}",
            self.repeats_required,
            self.completion_condition
        );
    }
}
