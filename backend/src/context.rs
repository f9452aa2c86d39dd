//! Shared scheduler context.
//!
//! Every job of one scheduler holds an `Arc<SchedulerContext>`: the observing
//! site, the global options, the astronomy capabilities, the night-time cache,
//! the clock and the cancellation flag for long searches.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::GeographicLocation;
use crate::astro::{ArtificialHorizon, Ephemeris, SiderustEphemeris};
use crate::config::{SchedulerConfig, SchedulerOptions};
use crate::models::{Clock, JobId, LocalTime, SystemClock, When};
use crate::services::astronomical_night::{DawnDusk, NightCheck, NightTimeCache};

/// Capabilities and settings shared by all jobs.
pub struct SchedulerContext {
    location: GeographicLocation,
    options: SchedulerOptions,
    ephemeris: Arc<dyn Ephemeris>,
    horizon: Option<Arc<dyn ArtificialHorizon>>,
    night_cache: Arc<NightTimeCache>,
    clock: Arc<dyn Clock>,
    cancel: AtomicBool,
    next_id: AtomicU64,
}

impl SchedulerContext {
    /// Create a context using the siderust ephemeris and the system clock.
    pub fn new(location: GeographicLocation, options: SchedulerOptions) -> Self {
        let ephemeris = Arc::new(SiderustEphemeris::new());
        Self {
            location,
            options,
            night_cache: Arc::new(NightTimeCache::new(ephemeris.clone())),
            ephemeris,
            horizon: None,
            clock: Arc::new(SystemClock),
            cancel: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a context from a loaded configuration file.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let context = Self::new(config.location.clone(), config.options());
        match config.horizon_mask() {
            Some(mask) => context.with_horizon(Arc::new(mask)),
            None => context,
        }
    }

    pub fn with_ephemeris(mut self, ephemeris: Arc<dyn Ephemeris>) -> Self {
        self.ephemeris = ephemeris;
        self
    }

    pub fn with_horizon(mut self, horizon: Arc<dyn ArtificialHorizon>) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn location(&self) -> &GeographicLocation {
        &self.location
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn ephemeris(&self) -> &dyn Ephemeris {
        self.ephemeris.as_ref()
    }

    pub fn horizon(&self) -> Option<&dyn ArtificialHorizon> {
        self.horizon.as_deref()
    }

    pub fn night_cache(&self) -> &Arc<NightTimeCache> {
        &self.night_cache
    }

    /// Current local time of the site.
    pub fn now(&self) -> LocalTime {
        self.location.to_local(self.clock.now_utc())
    }

    /// Resolve an evaluation instant to site-local time.
    pub fn local_time(&self, when: When) -> LocalTime {
        match when {
            When::Now => self.now(),
            When::Utc(instant) => self.location.to_local(instant),
            When::Local(instant) => self.location.to_local(instant),
        }
    }

    /// Next dawn and dusk strictly after `reference`.
    pub fn dawn_dusk(&self, reference: LocalTime) -> DawnDusk {
        self.night_cache
            .dawn_dusk(reference, &self.location, &self.options.twilight)
    }

    pub fn is_night_time(&self, time: LocalTime) -> NightCheck {
        self.night_cache
            .is_night_time(time, &self.location, &self.options.twilight)
    }

    /// Abort running searches at their next step.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub(crate) fn next_job_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("location", &self.location)
            .field("options", &self.options)
            .field("has_horizon", &self.horizon.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
