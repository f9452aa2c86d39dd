//! Service layer: scheduling computations over jobs.
//!
//! Jobs delegate to these modules; each works on a `&SchedulerJob` and its
//! shared context, with the start-time search as the one exception needing
//! `&mut` access to the per-job cache.

pub mod astronomical_night;
pub mod constraints;
pub mod ordering;
pub mod scoring;
pub mod start_time_cache;
pub mod time_window;

pub use astronomical_night::{DawnDusk, NightCheck, NightTimeCache};
pub use constraints::ConstraintViolation;
pub use scoring::{BAD_SCORE, MIN_ALTITUDE};
pub use start_time_cache::{CacheLookup, StartTimeCache};
pub use time_window::{SearchOutcome, SearchTarget};
